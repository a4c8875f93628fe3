//! Sanitizer pipeline that unwraps redirector links in HTML content.
//!
//! Sanitizers implement the [`Sanitizer`] trait and are composed into a
//! [`SanitizerPipeline`] that runs them sequentially. Which sanitizers end up
//! in the pipeline is decided by the calling [`Context`] and the enabled
//! [`FeatureFlags`]:
//!
//! | Context | Flag prefix | Rule order | Decoding |
//! |---|---|---|---|
//! | [`Context::Batch`] | `cli_` | Postmaster, Safelinks | once |
//! | [`Context::Save`] | `post_save_` | Safelinks, Postmaster | once |
//! | [`Context::Paste`] | `on_paste_` | Safelinks, Postmaster (one `a`-tag transform) | twice |
//!
//! Built-in sanitizers:
//!
//! - [`LinkSanitizer`] -- regex scan of `href` attributes, one redirect rule.
//! - [`TagTransformSanitizer`] -- parse and re-serialize HTML, rewriting
//!   attributes of selected tags through callbacks.

mod links;
mod tags;

pub use links::{LinkSanitizer, rewrite_links};
pub use tags::{Attributes, TagTransformSanitizer};

use crate::config::FeatureFlags;
use crate::redirect::{Decode, POSTMASTER, RedirectRule, SAFELINKS};

/// Trait for HTML content sanitizers.
///
/// Each sanitizer receives an HTML string and returns a transformed version.
/// Implementations must be `Send + Sync` so a pipeline can be shared between
/// requests.
pub trait Sanitizer: Send + Sync {
    /// Transform the given HTML content, returning the sanitized result.
    fn sanitize(&self, html: &str) -> String;
}

/// The calling scenario, which decides flag names, rule order and decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Context {
    /// Bulk re-processing of stored records from the command line.
    Batch,
    /// A single record being created or updated.
    Save,
    /// HTML pasted into the editor.
    Paste,
}

/// Option names of the two redirector flags for one [`Context`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlagNames {
    pub safelink: &'static str,
    pub postmaster: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Filter {
    Safelinks,
    Postmaster,
}

impl Filter {
    fn rule(self) -> &'static RedirectRule {
        match self {
            Filter::Safelinks => &*SAFELINKS,
            Filter::Postmaster => &*POSTMASTER,
        }
    }

    fn enabled(self, flags: &FeatureFlags) -> bool {
        match self {
            Filter::Safelinks => flags.safelink_filtering,
            Filter::Postmaster => flags.postmaster_filtering,
        }
    }
}

impl Context {
    pub fn flag_names(self) -> FlagNames {
        match self {
            Context::Batch => FlagNames {
                safelink: "cli_enable_safelink_filtering",
                postmaster: "cli_enable_postmaster_filtering",
            },
            Context::Save => FlagNames {
                safelink: "post_save_enable_safelink_filtering",
                postmaster: "post_save_enable_postmaster_filtering",
            },
            Context::Paste => FlagNames {
                safelink: "on_paste_enable_safelink_filtering",
                postmaster: "on_paste_enable_postmaster_filtering",
            },
        }
    }

    /// Value assumed for a flag of this context that was never configured.
    pub fn default_enabled(self) -> bool {
        matches!(self, Context::Batch)
    }

    pub fn decode(self) -> Decode {
        match self {
            Context::Batch | Context::Save => Decode::Once,
            Context::Paste => Decode::Twice,
        }
    }

    fn filters(self) -> &'static [Filter] {
        match self {
            Context::Batch => &[Filter::Postmaster, Filter::Safelinks],
            Context::Save | Context::Paste => &[Filter::Safelinks, Filter::Postmaster],
        }
    }

    /// The rules enabled by `flags`, in the order this context applies them.
    pub fn rules(self, flags: &FeatureFlags) -> Vec<&'static RedirectRule> {
        self.filters()
            .iter()
            .filter(|f| f.enabled(flags))
            .map(|f| f.rule())
            .collect()
    }
}

/// An ordered chain of [`Sanitizer`] implementations applied sequentially.
///
/// Each sanitizer receives the output of the previous one. An empty pipeline
/// is a no-op.
pub struct SanitizerPipeline {
    sanitizers: Vec<Box<dyn Sanitizer>>,
}

impl SanitizerPipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self {
            sanitizers: Vec::new(),
        }
    }

    /// Build the pipeline a context runs for the given flags.
    ///
    /// Batch and save contexts get one [`LinkSanitizer`] stage per enabled
    /// rule. The paste context gets a single [`TagTransformSanitizer`] whose
    /// `a` transform applies every enabled rule to the `href` attribute.
    pub fn for_context(context: Context, flags: &FeatureFlags) -> Self {
        let rules = context.rules(flags);
        let decode = context.decode();
        let mut pipeline = Self::new();

        if rules.is_empty() {
            return pipeline;
        }

        match context {
            Context::Batch | Context::Save => {
                for rule in rules {
                    pipeline.add(LinkSanitizer::new(rule, decode));
                }
            }
            Context::Paste => {
                pipeline.add(TagTransformSanitizer::new().transform_tag(
                    "a",
                    move |attrs: &mut Attributes| {
                        let Some((_, href)) = attrs.iter_mut().find(|(name, _)| name == "href")
                        else {
                            return;
                        };
                        if href.is_empty() {
                            return;
                        }
                        let unwrapped = rules
                            .iter()
                            .fold(href.clone(), |url, rule| rule.unwrap(&url, decode));
                        if unwrapped != *href {
                            *href = unwrapped;
                        }
                    },
                ));
            }
        }

        pipeline
    }

    /// Append a sanitizer to the end of the pipeline.
    pub fn add(&mut self, sanitizer: impl Sanitizer + 'static) {
        self.sanitizers.push(Box::new(sanitizer));
    }

    /// Run the full pipeline on the given HTML, returning the final result.
    pub fn sanitize(&self, html: &str) -> String {
        self.sanitizers
            .iter()
            .fold(html.to_string(), |acc, s| s.sanitize(&acc))
    }

    /// Run the pipeline until its output stops changing, so that redirector
    /// links wrapped inside other redirector links are fully unwrapped.
    ///
    /// Every rewrite swaps a URL for its shorter decoded destination, so the
    /// loop always ends.
    pub fn sanitize_to_fixpoint(&self, html: &str) -> String {
        let mut current = self.sanitize(html);
        if self.is_empty() {
            return current;
        }
        loop {
            let next = self.sanitize(&current);
            if next == current {
                return current;
            }
            current = next;
        }
    }

    /// Returns `true` if no sanitizers have been added.
    pub fn is_empty(&self) -> bool {
        self.sanitizers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sanitizers.len()
    }

    /// Sanitize `original`, keeping both versions for comparison.
    pub fn outcome(&self, original: &str) -> SanitizationOutcome {
        SanitizationOutcome {
            original: original.to_string(),
            sanitized: self.sanitize_to_fixpoint(original),
        }
    }
}

impl Default for SanitizerPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of sanitizing a single body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SanitizationOutcome {
    pub original: String,
    pub sanitized: String,
}

impl SanitizationOutcome {
    /// `true` when the sanitized body differs from the original. This is the
    /// only trigger for a repository write.
    pub fn changed(&self) -> bool {
        self.original != self.sanitized
    }
}

/// Sanitize `content` with the rules `flags` enables in `context`.
///
/// ```
/// use ucf_content_sanitizer::{Context, FeatureFlags, sanitize};
///
/// let html = r#"<a href="https://xyz.safelinks.protection.outlook.com/?url=https%3A%2F%2Fwww.ucf.edu%2F">link</a>"#;
/// let flags = FeatureFlags { safelink_filtering: true, postmaster_filtering: false };
/// assert_eq!(sanitize(html, &flags, Context::Batch), r#"<a href="https://www.ucf.edu/">link</a>"#);
/// ```
pub fn sanitize(content: &str, flags: &FeatureFlags, context: Context) -> String {
    SanitizerPipeline::for_context(context, flags).sanitize_to_fixpoint(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAFELINK: &str = "https://nam02.safelinks.protection.outlook.com/?url=https%3A%2F%2Fwww.ucf.edu%2F&data=1";
    const POSTMASTER_LINK: &str = "https://postmaster.smca.ucf.edu/?url=https%3A%2F%2Fnews.ucf.edu%2F";

    fn only_safelinks() -> FeatureFlags {
        FeatureFlags {
            safelink_filtering: true,
            postmaster_filtering: false,
        }
    }

    fn only_postmaster() -> FeatureFlags {
        FeatureFlags {
            safelink_filtering: false,
            postmaster_filtering: true,
        }
    }

    struct Upper;

    impl Sanitizer for Upper {
        fn sanitize(&self, html: &str) -> String {
            html.to_uppercase()
        }
    }

    struct Append(&'static str);

    impl Sanitizer for Append {
        fn sanitize(&self, html: &str) -> String {
            format!("{html}{}", self.0)
        }
    }

    #[test]
    fn pipeline_empty_is_empty() {
        let pipeline = SanitizerPipeline::new();
        assert!(pipeline.is_empty());
        assert_eq!(pipeline.sanitize("<p>original</p>"), "<p>original</p>");
    }

    #[test]
    fn pipeline_default_is_empty() {
        assert!(SanitizerPipeline::default().is_empty());
    }

    #[test]
    fn pipeline_chains_sanitizers_in_order() {
        let mut pipeline = SanitizerPipeline::new();
        pipeline.add(Append("a"));
        pipeline.add(Upper);
        pipeline.add(Append("b"));
        assert_eq!(pipeline.len(), 3);
        assert_eq!(pipeline.sanitize("x"), "XAb");
    }

    #[test]
    fn context_rule_order() {
        let names = |ctx: Context| {
            ctx.rules(&FeatureFlags::ALL)
                .iter()
                .map(|r| r.name())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(Context::Batch), ["postmaster", "safelinks"]);
        assert_eq!(names(Context::Save), ["safelinks", "postmaster"]);
        assert_eq!(names(Context::Paste), ["safelinks", "postmaster"]);
        assert!(Context::Batch.rules(&FeatureFlags::NONE).is_empty());
    }

    #[test]
    fn pipeline_shape_per_context() {
        assert_eq!(SanitizerPipeline::for_context(Context::Batch, &FeatureFlags::ALL).len(), 2);
        assert_eq!(SanitizerPipeline::for_context(Context::Save, &only_safelinks()).len(), 1);
        assert_eq!(SanitizerPipeline::for_context(Context::Paste, &FeatureFlags::ALL).len(), 1);
        assert!(SanitizerPipeline::for_context(Context::Paste, &FeatureFlags::NONE).is_empty());
    }

    #[test]
    fn safelinks_only_unwraps_safelinks() {
        let html = format!(r#"<a href="{SAFELINK}">a</a><a href="{POSTMASTER_LINK}">b</a>"#);
        let out = sanitize(&html, &only_safelinks(), Context::Save);
        assert_eq!(
            out,
            format!(r#"<a href="https://www.ucf.edu/">a</a><a href="{POSTMASTER_LINK}">b</a>"#)
        );
    }

    #[test]
    fn postmaster_only_unwraps_postmaster() {
        let html = format!(r#"<a href="{POSTMASTER_LINK}">n</a>"#);
        assert_eq!(
            sanitize(&html, &only_postmaster(), Context::Batch),
            r#"<a href="https://news.ucf.edu/">n</a>"#
        );
    }

    #[test]
    fn no_flags_returns_content_unchanged() {
        let html = format!(r#"<p><a href="{SAFELINK}">a</a></p>"#);
        for ctx in [Context::Batch, Context::Save, Context::Paste] {
            assert_eq!(sanitize(&html, &FeatureFlags::NONE, ctx), html);
        }
    }

    #[test]
    fn nested_redirects_unwrap_in_one_call() {
        // Safelink wrapping a postmaster link: in the batch order postmaster
        // runs first and sees nothing, so a second pass is required.
        let nested = "https://nam02.safelinks.protection.outlook.com/?url=https%3A%2F%2Fpostmaster.smca.ucf.edu%2F%3Furl%3Dhttps%253A%252F%252Fnews.ucf.edu%252F";
        let html = format!(r#"<a href="{nested}">n</a>"#);
        let once = sanitize(&html, &FeatureFlags::ALL, Context::Batch);
        assert_eq!(once, r#"<a href="https://news.ucf.edu/">n</a>"#);
        assert_eq!(sanitize(&once, &FeatureFlags::ALL, Context::Batch), once);
    }

    fn wrap_in_safelinks(url: &str, depth: usize) -> String {
        (0..depth).fold(url.to_string(), |inner, _| {
            let encoded: String = url::form_urlencoded::byte_serialize(inner.as_bytes()).collect();
            format!("https://nam02.safelinks.protection.outlook.com/?url={encoded}&data=1")
        })
    }

    #[test]
    fn deeply_nested_safelinks_unwrap_completely() {
        let html = format!(
            r#"<a href="{}">deep</a>"#,
            wrap_in_safelinks("https://www.ucf.edu/", 7)
        );
        for ctx in [Context::Batch, Context::Save] {
            let once = sanitize(&html, &FeatureFlags::ALL, ctx);
            assert_eq!(once, r#"<a href="https://www.ucf.edu/">deep</a>"#, "{ctx:?}");
            assert_eq!(sanitize(&once, &FeatureFlags::ALL, ctx), once, "{ctx:?}");
        }
    }

    #[test]
    fn sanitize_is_idempotent_in_every_context() {
        let html = format!(
            r#"<p>Read <a href="{SAFELINK}" class="x">this</a> and <A HREF='{POSTMASTER_LINK}'>that</A>.</p>"#
        );
        for ctx in [Context::Batch, Context::Save, Context::Paste] {
            let once = sanitize(&html, &FeatureFlags::ALL, ctx);
            assert_eq!(sanitize(&once, &FeatureFlags::ALL, ctx), once, "{ctx:?}");
        }
    }

    #[test]
    fn paste_context_double_decodes() {
        let html = r#"<a href="https://x.safelinks.protection.outlook.com/?url=https%253A%252F%252Fwww.ucf.edu%252F">link</a>"#;
        let flags = only_safelinks();
        assert_eq!(
            sanitize(html, &flags, Context::Paste),
            r#"<a href="https://www.ucf.edu/">link</a>"#
        );
        // The record-processing contexts decode once and leave the inner encoding.
        assert_eq!(
            sanitize(html, &flags, Context::Save),
            r#"<a href="https%3A%2F%2Fwww.ucf.edu%2F">link</a>"#
        );
    }

    #[test]
    fn outcome_reports_change() {
        let pipeline = SanitizerPipeline::for_context(Context::Batch, &FeatureFlags::ALL);
        let unchanged = pipeline.outcome(r#"<a href="https://www.ucf.edu/">x</a>"#);
        assert!(!unchanged.changed());

        let changed = pipeline.outcome(&format!(r#"<a href="{SAFELINK}">x</a>"#));
        assert!(changed.changed());
        assert_eq!(changed.sanitized, r#"<a href="https://www.ucf.edu/">x</a>"#);
    }
}
