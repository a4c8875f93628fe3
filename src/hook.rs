//! Save-time adapter, run inline whenever a record is created or updated.

use crate::config::{FeatureFlags, Settings};
use crate::record::ContentRecord;
use crate::sanitizer::{Context, SanitizerPipeline};

/// Sanitizes a record body immediately before it is persisted.
///
/// Flags are resolved once at construction; the hook itself never writes or
/// invalidates anything, the host's save path persists whatever it returns.
/// Running it over an already-sanitized body is a no-op.
///
/// # Example
///
/// ```
/// use ucf_content_sanitizer::{FeatureFlags, SaveHook};
///
/// let hook = SaveHook::new(FeatureFlags::ALL, ["post", "page"]);
/// let body = r#"<a href="https://postmaster.smca.ucf.edu/?url=https%3A%2F%2Fnews.ucf.edu%2F">n</a>"#;
/// assert_eq!(hook.filter_content("post", body), r#"<a href="https://news.ucf.edu/">n</a>"#);
/// assert_eq!(hook.filter_content("attachment", body), body);
/// ```
pub struct SaveHook {
    enabled_types: Vec<String>,
    pipeline: SanitizerPipeline,
}

impl SaveHook {
    pub fn new<I, S>(flags: FeatureFlags, enabled_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled_types: enabled_types.into_iter().map(Into::into).collect(),
            pipeline: SanitizerPipeline::for_context(Context::Save, &flags),
        }
    }

    /// Build the hook from the `post_save_*` flags and enabled post types.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            FeatureFlags::resolve(settings, Context::Save),
            settings.enabled_post_types.iter().cloned(),
        )
    }

    /// Returns `true` if records of `post_type` are sanitized on save.
    pub fn applies_to(&self, post_type: &str) -> bool {
        self.enabled_types.iter().any(|t| t == post_type)
    }

    /// The body to persist for a record of `post_type`.
    pub fn filter_content(&self, post_type: &str, body: &str) -> String {
        if !self.applies_to(post_type) || self.pipeline.is_empty() {
            return body.to_string();
        }
        self.pipeline.sanitize_to_fixpoint(body)
    }

    /// A copy of `record` with its body filtered.
    pub fn filter_record(&self, record: &ContentRecord) -> ContentRecord {
        ContentRecord {
            body: self.filter_content(&record.post_type, &record.body),
            ..record.clone()
        }
    }
}
