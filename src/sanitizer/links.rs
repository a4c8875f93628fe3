//! Regex-based rewriting of `href` attribute values.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::Sanitizer;
use crate::redirect::{Decode, RedirectRule};

/// `href="…"` or `href='…'`. The value may contain neither quote character.
static HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)href=(?:"(?P<dq>[^'"]*)"|'(?P<sq>[^'"]*)')"#)
        .expect("href pattern is valid")
});

/// Apply `transform` to every non-empty `href` value in `html`.
///
/// Only the value inside the quotes is ever replaced; the attribute name,
/// its quotes and everything else in the document is kept byte-for-byte.
/// Quote characters in a rewritten value are percent-encoded so the
/// attribute stays well-formed.
///
/// ```
/// use ucf_content_sanitizer::rewrite_links;
///
/// let html = r#"<a class="btn" HREF='/old'>x</a>"#;
/// let out = rewrite_links(html, |href| href.replace("old", "new"));
/// assert_eq!(out, r#"<a class="btn" HREF='/new'>x</a>"#);
/// ```
pub fn rewrite_links<F>(html: &str, mut transform: F) -> String
where
    F: FnMut(&str) -> String,
{
    HREF.replace_all(html, |caps: &Captures| {
        let whole = &caps[0];
        let Some(value) = caps.name("dq").or_else(|| caps.name("sq")) else {
            return whole.to_string();
        };
        if value.as_str().is_empty() {
            return whole.to_string();
        }

        let rewritten = transform(value.as_str());
        if rewritten == value.as_str() {
            return whole.to_string();
        }

        let offset = caps.get(0).map_or(0, |m| m.start());
        let (start, end) = (value.start() - offset, value.end() - offset);
        format!(
            "{}{}{}",
            &whole[..start],
            rewritten.replace('"', "%22").replace('\'', "%27"),
            &whole[end..]
        )
    })
    .into_owned()
}

/// Sanitizer that unwraps one kind of redirector link wherever it appears
/// as an `href` value.
pub struct LinkSanitizer {
    rule: &'static RedirectRule,
    decode: Decode,
}

impl LinkSanitizer {
    pub fn new(rule: &'static RedirectRule, decode: Decode) -> Self {
        Self { rule, decode }
    }
}

impl Sanitizer for LinkSanitizer {
    fn sanitize(&self, html: &str) -> String {
        rewrite_links(html, |href| {
            let unwrapped = self.rule.unwrap(href, self.decode);
            if unwrapped != href {
                tracing::trace!(rule = self.rule.name(), from = href, to = %unwrapped, "Unwrapped link");
            }
            unwrapped
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redirect::{POSTMASTER, SAFELINKS};

    #[test]
    fn identity_transform_preserves_html() {
        let html = r#"<div data-x="1"><a href="https://www.ucf.edu/" title='t'>A</a> <a href=''>B</a> <link HREF="/style.css"></div>"#;
        assert_eq!(rewrite_links(html, |h| h.to_string()), html);
    }

    #[test]
    fn empty_href_is_not_transformed() {
        let mut calls = 0;
        let out = rewrite_links(r#"<a href="">x</a><a href=''>y</a>"#, |h| {
            calls += 1;
            format!("{h}changed")
        });
        assert_eq!(calls, 0);
        assert_eq!(out, r#"<a href="">x</a><a href=''>y</a>"#);
    }

    #[test]
    fn quote_style_and_attribute_case_preserved() {
        let html = r#"<a HREF='/a'>1</a><a Href="/a">2</a>"#;
        let out = rewrite_links(html, |h| format!("{h}/b"));
        assert_eq!(out, r#"<a HREF='/a/b'>1</a><a Href="/a/b">2</a>"#);
    }

    #[test]
    fn only_the_href_value_changes() {
        let html = r#"<p>/x</p><a title="/x" href="/x" data-href="/x">/x</a>"#;
        let out = rewrite_links(html, |h| if h == "/x" { "/y".into() } else { h.into() });
        // `data-href` contains `href=` too and is rewritten the same way.
        assert_eq!(
            out,
            r#"<p>/x</p><a title="/x" href="/y" data-href="/y">/x</a>"#
        );
    }

    #[test]
    fn mismatched_quotes_are_not_matched() {
        let html = r#"<a href="/x'>broken</a>"#;
        assert_eq!(rewrite_links(html, |_| "/changed".into()), html);
    }

    #[test]
    fn quotes_in_rewritten_value_are_encoded() {
        let out = rewrite_links(r#"<a href="/x">x</a>"#, |_| r#"/a"b'c"#.into());
        assert_eq!(out, r#"<a href="/a%22b%27c">x</a>"#);
    }

    #[test]
    fn link_sanitizer_unwraps_its_rule_only() {
        let html = concat!(
            r#"<a href="https://xyz.safelinks.protection.outlook.com/?url=https%3A%2F%2Fwww.ucf.edu%2F">s</a>"#,
            r#"<a href="https://postmaster.smca.ucf.edu/?url=https%3A%2F%2Fnews.ucf.edu%2F">p</a>"#,
        );

        let safelinks = LinkSanitizer::new(&SAFELINKS, Decode::Once);
        assert_eq!(
            safelinks.sanitize(html),
            concat!(
                r#"<a href="https://www.ucf.edu/">s</a>"#,
                r#"<a href="https://postmaster.smca.ucf.edu/?url=https%3A%2F%2Fnews.ucf.edu%2F">p</a>"#,
            )
        );

        let postmaster = LinkSanitizer::new(&POSTMASTER, Decode::Once);
        assert_eq!(
            postmaster.sanitize(html),
            concat!(
                r#"<a href="https://xyz.safelinks.protection.outlook.com/?url=https%3A%2F%2Fwww.ucf.edu%2F">s</a>"#,
                r#"<a href="https://news.ucf.edu/">p</a>"#,
            )
        );
    }

    #[test]
    fn html_escaped_ampersands_in_href() {
        let html = r#"<a href="https://xyz.safelinks.protection.outlook.com/?url=https%3A%2F%2Fwww.ucf.edu%2F&amp;data=05%7C02&amp;reserved=0">s</a>"#;
        let out = LinkSanitizer::new(&SAFELINKS, Decode::Once).sanitize(html);
        assert_eq!(out, r#"<a href="https://www.ucf.edu/">s</a>"#);
    }
}
