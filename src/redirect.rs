//! Redirector URL rules and the unwrapping logic that recovers the final
//! destination from them.

use std::sync::LazyLock;

use percent_encoding::percent_decode_str;
use regex::Regex;
use url::form_urlencoded;

/// How many times the destination parameter is percent-decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decode {
    /// A single query-string decode. Used when processing stored records.
    Once,
    /// A second percent-decode on top of the query-string decode. Used for
    /// pasted content, where the redirector is known to double-encode.
    Twice,
}

/// A redirection service recognised by a prefix pattern, carrying its final
/// destination in a query parameter.
#[derive(Debug)]
pub struct RedirectRule {
    name: &'static str,
    pattern: Regex,
    param: &'static str,
}

/// Outlook Safelinks (`*.safelinks.protection.outlook.com`).
pub static SAFELINKS: LazyLock<RedirectRule> = LazyLock::new(|| {
    RedirectRule::new(
        "safelinks",
        r"^https://(.*\.)safelinks\.protection\.outlook\.com/",
        "url",
    )
    .expect("built-in safelinks pattern is valid")
});

/// The `postmaster.smca.ucf.edu` redirector.
pub static POSTMASTER: LazyLock<RedirectRule> = LazyLock::new(|| {
    RedirectRule::new("postmaster", r"^https://postmaster\.smca\.ucf\.edu/", "url")
        .expect("built-in postmaster pattern is valid")
});

impl RedirectRule {
    /// Build a rule from a prefix-anchored pattern (matched case-insensitively)
    /// and the name of the query parameter holding the destination URL.
    pub fn new(
        name: &'static str,
        pattern: &str,
        param: &'static str,
    ) -> Result<Self, regex::Error> {
        let pattern = if pattern.starts_with('^') {
            format!("(?i){pattern}")
        } else {
            format!("(?i)^{pattern}")
        };
        Ok(Self {
            name,
            pattern: Regex::new(&pattern)?,
            param,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn param(&self) -> &'static str {
        self.param
    }

    /// Returns `true` if `url` points through this redirector.
    pub fn matches(&self, url: &str) -> bool {
        self.pattern.is_match(url)
    }

    /// Replace a redirector URL with the destination it carries.
    ///
    /// URLs that don't match the rule, or that match but carry no usable
    /// destination parameter, are returned unchanged.
    ///
    /// ```
    /// use ucf_content_sanitizer::redirect::{Decode, SAFELINKS};
    ///
    /// let url = "https://nam02.safelinks.protection.outlook.com/?url=https%3A%2F%2Fwww.ucf.edu%2F&data=x";
    /// assert_eq!(SAFELINKS.unwrap(url, Decode::Once), "https://www.ucf.edu/");
    /// assert_eq!(SAFELINKS.unwrap("https://www.ucf.edu/", Decode::Once), "https://www.ucf.edu/");
    /// ```
    pub fn unwrap(&self, url: &str, decode: Decode) -> String {
        if !self.matches(url) {
            return url.to_string();
        }

        let Some(destination) = query_param(url, self.param) else {
            tracing::debug!(rule = self.name, "Redirect URL has no `{}` parameter", self.param);
            return url.to_string();
        };

        match decode {
            Decode::Once => destination,
            Decode::Twice => percent_decode_str(&destination)
                .decode_utf8_lossy()
                .into_owned(),
        }
    }
}

/// Last value of `name` in the query string of `url`, or `None` when that
/// last value is empty.
///
/// Never fails: a URL without a query string, or with a query string that
/// can't be made sense of, simply has no such parameter.
fn query_param(url: &str, name: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    let query = query.split_once('#').map_or(query, |(q, _)| q);

    form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| key == name)
        .last()
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_matching_url_is_unchanged() {
        for url in [
            "https://www.ucf.edu/?url=https%3A%2F%2Fevil.example%2F",
            "http://nam02.safelinks.protection.outlook.com/?url=https%3A%2F%2Fwww.ucf.edu%2F",
            "/relative/path",
            "mailto:someone@ucf.edu",
            "",
        ] {
            assert_eq!(SAFELINKS.unwrap(url, Decode::Once), url);
            assert_eq!(POSTMASTER.unwrap(url, Decode::Once), url);
        }
    }

    #[test]
    fn safelinks_requires_a_subdomain() {
        let url = "https://safelinks.protection.outlook.com/?url=https%3A%2F%2Fwww.ucf.edu%2F";
        assert_eq!(SAFELINKS.unwrap(url, Decode::Once), url);
    }

    #[test]
    fn safelinks_destination_is_decoded_once() {
        let url = "https://nam02.safelinks.protection.outlook.com/?url=https%3A%2F%2Fwww.ucf.edu%2Fnews%2F%3Fq%3Da%2520b&data=04%7C01&reserved=0";
        assert_eq!(
            SAFELINKS.unwrap(url, Decode::Once),
            "https://www.ucf.edu/news/?q=a%20b"
        );
    }

    #[test]
    fn double_decode_resolves_double_encoded_destination() {
        let url = "https://nam02.safelinks.protection.outlook.com/?url=https%253A%252F%252Fwww.ucf.edu%252F";
        assert_eq!(SAFELINKS.unwrap(url, Decode::Once), "https%3A%2F%2Fwww.ucf.edu%2F");
        assert_eq!(SAFELINKS.unwrap(url, Decode::Twice), "https://www.ucf.edu/");
    }

    #[test]
    fn postmaster_match_is_case_insensitive() {
        let url = "HTTPS://Postmaster.SMCA.ucf.edu/?url=https%3A%2F%2Fnews.ucf.edu%2F";
        assert_eq!(POSTMASTER.unwrap(url, Decode::Once), "https://news.ucf.edu/");
    }

    #[test]
    fn missing_param_returns_original() {
        let url = "https://postmaster.smca.ucf.edu/?target=https%3A%2F%2Fnews.ucf.edu%2F";
        assert_eq!(POSTMASTER.unwrap(url, Decode::Once), url);

        let bare = "https://postmaster.smca.ucf.edu/";
        assert_eq!(POSTMASTER.unwrap(bare, Decode::Once), bare);
    }

    #[test]
    fn empty_param_returns_original() {
        let url = "https://postmaster.smca.ucf.edu/?url=&x=1";
        assert_eq!(POSTMASTER.unwrap(url, Decode::Once), url);
    }

    #[test]
    fn malformed_query_decodes_lossily() {
        let url = "https://postmaster.smca.ucf.edu/?url=%E0%A4%A&&==&%zz";
        // Invalid escapes decode lossily.
        assert_eq!(POSTMASTER.unwrap(url, Decode::Once), "\u{FFFD}%A");
        assert_eq!(POSTMASTER.unwrap(url, Decode::Twice), "\u{FFFD}%A");

        let url = "https://postmaster.smca.ucf.edu/?&&&=";
        assert_eq!(POSTMASTER.unwrap(url, Decode::Once), url);
    }

    #[test]
    fn fragment_is_not_part_of_the_query() {
        let url = "https://postmaster.smca.ucf.edu/?url=https%3A%2F%2Fnews.ucf.edu%2F#url=other";
        assert_eq!(POSTMASTER.unwrap(url, Decode::Once), "https://news.ucf.edu/");
    }

    #[test]
    fn repeated_param_last_wins() {
        let url = "https://postmaster.smca.ucf.edu/?url=https%3A%2F%2Fa.ucf.edu%2F&url=https%3A%2F%2Fb.ucf.edu%2F";
        assert_eq!(POSTMASTER.unwrap(url, Decode::Once), "https://b.ucf.edu/");
    }

    #[test]
    fn trailing_empty_repeat_counts_as_absent() {
        let url = "https://postmaster.smca.ucf.edu/?url=https%3A%2F%2Fa.ucf.edu%2F&url=";
        assert_eq!(POSTMASTER.unwrap(url, Decode::Once), url);
    }

    #[test]
    fn custom_rule_is_prefix_anchored() {
        let rule = RedirectRule::new("tracker", r"https://click\.example\.com/", "u").unwrap();
        assert!(rule.matches("https://click.example.com/?u=x"));
        assert!(!rule.matches("see https://click.example.com/?u=x"));
        assert_eq!(rule.name(), "tracker");
        assert_eq!(rule.param(), "u");
    }

    #[test]
    fn invalid_custom_pattern_is_an_error() {
        assert!(RedirectRule::new("bad", "[unclosed", "url").is_err());
    }
}
