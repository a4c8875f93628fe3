//! Content records as handed to the sanitizer by the content repository.

use serde::{Deserialize, Serialize};

/// Publication status of a content record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PostStatus {
    Publish,
    Pending,
    Draft,
    /// Scheduled for future publication.
    Future,
    Private,
    Trash,
    AutoDraft,
    Inherit,
}

impl PostStatus {
    /// Statuses considered by bulk sanitization runs.
    pub const ELIGIBLE: [PostStatus; 5] = [
        PostStatus::Publish,
        PostStatus::Pending,
        PostStatus::Draft,
        PostStatus::Future,
        PostStatus::Private,
    ];
}

/// A single piece of authored content.
///
/// The repository owns records; the sanitizer only ever reads `body` and
/// hands back a replacement for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub post_type: String,
    pub body: String,
    pub status: PostStatus,
}

/// Selects the records a repository should return from [`fetch`].
///
/// [`fetch`]: crate::repository::ContentRepository::fetch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentFilter {
    pub post_types: Vec<String>,
    pub statuses: Vec<PostStatus>,
}

impl ContentFilter {
    /// Filter for the given content types in any [eligible](PostStatus::ELIGIBLE) status.
    pub fn eligible<I, S>(post_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            post_types: post_types.into_iter().map(Into::into).collect(),
            statuses: PostStatus::ELIGIBLE.to_vec(),
        }
    }

    pub fn matches(&self, record: &ContentRecord) -> bool {
        self.post_types.iter().any(|t| *t == record.post_type)
            && self.statuses.contains(&record.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(post_type: &str, status: PostStatus) -> ContentRecord {
        ContentRecord {
            id: "1".into(),
            post_type: post_type.into(),
            body: String::new(),
            status,
        }
    }

    #[test]
    fn eligible_filter_matches_type_and_status() {
        let filter = ContentFilter::eligible(["post", "page"]);
        assert!(filter.matches(&record("post", PostStatus::Publish)));
        assert!(filter.matches(&record("page", PostStatus::Future)));
        assert!(!filter.matches(&record("attachment", PostStatus::Publish)));
        assert!(!filter.matches(&record("post", PostStatus::Trash)));
        assert!(!filter.matches(&record("post", PostStatus::AutoDraft)));
    }

    #[test]
    fn record_json_uses_type_key_and_wordpress_statuses() {
        let json = r#"{"id":"42","type":"page","body":"<p>x</p>","status":"auto-draft"}"#;
        let parsed: ContentRecord = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.post_type, "page");
        assert_eq!(parsed.status, PostStatus::AutoDraft);
        assert_eq!(serde_json::to_string(&parsed).unwrap(), json);
    }
}
