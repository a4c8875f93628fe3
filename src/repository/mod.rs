//! Access to the content repository that owns the records being sanitized.
//!
//! The crate ships with [`FsRepository`], which keeps one JSON document per
//! record in a directory. Implement the [`ContentRepository`] trait to
//! connect another content store.

mod fs;

pub use fs::FsRepository;

use std::future::Future;

use crate::error::Result;
use crate::record::{ContentFilter, ContentRecord};

/// Trait for content stores the batch driver can read from and write to.
///
/// # Implementing a custom repository
///
/// ```rust,no_run
/// use ucf_content_sanitizer::{ContentFilter, ContentRecord, ContentRepository, Result};
///
/// struct MyRepository;
///
/// impl ContentRepository for MyRepository {
///     async fn fetch(&self, filter: &ContentFilter) -> Result<Vec<ContentRecord>> {
///         // query records matching `filter` ...
///         Ok(Vec::new())
///     }
///
///     async fn update_body(&self, id: &str, body: &str) -> Result<()> {
///         // persist the new body ...
///         Ok(())
///     }
///
///     async fn invalidate_cache(&self, id: &str) {}
/// }
/// ```
pub trait ContentRepository: Send + Sync {
    /// Return every record matching `filter`, in the repository's natural
    /// order. The result is a snapshot; later changes are not reflected.
    fn fetch(
        &self,
        filter: &ContentFilter,
    ) -> impl Future<Output = Result<Vec<ContentRecord>>> + Send;

    /// Replace the body of record `id`, leaving every other field untouched.
    fn update_body(&self, id: &str, body: &str) -> impl Future<Output = Result<()>> + Send;

    /// Drop any cached copy of record `id`.
    fn invalidate_cache(&self, id: &str) -> impl Future<Output = ()> + Send;
}
