//! # ucf_content_sanitizer
//!
//! Sanitizes authored HTML content by unwrapping links that point through
//! known redirection services (the `postmaster.smca.ucf.edu` redirector and
//! Outlook Safelinks) back to their final destination.
//!
//! ## Overview
//!
//! Links are rewritten by a [`SanitizerPipeline`] built for a [`Context`]:
//!
//! - [`BatchDriver`] walks every eligible record in a [`ContentRepository`],
//!   sanitizes each body and writes back only the bodies that changed.
//! - [`SaveHook`] sanitizes a single body inline, just before it is saved.
//! - [`Context::Paste`] pipelines clean HTML pasted into the editor.
//!
//! Which redirectors are unwrapped is controlled by [`FeatureFlags`],
//! resolved once per run from [`Settings`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use ucf_content_sanitizer::{BatchDriver, Context, FeatureFlags, FsRepository, Settings};
//!
//! # async fn example() -> ucf_content_sanitizer::Result<()> {
//! let settings = Settings::load(None)?;
//! let repository = FsRepository::new("/var/data/content");
//!
//! let result = BatchDriver::new(&repository, FeatureFlags::resolve(&settings, Context::Batch))
//!     .enabled_types(settings.enabled_post_types.clone())
//!     .run()
//!     .await?;
//!
//! println!("{result}");
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod hook;
pub mod record;
pub mod redirect;
pub mod repository;
pub mod sanitizer;

pub use batch::{BatchDriver, BatchProgress, BatchRunResult, RecordOutcome, RecordStatus};
pub use config::{FeatureFlags, FlagSource, Settings};
pub use error::{Result, SanitizerError};
pub use hook::SaveHook;
pub use record::{ContentFilter, ContentRecord, PostStatus};
pub use redirect::{Decode, RedirectRule};
pub use repository::{ContentRepository, FsRepository};
pub use sanitizer::{
    Attributes, Context, LinkSanitizer, SanitizationOutcome, Sanitizer, SanitizerPipeline,
    TagTransformSanitizer, rewrite_links, sanitize,
};
