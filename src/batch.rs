//! Bulk re-sanitization of every eligible record in a repository.
//!
//! The driver fetches one snapshot of eligible records, runs the batch
//! pipeline over each body strictly one record at a time, and writes back
//! only bodies that actually changed. A failed write is recorded against
//! that record and the run carries on.

use std::fmt;

use tokio::sync::oneshot;

use crate::config::FeatureFlags;
use crate::error::Result;
use crate::record::{ContentFilter, ContentRecord};
use crate::repository::ContentRepository;
use crate::sanitizer::{Context, SanitizerPipeline};

/// What happened to a single record during a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordStatus {
    /// Sanitizing produced an identical body; nothing was written.
    Unchanged,
    /// The sanitized body was written back.
    Updated,
    /// The sanitized body differed but could not be written.
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordOutcome {
    pub id: String,
    pub status: RecordStatus,
}

/// Totals and per-record results of one [`BatchDriver::run`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchRunResult {
    /// Number of records in the fetched snapshot.
    pub snapshot_size: usize,
    /// Records processed. Equal to `snapshot_size` unless the run was interrupted.
    pub total_examined: usize,
    /// Records whose body was successfully rewritten.
    pub total_changed: usize,
    pub outcomes: Vec<RecordOutcome>,
    /// `true` if a shutdown signal stopped the run early.
    pub interrupted: bool,
}

impl BatchRunResult {
    /// Ids of records whose sanitized body could not be written.
    pub fn failed(&self) -> impl Iterator<Item = &str> {
        self.outcomes.iter().filter_map(|o| match o.status {
            RecordStatus::Failed(_) => Some(o.id.as_str()),
            _ => None,
        })
    }
}

impl fmt::Display for BatchRunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Updated post content within {} posts out of {} processed posts.",
            self.total_changed, self.total_examined
        )
    }
}

/// Observer notified as a run advances. Purely informational.
pub trait BatchProgress: Send {
    /// Called once after the snapshot is fetched.
    fn start(&mut self, _total: usize) {}

    /// Called after each record is processed.
    fn tick(&mut self, _outcome: &RecordOutcome) {}

    /// Called once when the run ends, interrupted or not.
    fn finish(&mut self, _result: &BatchRunResult) {}
}

/// Progress observer that ignores every notification.
impl BatchProgress for () {}

/// Builder and runner for a bulk sanitization pass.
///
/// # Example
///
/// ```rust,no_run
/// use ucf_content_sanitizer::{BatchDriver, FeatureFlags, FsRepository};
///
/// # async fn example() -> ucf_content_sanitizer::Result<()> {
/// let repository = FsRepository::new("/var/data/content");
/// let result = BatchDriver::new(&repository, FeatureFlags::ALL)
///     .enabled_types(["post", "page"])
///     .run()
///     .await?;
/// println!("{result}");
/// # Ok(())
/// # }
/// ```
pub struct BatchDriver<'a, R: ContentRepository> {
    repository: &'a R,
    flags: FeatureFlags,
    enabled_types: Vec<String>,
    progress: Box<dyn BatchProgress + 'a>,
    shutdown: Option<oneshot::Receiver<()>>,
}

impl<'a, R: ContentRepository> BatchDriver<'a, R> {
    /// Create a driver over `repository` with defaults: post types `post`
    /// and `page`, no progress reporting, no shutdown signal.
    pub fn new(repository: &'a R, flags: FeatureFlags) -> Self {
        Self {
            repository,
            flags,
            enabled_types: vec!["post".into(), "page".into()],
            progress: Box::new(()),
            shutdown: None,
        }
    }

    /// Content types whose records are processed.
    pub fn enabled_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enabled_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn progress(mut self, progress: impl BatchProgress + 'a) -> Self {
        self.progress = Box::new(progress);
        self
    }

    /// Stop before the next record once a value is sent on this channel.
    /// The partial result is still returned.
    pub fn shutdown(mut self, shutdown: oneshot::Receiver<()>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Fetch the snapshot and process every record in it.
    ///
    /// Only a failed fetch is returned as an error; failed writes are
    /// reported through [`BatchRunResult::outcomes`].
    pub async fn run(mut self) -> Result<BatchRunResult> {
        let filter = ContentFilter::eligible(self.enabled_types.iter().cloned());
        let records = self.repository.fetch(&filter).await?;
        let pipeline = SanitizerPipeline::for_context(Context::Batch, &self.flags);

        tracing::info!(
            records = records.len(),
            stages = pipeline.len(),
            "Sanitizing post content"
        );

        let mut result = BatchRunResult {
            snapshot_size: records.len(),
            outcomes: Vec::with_capacity(records.len()),
            ..BatchRunResult::default()
        };
        self.progress.start(records.len());

        for record in &records {
            if self.shutdown_requested() {
                tracing::info!("Shutdown signal received, stopping batch run");
                result.interrupted = true;
                break;
            }

            let outcome = self.process(&pipeline, record).await;
            result.total_examined += 1;
            if outcome.status == RecordStatus::Updated {
                result.total_changed += 1;
            }
            self.progress.tick(&outcome);
            result.outcomes.push(outcome);
        }

        self.progress.finish(&result);
        tracing::info!(
            changed = result.total_changed,
            examined = result.total_examined,
            interrupted = result.interrupted,
            "Batch run finished"
        );
        Ok(result)
    }

    fn shutdown_requested(&mut self) -> bool {
        self.shutdown
            .as_mut()
            .is_some_and(|rx| rx.try_recv().is_ok())
    }

    async fn process(&self, pipeline: &SanitizerPipeline, record: &ContentRecord) -> RecordOutcome {
        let outcome = pipeline.outcome(&record.body);
        let status = if !outcome.changed() {
            tracing::debug!(id = %record.id, "Content unchanged");
            RecordStatus::Unchanged
        } else {
            match self.repository.update_body(&record.id, &outcome.sanitized).await {
                Ok(()) => {
                    self.repository.invalidate_cache(&record.id).await;
                    tracing::debug!(id = %record.id, "Content updated");
                    RecordStatus::Updated
                }
                Err(e) => {
                    tracing::warn!(id = %record.id, "Failed to update content: {e}");
                    RecordStatus::Failed(e.to_string())
                }
            }
        };

        RecordOutcome {
            id: record.id.clone(),
            status,
        }
    }
}
