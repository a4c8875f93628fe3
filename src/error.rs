//! Error types for the `ucf_content_sanitizer` crate.

/// All errors that can occur while sanitizing content or talking to the
/// content repository.
#[derive(Debug, thiserror::Error)]
pub enum SanitizerError {
    /// The eligible record set could not be fetched. Fatal to a batch run.
    #[error("Repository fetch failed: {0}")]
    RepositoryFetch(Box<dyn std::error::Error + Send + Sync>),

    /// A single record body could not be written back.
    #[error("Repository update failed for record {id}: {source}")]
    RepositoryUpdate {
        id: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The record id cannot be mapped onto a repository key.
    #[error("Invalid record id: {0}")]
    InvalidRecordId(String),

    /// Settings could not be extracted from defaults, file and environment.
    #[error("Config error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A type alias for `Result<T, SanitizerError>`.
pub type Result<T> = std::result::Result<T, SanitizerError>;
