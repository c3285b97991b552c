use engine::EngineError;
use thiserror::Error;

/// Errors surfaced by the extraction and coordination layer.
///
/// Resolver ambiguity and no-match are *not* errors; they are conversational
/// outcomes (see `coordinator::Outcome`).
#[derive(Debug, Error)]
pub enum AssistantError {
    /// The completion service answered, but nothing usable came back
    /// (malformed envelope, empty output) even after retries.
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),
    /// The completion service could not be reached within the configured
    /// timeout/retry budget.
    #[error("completion service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
}
