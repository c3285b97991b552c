//! Natural-language front half of the ledger.
//!
//! `completion` talks to the external text-and-vision service, `extract`
//! turns its loosely-typed answers into validated candidates, and
//! `coordinator` sequences the conversation (commits, clarifications,
//! confirmations) on top of the engine.

pub use completion::{
    CompletionError, CompletionRequest, CompletionService, DEFAULT_BASE_URL, DEFAULT_MODEL,
    DEFAULT_TIMEOUT, GeminiClient, ImagePayload,
};
pub use coordinator::{Coordinator, CoordinatorConfig, Inbound, Outcome, PENDING_TTL};
pub use error::AssistantError;
pub use extract::{DeleteRequest, Extraction, ExtractionRequest, Extractor, Validated};

mod completion;
mod coordinator;
mod error;
mod extract;
