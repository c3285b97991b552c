//! Turns free-form input into validated candidate records.
//!
//! The extractor builds a schema-constrained prompt, sends it to the
//! completion service and parses the JSON envelope that comes back. Every
//! candidate in the envelope passes through the engine's schema validator;
//! candidates are validated independently and partial success is allowed.
//! The extractor performs no arithmetic inference of its own: when the
//! service fails, the outcome is a clean error, never a guessed record.

use std::time::Duration;

use chrono::NaiveDate;
use engine::{Candidate, Currency, ValidationContext, validate};
use serde::Deserialize;

use crate::{
    AssistantError,
    completion::{CompletionRequest, CompletionService, ImagePayload},
};

/// Input payload plus the context extraction needs.
#[derive(Clone, Debug)]
pub struct ExtractionRequest {
    pub text: Option<String>,
    pub image: Option<ImagePayload>,
    /// "Today" from the user's point of view; relative dates resolve
    /// against this.
    pub reference_date: NaiveDate,
    pub default_currency: Currency,
}

impl ExtractionRequest {
    fn source_text(&self) -> String {
        match self.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(text) => text.to_string(),
            None => "receipt photo".to_string(),
        }
    }
}

/// One candidate after validation: either usable or rejected with a reason.
#[derive(Clone, Debug)]
pub enum Validated {
    Valid(Candidate),
    Invalid { reason: String },
}

/// A recognized deletion request, before resolution.
#[derive(Clone, Debug)]
pub struct DeleteRequest {
    pub descriptor: String,
    /// True only for the explicit bulk form; resolution never upgrades a
    /// singular descriptor to bulk.
    pub bulk: bool,
    /// Explicitly named date; widens the search window to that month.
    pub date: Option<NaiveDate>,
}

/// What the input turned out to be.
#[derive(Clone, Debug)]
pub enum Extraction {
    /// One or more candidate records (transactions and/or balances).
    Records(Vec<Validated>),
    Delete(DeleteRequest),
    /// An analytical question; `category` narrows it to one spending
    /// category.
    Query { category: Option<String> },
    /// No financial content; `reply` is the service's conversational answer.
    Chat { reply: Option<String> },
}

/// Wire envelope returned by the completion service. Everything is optional;
/// strictness lives in the validator, tolerance lives here.
#[derive(Debug, Default, Deserialize)]
struct Envelope {
    intent: Option<String>,
    #[serde(default)]
    records: Vec<engine::RawRecord>,
    delete: Option<RawDelete>,
    query: Option<RawQuery>,
    reply: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDelete {
    descriptor: Option<String>,
    #[serde(default)]
    bulk: bool,
    date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawQuery {
    category: Option<String>,
}

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);

/// Extraction engine over a completion service.
pub struct Extractor<C> {
    service: C,
    max_attempts: u32,
    backoff: Duration,
}

impl<C: CompletionService> Extractor<C> {
    pub fn new(service: C) -> Self {
        Self {
            service,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// Overrides the retry budget (attempts include the first call).
    pub fn with_retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff = backoff;
        self
    }

    /// Runs one extraction with bounded retries and exponential backoff.
    ///
    /// A malformed or empty envelope is retried like a network failure; after
    /// the budget is exhausted the last failure class is surfaced
    /// ([`AssistantError::ExtractionFailed`] or
    /// [`AssistantError::ServiceUnavailable`]).
    pub async fn extract(&self, request: &ExtractionRequest) -> Result<Extraction, AssistantError> {
        let completion_request = CompletionRequest {
            prompt: build_prompt(request),
            image: request.image.clone(),
        };

        let mut last_error = AssistantError::ExtractionFailed("no attempt made".to_string());
        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                let wait = self.backoff * 2u32.saturating_pow(attempt - 2);
                tokio::time::sleep(wait).await;
            }

            match self.service.complete(&completion_request).await {
                Ok(text) => match parse_envelope(&text, request) {
                    Ok(extraction) => return Ok(extraction),
                    Err(reason) => {
                        tracing::warn!(attempt, %reason, "unusable completion envelope");
                        last_error = AssistantError::ExtractionFailed(reason);
                    }
                },
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "completion call failed");
                    last_error = match err {
                        crate::completion::CompletionError::Empty => {
                            AssistantError::ExtractionFailed(err.to_string())
                        }
                        other => AssistantError::ServiceUnavailable(other.to_string()),
                    };
                }
            }
        }

        Err(last_error)
    }
}

/// Builds the schema-constrained prompt. The exact output shape is spelled
/// out so the envelope parser stays simple and strict.
fn build_prompt(request: &ExtractionRequest) -> String {
    let text = request.source_text();
    format!(
        r#"You are the extraction layer of a personal finance ledger. Analyze the user's input (text, or an attached receipt/screenshot image) and answer with ONE JSON object, no prose, matching this schema:

{{
  "intent": "record" | "delete" | "query" | "chat",
  "records": [
    {{"record": "transaction", "kind": "expense"|"income"|"investment", "amount": number, "currency": "ISO code, optional", "category": "short label, optional", "description": "short text, optional", "date": "YYYY-MM-DD, optional"}},
    {{"record": "asset", "account": "account name", "balance": number, "currency": "ISO code, optional"}}
  ],
  "delete": {{"descriptor": "what the user wants removed", "bulk": true|false, "date": "YYYY-MM-DD, optional"}},
  "query": {{"category": "spending category asked about, optional"}},
  "reply": "short conversational answer, only for intent chat"
}}

Rules:
- Current date: {date}. Resolve relative dates ("yesterday") to YYYY-MM-DD.
- Default currency: {currency}. Omit the currency field unless another one is explicit.
- One message may contain several records; list each separately.
- An asset-distribution screenshot yields one asset record per account.
- "bulk" is true only when the user explicitly asks to remove ALL matching entries.
- Never invent amounts. If no financial content is present, use intent "chat".

Input text: {text}"#,
        date = request.reference_date.format("%Y-%m-%d"),
        currency = request.default_currency.code(),
    )
}

/// Strips Markdown code fences some models wrap JSON in.
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

fn parse_envelope(text: &str, request: &ExtractionRequest) -> Result<Extraction, String> {
    let envelope: Envelope = serde_json::from_str(strip_fences(text))
        .map_err(|err| format!("malformed envelope: {err}"))?;

    let intent = envelope
        .intent
        .as_deref()
        .map(str::trim)
        .map(str::to_ascii_lowercase);

    match intent.as_deref() {
        // The original service labels balance-bearing answers separately;
        // every record-bearing intent funnels through the same validation.
        Some("record" | "update_asset" | "mixed") => validated_records(&envelope, request),
        Some("delete") => {
            let raw = envelope.delete.unwrap_or_default();
            let descriptor = raw
                .descriptor
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| request.source_text());
            Ok(Extraction::Delete(DeleteRequest {
                descriptor,
                bulk: raw.bulk,
                date: raw
                    .date
                    .as_deref()
                    .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
            }))
        }
        Some("query") => Ok(Extraction::Query {
            category: envelope
                .query
                .and_then(|q| q.category)
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
        }),
        Some("chat") => Ok(Extraction::Chat {
            reply: envelope.reply,
        }),
        // Tolerate a missing/unknown intent when the payload still carries
        // records; otherwise the envelope is unusable.
        _ if !envelope.records.is_empty() => validated_records(&envelope, request),
        other => Err(format!("unrecognized intent: {other:?}")),
    }
}

fn validated_records(
    envelope: &Envelope,
    request: &ExtractionRequest,
) -> Result<Extraction, String> {
    if envelope.records.is_empty() {
        return Err("record intent without records".to_string());
    }

    let ctx = ValidationContext {
        reference_date: request.reference_date,
        default_currency: request.default_currency,
        source_text: request.source_text(),
    };

    let items = envelope
        .records
        .iter()
        .map(|raw| match validate(raw, &ctx) {
            Ok(candidate) => Validated::Valid(candidate),
            Err(err) => Validated::Invalid {
                reason: err.to_string(),
            },
        })
        .collect();

    Ok(Extraction::Records(items))
}
