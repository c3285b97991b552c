//! Per-user conversation sequencing.
//!
//! The coordinator is a small finite-state machine keyed by user id:
//! `Idle → AwaitingClarification → Idle` for ambiguous deletions and
//! `Idle → AwaitingConfirmation → Idle` for bulk deletions. Single
//! unambiguous candidates commit immediately. Pending state expires after
//! [`PENDING_TTL`] and never survives a restart; it is a conversational
//! aid, not ledger data.
//!
//! Messages for one user are handled strictly in sequence: the per-user
//! session lock is held for the whole turn, so a second inbound message
//! waits until the first has either resolved or superseded the pending
//! state.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use engine::{
    BalanceUpdate, Candidate, CreateOutcome, Currency, Engine, RecordKind, RecordListFilter,
    TransactionRecord,
    report::{Period, Report},
    resolve::{MatchQuery, RECENCY_WINDOW_DAYS, Resolution, resolve},
};
use tokio::sync::Mutex;

use crate::{
    AssistantError,
    completion::{CompletionService, ImagePayload},
    extract::{DeleteRequest, Extraction, ExtractionRequest, Extractor, Validated},
};

/// Pending clarification/confirmation older than this is silently discarded.
pub const PENDING_TTL: Duration = Duration::from_secs(5 * 60);

/// At most this many options are offered in a clarification set.
const CLARIFY_LIMIT: usize = 5;

#[derive(Clone, Debug)]
enum Pending {
    Clarify { options: Vec<TransactionRecord> },
    ConfirmBulk { matches: Vec<TransactionRecord> },
}

#[derive(Debug, Default)]
struct Session {
    pending: Option<(Pending, Instant)>,
}

#[derive(Clone, Default)]
struct SessionStore {
    inner: Arc<Mutex<HashMap<u64, Arc<Mutex<Session>>>>>,
}

impl SessionStore {
    async fn session(&self, user_id: u64) -> Arc<Mutex<Session>> {
        let mut guard = self.inner.lock().await;
        guard.entry(user_id).or_default().clone()
    }
}

/// Coordinator configuration, threaded in explicitly instead of living in a
/// module-wide singleton.
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    /// Single-user gate; `None` disables the check (useful in tests).
    pub allowed_user_id: Option<u64>,
    pub default_currency: Currency,
    /// Timezone used to resolve "today" for dates and periods.
    pub timezone: Tz,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            allowed_user_id: None,
            default_currency: Currency::default(),
            timezone: chrono_tz::Asia::Shanghai,
        }
    }
}

/// One inbound chat message.
#[derive(Clone, Debug)]
pub struct Inbound {
    pub user_id: u64,
    pub text: Option<String>,
    pub image: Option<ImagePayload>,
}

/// What the transport should tell the user. Plain structured data; the
/// rendering markup is the transport's business.
#[derive(Debug)]
pub enum Outcome {
    /// Not the allow-listed principal; the transport stays silent.
    Unauthorized,
    Committed {
        records: Vec<TransactionRecord>,
        /// Identical recent records that were skipped, echoed back.
        duplicates: Vec<TransactionRecord>,
        balances: Vec<BalanceUpdate>,
        /// Rejection reasons of candidates that failed validation.
        rejected: Vec<String>,
    },
    /// Ambiguous deletion: ask the user to pick one by number.
    Clarification { options: Vec<TransactionRecord> },
    /// Explicit bulk deletion: ask the user to confirm before touching
    /// anything.
    BulkConfirmation { matches: Vec<TransactionRecord> },
    Deleted { records: Vec<TransactionRecord> },
    /// Bulk deletion declined.
    Cancelled,
    NoMatch,
    Report(Box<Report>),
    CategorySpending {
        category: String,
        expense_minor: i64,
        currency: Currency,
    },
    Chat { reply: String },
}

/// Sequences extraction, resolution, analysis and storage for one user.
pub struct Coordinator<C> {
    engine: Arc<Engine>,
    extractor: Extractor<C>,
    config: CoordinatorConfig,
    sessions: SessionStore,
}

impl<C: CompletionService> Coordinator<C> {
    pub fn new(engine: Arc<Engine>, extractor: Extractor<C>, config: CoordinatorConfig) -> Self {
        Self {
            engine,
            extractor,
            config,
            sessions: SessionStore::default(),
        }
    }

    /// Handles one inbound message end to end.
    pub async fn handle(&self, inbound: Inbound) -> Result<Outcome, AssistantError> {
        if !self.is_allowed(inbound.user_id) {
            tracing::warn!(user_id = inbound.user_id, "unauthorized access attempt");
            return Ok(Outcome::Unauthorized);
        }

        let session = self.sessions.session(inbound.user_id).await;
        let mut session = session.lock().await;

        // A fresh pending state either consumes this message or is discarded
        // by it; either way it is gone afterwards.
        if let Some(pending) = take_pending(&mut session)
            && let Some(text) = inbound.text.as_deref()
        {
            match pending {
                Pending::Clarify { options } => {
                    if let Some(index) = parse_selection(text, options.len()) {
                        let deleted = self.engine.delete_record(options[index].id).await?;
                        return Ok(Outcome::Deleted {
                            records: vec![deleted],
                        });
                    }
                }
                Pending::ConfirmBulk { matches } => {
                    if is_affirmative(text) {
                        let ids: Vec<_> = matches.iter().map(|r| r.id).collect();
                        self.engine.delete_records(&ids).await?;
                        return Ok(Outcome::Deleted { records: matches });
                    }
                    if is_negative(text) {
                        return Ok(Outcome::Cancelled);
                    }
                }
            }
        }

        if inbound.text.is_none() && inbound.image.is_none() {
            return Ok(Outcome::Chat {
                reply: default_chat_reply().to_string(),
            });
        }

        let today = self.today();
        let request = ExtractionRequest {
            text: inbound.text,
            image: inbound.image,
            reference_date: today,
            default_currency: self.config.default_currency,
        };

        match self.extractor.extract(&request).await? {
            Extraction::Records(items) => self.commit(items).await,
            Extraction::Delete(delete) => self.delete(&mut session, delete, today).await,
            Extraction::Query { category } => match category {
                Some(category) => self.category_spending(category, today).await,
                None => self.build_report(today).await,
            },
            Extraction::Chat { reply } => Ok(Outcome::Chat {
                reply: reply.unwrap_or_else(|| default_chat_reply().to_string()),
            }),
        }
    }

    /// The `/report` command: the current month's analysis on demand.
    pub async fn report(&self, user_id: u64) -> Result<Outcome, AssistantError> {
        if !self.is_allowed(user_id) {
            return Ok(Outcome::Unauthorized);
        }
        self.build_report(self.today()).await
    }

    /// Records of the current month, for export. `None` when the caller is
    /// not the allow-listed principal.
    pub async fn month_records(
        &self,
        user_id: u64,
    ) -> Result<Option<(Period, Vec<TransactionRecord>)>, AssistantError> {
        if !self.is_allowed(user_id) {
            return Ok(None);
        }
        let period = Period::calendar_month(self.today());
        let records = self
            .engine
            .list_records(&RecordListFilter {
                from: Some(period.start),
                to: Some(period.end),
                ..Default::default()
            })
            .await?;
        Ok(Some((period, records)))
    }

    /// Whether `user_id` is the allow-listed principal.
    pub fn authorized(&self, user_id: u64) -> bool {
        self.is_allowed(user_id)
    }

    fn is_allowed(&self, user_id: u64) -> bool {
        match self.config.allowed_user_id {
            None => true,
            Some(allowed) => allowed == user_id,
        }
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.config.timezone).date_naive()
    }

    async fn commit(&self, items: Vec<Validated>) -> Result<Outcome, AssistantError> {
        let mut records = Vec::new();
        let mut duplicates = Vec::new();
        let mut balances = Vec::new();
        let mut rejected = Vec::new();

        for item in items {
            match item {
                Validated::Valid(Candidate::Transaction(new)) => {
                    match self.engine.create_record_checked(new, Utc::now()).await? {
                        CreateOutcome::Created(record) => records.push(record),
                        CreateOutcome::Duplicate(existing) => duplicates.push(existing),
                    }
                }
                Validated::Valid(Candidate::Balance(new)) => {
                    let update = self.engine.upsert_balance(new, Utc::now()).await?;
                    balances.push(update);
                }
                Validated::Invalid { reason } => rejected.push(reason),
            }
        }

        Ok(Outcome::Committed {
            records,
            duplicates,
            balances,
            rejected,
        })
    }

    async fn delete(
        &self,
        session: &mut Session,
        delete: DeleteRequest,
        today: NaiveDate,
    ) -> Result<Outcome, AssistantError> {
        // Bounded search window: the recency window, or the whole month of an
        // explicitly named date.
        let (from, to) = match delete.date {
            Some(date) => {
                let month = Period::calendar_month(date);
                (month.start, month.end)
            }
            None => (today - chrono::Duration::days(RECENCY_WINDOW_DAYS), today),
        };

        let candidates = self
            .engine
            .list_records(&RecordListFilter {
                from: Some(from),
                to: Some(to),
                ..Default::default()
            })
            .await?;

        let query = MatchQuery {
            descriptor: delete.descriptor,
            bulk: delete.bulk,
        };

        match resolve(&query, &candidates) {
            Resolution::NoMatch => Ok(Outcome::NoMatch),
            Resolution::Unique(m) => {
                let deleted = self.engine.delete_record(m.record.id).await?;
                Ok(Outcome::Deleted {
                    records: vec![deleted],
                })
            }
            Resolution::Ambiguous(set) => {
                let options: Vec<TransactionRecord> = set
                    .into_iter()
                    .take(CLARIFY_LIMIT)
                    .map(|m| m.record)
                    .collect();
                session.pending = Some((
                    Pending::Clarify {
                        options: options.clone(),
                    },
                    Instant::now(),
                ));
                Ok(Outcome::Clarification { options })
            }
            Resolution::Bulk(set) => {
                let matches: Vec<TransactionRecord> = set.into_iter().map(|m| m.record).collect();
                session.pending = Some((
                    Pending::ConfirmBulk {
                        matches: matches.clone(),
                    },
                    Instant::now(),
                ));
                Ok(Outcome::BulkConfirmation { matches })
            }
        }
    }

    async fn category_spending(
        &self,
        category: String,
        today: NaiveDate,
    ) -> Result<Outcome, AssistantError> {
        let period = Period::calendar_month(today);
        let records = self
            .engine
            .list_records(&RecordListFilter {
                from: Some(period.start),
                to: Some(period.end),
                kind: Some(RecordKind::Expense),
                ..Default::default()
            })
            .await?;

        let needle = category.to_lowercase();
        let expense_minor = records
            .iter()
            .filter(|r| r.currency == self.config.default_currency)
            .filter(|r| r.category.to_lowercase().contains(&needle))
            .map(|r| r.amount_minor)
            .sum();

        Ok(Outcome::CategorySpending {
            category,
            expense_minor,
            currency: self.config.default_currency,
        })
    }

    async fn build_report(&self, today: NaiveDate) -> Result<Outcome, AssistantError> {
        let period = Period::calendar_month(today);
        let report = self
            .engine
            .period_report(period, today, self.config.default_currency)
            .await?;
        Ok(Outcome::Report(Box::new(report)))
    }
}

fn take_pending(session: &mut Session) -> Option<Pending> {
    let (pending, set_at) = session.pending.take()?;
    (set_at.elapsed() <= PENDING_TTL).then_some(pending)
}

/// "2" picks the second option of a clarification set.
fn parse_selection(text: &str, options: usize) -> Option<usize> {
    let choice: usize = text.trim().parse().ok()?;
    (1..=options).contains(&choice).then(|| choice - 1)
}

fn is_affirmative(text: &str) -> bool {
    matches!(
        text.trim().to_lowercase().as_str(),
        "yes" | "y" | "ok" | "confirm" | "是" | "确认"
    )
}

fn is_negative(text: &str) -> bool {
    matches!(
        text.trim().to_lowercase().as_str(),
        "no" | "n" | "cancel" | "否" | "取消"
    )
}

fn default_chat_reply() -> &'static str {
    "I track your finances: send an expense, an income, a receipt photo, or ask for a report."
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_parses_only_in_range() {
        assert_eq!(parse_selection("2", 3), Some(1));
        assert_eq!(parse_selection(" 1 ", 3), Some(0));
        assert_eq!(parse_selection("4", 3), None);
        assert_eq!(parse_selection("0", 3), None);
        assert_eq!(parse_selection("two", 3), None);
    }

    #[test]
    fn affirmation_and_negation_words() {
        assert!(is_affirmative("Yes"));
        assert!(is_affirmative("确认"));
        assert!(!is_affirmative("maybe"));
        assert!(is_negative("no"));
        assert!(is_negative("取消"));
    }
}
