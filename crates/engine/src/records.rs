//! Ledger record primitives.
//!
//! A `TransactionRecord` is a single money movement; an `AssetBalance` is the
//! current stated balance of one account. Both are created and mutated only
//! through the engine.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Expense,
    Income,
    Investment,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
            Self::Investment => "investment",
        }
    }
}

impl TryFrom<&str> for RecordKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "expense" => Ok(Self::Expense),
            "income" => Ok(Self::Income),
            // The upstream data source splits investment flows in two; the
            // ledger keeps a single kind and the sign lives in the amount's
            // direction of use, not in the kind.
            "investment" | "invest_in" | "invest_out" => Ok(Self::Investment),
            other => Err(EngineError::UnknownRecordType(format!(
                "invalid record kind: {other}"
            ))),
        }
    }
}

/// A stored money movement.
///
/// Invariants: `amount_minor > 0` for every kind; expenses and income are
/// distinguished by `kind`, never by sign. `created_at` is immutable and is
/// what "the last transaction" resolves against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub kind: RecordKind,
    pub amount_minor: i64,
    pub currency: Currency,
    pub category: String,
    pub description: String,
    pub occurred_on: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kind: RecordKind,
        amount_minor: i64,
        currency: Currency,
        category: String,
        description: String,
        occurred_on: NaiveDate,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if amount_minor <= 0 {
            return Err(EngineError::InvalidAmount(
                "amount_minor must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            kind,
            amount_minor,
            currency,
            category,
            description,
            occurred_on,
            created_at,
        })
    }
}

/// Current stated balance of one account ("Alipay", "Bank", ...).
///
/// Exactly one balance exists per `account_name`; an update replaces the
/// stored value. Negative balances are legal (liabilities).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub account_name: String,
    pub balance_minor: i64,
    pub currency: Currency,
    pub updated_at: DateTime<Utc>,
}
