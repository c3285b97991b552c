//! Ledger core: validation, reference resolution and period analysis over a
//! SQLite-backed store.
//!
//! The engine owns every mutation of the ledger. Callers hand it validated
//! candidates (see [`validate`]) or natural-language references (see
//! [`resolve`]); nothing writes to the tables directly.

pub use currency::Currency;
pub use error::EngineError;
pub use money::Money;
pub use ops::{BalanceUpdate, CreateOutcome, Engine, EngineBuilder, RecordListFilter};
pub use records::{AssetBalance, RecordKind, TransactionRecord};
pub use validate::{Candidate, NewBalance, NewTransaction, RawRecord, ValidationContext, validate};

pub mod report;
pub mod resolve;

mod asset_balances;
mod currency;
mod error;
mod ledger_records;
mod money;
mod ops;
mod records;
mod util;
mod validate;

type ResultEngine<T> = Result<T, EngineError>;
