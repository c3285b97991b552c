//! Internal helpers for model validation and conversion.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation and mapping logic so the engine enforces consistent invariants.

use uuid::Uuid;

use crate::{Currency, EngineError, RecordKind, ResultEngine};

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::InvalidId(format!("invalid {label} id")))
}

/// Parse a currency code stored in the DB into a strongly typed `Currency`.
pub(crate) fn model_currency(value: &str) -> ResultEngine<Currency> {
    Currency::try_from(value)
        .map_err(|_| EngineError::CurrencyMismatch(format!("invalid stored currency: {value}")))
}

/// Parse a record kind stored in the DB into a strongly typed `RecordKind`.
pub(crate) fn model_kind(value: &str) -> ResultEngine<RecordKind> {
    RecordKind::try_from(value)
        .map_err(|_| EngineError::UnknownRecordType(format!("invalid stored kind: {value}")))
}
