//! Schema validation boundary for candidates coming from the completion
//! service.
//!
//! The service returns loosely-typed key/value payloads. Nothing from that
//! side crosses into the ledger without passing [`validate`], which either
//! coerces a payload into a typed [`Candidate`] or rejects it with a reason.
//! Candidates from one message are validated independently; one rejection
//! never blocks its siblings.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::{Currency, EngineError, Money, RecordKind, ResultEngine};

/// Untyped candidate record as returned by the completion service.
///
/// Every field is optional on the wire; defaults and rejections are decided
/// here, not at parse time.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawRecord {
    /// "transaction" or "asset". Absent means transaction when a kind is
    /// present, asset when an account is present.
    pub record: Option<String>,
    pub kind: Option<String>,
    pub amount: Option<serde_json::Value>,
    pub currency: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub account: Option<String>,
    pub balance: Option<serde_json::Value>,
}

/// Context the validator needs beyond the payload itself.
#[derive(Clone, Debug)]
pub struct ValidationContext {
    /// "Today" from the requester's point of view; fallback for missing or
    /// unparsable dates.
    pub reference_date: NaiveDate,
    /// Fallback when the payload omits a currency.
    pub default_currency: Currency,
    /// The literal input text; fallback description.
    pub source_text: String,
}

/// A validated, not-yet-stored transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewTransaction {
    pub kind: RecordKind,
    pub amount_minor: i64,
    pub currency: Currency,
    pub category: String,
    pub description: String,
    pub occurred_on: NaiveDate,
}

/// A validated, not-yet-stored balance update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewBalance {
    pub account_name: String,
    pub balance_minor: i64,
    pub currency: Currency,
}

/// A candidate that survived validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Candidate {
    Transaction(NewTransaction),
    Balance(NewBalance),
}

const DEFAULT_CATEGORY: &str = "Other";

/// Validates and coerces one raw payload into a [`Candidate`].
///
/// Rules:
/// - the amount must parse to a positive value ([`EngineError::InvalidAmount`]);
/// - the kind must be a recognized variant ([`EngineError::UnknownRecordType`]),
///   never silently coerced;
/// - missing category/description default to "Other" and the literal input
///   text; missing currency defaults to the configured one;
/// - a missing or unparsable date falls back to the reference date instead of
///   failing: date resolution is best effort, not mandatory extracted data.
pub fn validate(raw: &RawRecord, ctx: &ValidationContext) -> ResultEngine<Candidate> {
    if is_balance(raw) {
        return validate_balance(raw, ctx).map(Candidate::Balance);
    }
    validate_transaction(raw, ctx).map(Candidate::Transaction)
}

fn is_balance(raw: &RawRecord) -> bool {
    match raw.record.as_deref().map(str::trim) {
        Some(r) if r.eq_ignore_ascii_case("asset") => true,
        Some(_) => false,
        None => raw.kind.is_none() && raw.account.is_some(),
    }
}

fn validate_transaction(raw: &RawRecord, ctx: &ValidationContext) -> ResultEngine<NewTransaction> {
    let kind = match raw.kind.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        Some(kind) => RecordKind::try_from(kind)?,
        None => {
            return Err(EngineError::UnknownRecordType(
                "candidate without kind".to_string(),
            ));
        }
    };

    let currency = candidate_currency(raw, ctx)?;

    let amount = raw
        .amount
        .as_ref()
        .ok_or_else(|| EngineError::InvalidAmount("candidate without amount".to_string()))?;
    let amount_minor = parse_amount(amount, currency)?;
    if amount_minor <= 0 {
        return Err(EngineError::InvalidAmount(
            "amount must be > 0".to_string(),
        ));
    }

    let category = non_empty(raw.category.as_deref())
        .unwrap_or(DEFAULT_CATEGORY)
        .to_string();
    let description = non_empty(raw.description.as_deref())
        .unwrap_or(ctx.source_text.trim())
        .to_string();
    let occurred_on = resolve_date(raw.date.as_deref(), ctx.reference_date);

    Ok(NewTransaction {
        kind,
        amount_minor,
        currency,
        category,
        description,
        occurred_on,
    })
}

fn validate_balance(raw: &RawRecord, ctx: &ValidationContext) -> ResultEngine<NewBalance> {
    let account_name = non_empty(raw.account.as_deref())
        .ok_or_else(|| {
            EngineError::UnknownRecordType("asset candidate without account name".to_string())
        })?
        .to_string();

    let currency = candidate_currency(raw, ctx)?;

    let balance = raw
        .balance
        .as_ref()
        .ok_or_else(|| EngineError::InvalidAmount("asset candidate without balance".to_string()))?;
    // Balances may be negative (liabilities); only unparsable input rejects.
    let balance_minor = parse_amount(balance, currency)?;

    Ok(NewBalance {
        account_name,
        balance_minor,
        currency,
    })
}

fn candidate_currency(raw: &RawRecord, ctx: &ValidationContext) -> ResultEngine<Currency> {
    match non_empty(raw.currency.as_deref()) {
        Some(code) => Currency::try_from(code),
        None => Ok(ctx.default_currency),
    }
}

/// Parses a JSON amount value (number or string) into minor units.
///
/// Numbers go through their canonical decimal rendering so the same
/// fraction-digit rules apply to `20.5` and `"20.5"`.
fn parse_amount(value: &serde_json::Value, currency: Currency) -> ResultEngine<i64> {
    let text = match value {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => strip_currency_marks(s),
        other => {
            return Err(EngineError::InvalidAmount(format!(
                "amount is not a number or string: {other}"
            )));
        }
    };
    Money::parse_major(&text, currency).map(Money::minor)
}

/// Drops leading currency symbols the vision path tends to leave in.
fn strip_currency_marks(s: &str) -> String {
    s.trim()
        .trim_start_matches(['¥', '￥', '$', '€', '£'])
        .trim()
        .to_string()
}

fn resolve_date(raw: Option<&str>, reference: NaiveDate) -> NaiveDate {
    let Some(raw) = non_empty(raw) else {
        return reference;
    };
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap_or(reference)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ValidationContext {
        ValidationContext {
            reference_date: NaiveDate::from_ymd_opt(2026, 8, 6).unwrap(),
            default_currency: Currency::Cny,
            source_text: "lunch 20 and taxi 15 yesterday".to_string(),
        }
    }

    fn raw(json: serde_json::Value) -> RawRecord {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn valid_expense_with_defaults() {
        let candidate = validate(
            &raw(serde_json::json!({"kind": "expense", "amount": 20.5})),
            &ctx(),
        )
        .unwrap();
        let Candidate::Transaction(tx) = candidate else {
            panic!("expected transaction");
        };
        assert_eq!(tx.kind, RecordKind::Expense);
        assert_eq!(tx.amount_minor, 2050);
        assert_eq!(tx.currency, Currency::Cny);
        assert_eq!(tx.category, "Other");
        assert_eq!(tx.description, "lunch 20 and taxi 15 yesterday");
        assert_eq!(tx.occurred_on, NaiveDate::from_ymd_opt(2026, 8, 6).unwrap());
    }

    #[test]
    fn amount_as_string_with_symbol() {
        let candidate = validate(
            &raw(serde_json::json!({"kind": "income", "amount": "¥3000", "category": "Salary"})),
            &ctx(),
        )
        .unwrap();
        let Candidate::Transaction(tx) = candidate else {
            panic!("expected transaction");
        };
        assert_eq!(tx.amount_minor, 300_000);
        assert_eq!(tx.category, "Salary");
    }

    #[test]
    fn rejects_zero_and_negative_amounts() {
        for amount in [serde_json::json!(0), serde_json::json!(-12.5)] {
            let err = validate(&raw(serde_json::json!({"kind": "expense", "amount": amount})), &ctx())
                .unwrap_err();
            assert!(matches!(err, EngineError::InvalidAmount(_)), "{err}");
        }
    }

    #[test]
    fn rejects_unknown_kind_instead_of_coercing() {
        let err = validate(
            &raw(serde_json::json!({"kind": "transfer", "amount": 10})),
            &ctx(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::UnknownRecordType(_)));
    }

    #[test]
    fn unparsable_date_falls_back_to_reference() {
        let candidate = validate(
            &raw(serde_json::json!({
                "kind": "expense", "amount": 15, "date": "yesterday-ish"
            })),
            &ctx(),
        )
        .unwrap();
        let Candidate::Transaction(tx) = candidate else {
            panic!("expected transaction");
        };
        assert_eq!(tx.occurred_on, ctx().reference_date);
    }

    #[test]
    fn explicit_date_is_kept() {
        let candidate = validate(
            &raw(serde_json::json!({
                "kind": "expense", "amount": 15, "date": "2026-08-05"
            })),
            &ctx(),
        )
        .unwrap();
        let Candidate::Transaction(tx) = candidate else {
            panic!("expected transaction");
        };
        assert_eq!(tx.occurred_on, NaiveDate::from_ymd_opt(2026, 8, 5).unwrap());
    }

    #[test]
    fn asset_balance_may_be_negative() {
        let candidate = validate(
            &raw(serde_json::json!({
                "record": "asset", "account": "Credit Card", "balance": "-1500.00"
            })),
            &ctx(),
        )
        .unwrap();
        let Candidate::Balance(balance) = candidate else {
            panic!("expected balance");
        };
        assert_eq!(balance.account_name, "Credit Card");
        assert_eq!(balance.balance_minor, -150_000);
        assert_eq!(balance.currency, Currency::Cny);
    }

    #[test]
    fn asset_without_account_rejects() {
        let err = validate(
            &raw(serde_json::json!({"record": "asset", "balance": 100})),
            &ctx(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::UnknownRecordType(_)));
    }

    #[test]
    fn unknown_currency_rejects() {
        let err = validate(
            &raw(serde_json::json!({"kind": "expense", "amount": 10, "currency": "DOGE"})),
            &ctx(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::CurrencyMismatch(_)));
    }
}
