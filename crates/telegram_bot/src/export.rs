//! CSV export of ledger records.

use csv::Writer;
use engine::{Currency, TransactionRecord};

pub(crate) fn records_csv(records: &[TransactionRecord]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record([
        "id",
        "kind",
        "amount",
        "currency",
        "category",
        "description",
        "occurred_on",
        "created_at",
    ])?;

    for record in records {
        writer.write_record([
            record.id.to_string(),
            record.kind.as_str().to_string(),
            major_units(record.amount_minor, record.currency),
            record.currency.code().to_string(),
            record.category.clone(),
            record.description.clone(),
            record.occurred_on.format("%Y-%m-%d").to_string(),
            record.created_at.to_rfc3339(),
        ])?;
    }

    Ok(writer.into_inner().map_err(|err| err.into_error())?)
}

/// Plain decimal string in major units, without a currency code; the
/// currency has its own column.
fn major_units(minor: i64, currency: Currency) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    let scale = currency.minor_scale().unsigned_abs();
    if currency.minor_units() == 0 {
        return format!("{sign}{abs}");
    }
    format!(
        "{sign}{}.{:0width$}",
        abs / scale,
        abs % scale,
        width = currency.minor_units() as usize
    )
}
