//! Plain-text renderers for coordinator outcomes.
//!
//! The coordinator emits structured data; this module is the only place that
//! turns it into chat copy.

use assistant::{AssistantError, Outcome};
use engine::{
    BalanceUpdate, Money, TransactionRecord,
    report::{BucketStatus, Report},
};

pub(crate) fn render_outcome(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Unauthorized => String::new(),
        Outcome::Committed {
            records,
            duplicates,
            balances,
            rejected,
        } => render_committed(records, duplicates, balances, rejected),
        Outcome::Clarification { options } => render_clarification(options),
        Outcome::BulkConfirmation { matches } => render_bulk_confirmation(matches),
        Outcome::Deleted { records } => render_deleted(records),
        Outcome::Cancelled => "Okay, nothing was deleted.".to_string(),
        Outcome::NoMatch => {
            "I couldn't find a matching transaction in the recent ledger.".to_string()
        }
        Outcome::Report(report) => render_report(report),
        Outcome::CategorySpending {
            category,
            expense_minor,
            currency,
        } => format!(
            "Spent on {category} this month: {}",
            Money::new(*expense_minor).format(*currency)
        ),
        Outcome::Chat { reply } => reply.clone(),
    }
}

pub(crate) fn render_error(err: &AssistantError) -> String {
    match err {
        AssistantError::ServiceUnavailable(_) => {
            "The assistant service is unreachable right now. Try again in a minute.".to_string()
        }
        AssistantError::ExtractionFailed(_) => {
            "I couldn't read that as financial data. Try rephrasing, e.g. \"lunch 20\".".to_string()
        }
        AssistantError::Engine(err) => format!("Ledger error: {err}"),
    }
}

fn render_committed(
    records: &[TransactionRecord],
    duplicates: &[TransactionRecord],
    balances: &[BalanceUpdate],
    rejected: &[String],
) -> String {
    let mut lines = Vec::new();

    for record in records {
        lines.push(format!(
            "✅ Recorded {}: {} {}{}",
            record.kind.as_str(),
            record.category,
            Money::new(record.amount_minor).format(record.currency),
            note_suffix(&record.description, &record.category),
        ));
    }
    for record in duplicates {
        lines.push(format!(
            "⚠️ Skipped duplicate: {} {} (recorded recently)",
            record.category,
            Money::new(record.amount_minor).format(record.currency),
        ));
    }
    for update in balances {
        lines.push(match update {
            BalanceUpdate::Created(balance) | BalanceUpdate::Updated(balance) => format!(
                "📈 {}: {}",
                balance.account_name,
                Money::new(balance.balance_minor).format(balance.currency),
            ),
            BalanceUpdate::Unchanged(balance) => {
                format!("🆗 {} unchanged", balance.account_name)
            }
        });
    }
    for reason in rejected {
        lines.push(format!("✖ Skipped one entry: {reason}"));
    }

    if lines.is_empty() {
        return "I found no usable financial data in that message.".to_string();
    }
    lines.join("\n")
}

fn render_clarification(options: &[TransactionRecord]) -> String {
    let mut lines = vec![format!(
        "I found {} matching entries. Reply with a number to delete one:",
        options.len()
    )];
    for (i, record) in options.iter().enumerate() {
        lines.push(format!("{}. {}", i + 1, describe(record)));
    }
    lines.join("\n")
}

fn render_bulk_confirmation(matches: &[TransactionRecord]) -> String {
    let total: i64 = matches.iter().map(|r| r.amount_minor).sum();
    let currency = matches.first().map(|r| r.currency).unwrap_or_default();
    let mut lines = vec![format!(
        "This deletes {} entries totalling {}. Reply \"yes\" to confirm:",
        matches.len(),
        Money::new(total).format(currency)
    )];
    for record in matches {
        lines.push(format!("- {}", describe(record)));
    }
    lines.join("\n")
}

fn render_deleted(records: &[TransactionRecord]) -> String {
    match records {
        [single] => format!("🗑 Deleted: {}", describe(single)),
        many => format!("🗑 Deleted {} entries.", many.len()),
    }
}

fn render_report(report: &Report) -> String {
    let currency = report.currency;
    let mut lines = vec![
        format!("📊 Monthly report: {}", report.period.start.format("%Y-%m")),
        format!("💰 Income: {}", Money::new(report.income_minor).format(currency)),
        format!("💸 Expense: {}", Money::new(report.expense_minor).format(currency)),
        format!(
            "📉 Daily avg: {}",
            Money::new(report.daily_average_minor).format(currency)
        ),
        format!("🏦 Net: {}", Money::new(report.net_minor).format(currency)),
        format!(
            "🔮 Forecast month-end expense: {}",
            Money::new(report.forecast_minor).format(currency)
        ),
    ];
    if report.invested_minor > 0 {
        lines.push(format!(
            "📈 Invested: {}",
            Money::new(report.invested_minor).format(currency)
        ));
    }

    if !report.by_category.is_empty() {
        lines.push(String::new());
        lines.push("Top spending:".to_string());
        for category in report.by_category.iter().take(5) {
            lines.push(format!(
                "- {}: {}",
                category.category,
                Money::new(category.expense_minor).format(currency)
            ));
        }
    }

    lines.push(String::new());
    lines.push("50/30/20 check:".to_string());
    for bucket in &report.buckets {
        lines.push(format!(
            "- {}: {:.1}% of spending (target {:.0}%, {})",
            bucket.bucket.as_str(),
            bucket.share_pct,
            bucket.target_pct,
            status_label(bucket.status),
        ));
    }

    if !report.advice.is_empty() {
        lines.push(String::new());
        for advice in &report.advice {
            lines.push(format!("💡 {}. {}", advice.observation, advice.suggestion));
        }
    }

    if report.assets.total_minor != 0 || !report.assets.accounts.is_empty() {
        lines.push(String::new());
        lines.push(format!(
            "Assets: {}",
            Money::new(report.assets.total_minor).format(currency)
        ));
        for account in &report.assets.accounts {
            lines.push(format!(
                "- {}: {}",
                account.account_name,
                Money::new(account.balance_minor).format(account.currency)
            ));
        }
    }

    if !report.excluded.is_empty() {
        lines.push(format!(
            "⚠️ {} record(s) in other currencies were left out of the sums.",
            report.excluded.len()
        ));
    }

    lines.join("\n")
}

fn status_label(status: BucketStatus) -> &'static str {
    match status {
        BucketStatus::Over => "over",
        BucketStatus::Under => "under",
        BucketStatus::OnTarget => "on target",
    }
}

fn describe(record: &TransactionRecord) -> String {
    format!(
        "{} · {} · {} ({})",
        record.occurred_on.format("%Y-%m-%d"),
        record.category,
        Money::new(record.amount_minor).format(record.currency),
        record.description,
    )
}

/// The description is usually worth echoing, unless it just repeats the
/// category.
fn note_suffix(description: &str, category: &str) -> String {
    if description.is_empty() || description.eq_ignore_ascii_case(category) {
        return String::new();
    }
    format!(" · {description}")
}
