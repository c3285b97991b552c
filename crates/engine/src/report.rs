//! Period aggregation, budget-rule classification and forecasting.
//!
//! Everything here is a pure function over record slices so the numbers are
//! reproducible and unit-testable; the engine wraps [`summarize`] in a DB
//! snapshot (see `ops::reports`).

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AssetBalance, Currency, RecordKind, TransactionRecord};

/// An inclusive calendar period (`[start, end]`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    /// The calendar month containing `date`.
    #[must_use]
    pub fn calendar_month(date: NaiveDate) -> Self {
        let start = date.with_day(1).unwrap_or(date);
        let end = match start.month() {
            12 => start
                .with_year(start.year() + 1)
                .and_then(|d| d.with_month(1)),
            m => start.with_month(m + 1),
        }
        .and_then(|d| d.pred_opt())
        .unwrap_or(date);
        Self { start, end }
    }

    /// Total days in the period.
    #[must_use]
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Days from period start through `reference` (inclusive), clamped to the
    /// period. Before the period starts this is 0.
    #[must_use]
    pub fn elapsed_days(&self, reference: NaiveDate) -> i64 {
        if reference < self.start {
            return 0;
        }
        let reference = reference.min(self.end);
        (reference - self.start).num_days() + 1
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// The three 50/30/20 buckets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Needs,
    Wants,
    Savings,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [Bucket::Needs, Bucket::Wants, Bucket::Savings];

    /// Target share of total expense, in percent.
    #[must_use]
    pub const fn target_pct(self) -> f64 {
        match self {
            Bucket::Needs => 50.0,
            Bucket::Wants => 30.0,
            Bucket::Savings => 20.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Bucket::Needs => "Needs",
            Bucket::Wants => "Wants",
            Bucket::Savings => "Savings",
        }
    }
}

/// Fixed category to bucket lookup. Unmapped categories land in Wants:
/// unknown spending is assumed discretionary.
#[must_use]
pub fn bucket_for(category: &str) -> Bucket {
    match category.trim().to_lowercase().as_str() {
        "food" | "groceries" | "grocery" | "meals" | "餐饮" | "饮食" | "transport"
        | "transportation" | "commute" | "taxi" | "交通" | "rent" | "housing" | "房租"
        | "住房" | "utilities" | "水电" | "medical" | "health" | "healthcare" | "医疗"
        | "insurance" | "保险" | "education" | "教育" => Bucket::Needs,
        "savings" | "saving" | "储蓄" | "investment" | "投资" | "debt" | "loan" | "还款"
        | "贷款" => Bucket::Savings,
        _ => Bucket::Wants,
    }
}

/// Directional position of a bucket against its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketStatus {
    Over,
    Under,
    OnTarget,
}

/// Within this many percentage points of the target a bucket is OnTarget.
pub const BUCKET_TOLERANCE_PCT: f64 = 5.0;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BucketReport {
    pub bucket: Bucket,
    pub expense_minor: i64,
    pub share_pct: f64,
    pub target_pct: f64,
    pub status: BucketStatus,
}

/// One expense category with its period total, sorted descending in the
/// report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub expense_minor: i64,
}

/// A record left out of the sums because its currency is not the reporting
/// currency. Flagged, never converted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedRecord {
    pub id: Uuid,
    pub currency: Currency,
}

/// Deterministic advisory line derived from classification and forecast.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advice {
    pub bucket: Bucket,
    pub observation: String,
    pub suggestion: String,
}

/// Asset section of the report.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssetSummary {
    pub total_minor: i64,
    pub accounts: Vec<AssetBalance>,
    /// Account names excluded from the total because of a foreign currency.
    pub excluded: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Report {
    pub period: Period,
    pub currency: Currency,
    pub income_minor: i64,
    pub expense_minor: i64,
    pub invested_minor: i64,
    pub net_minor: i64,
    pub daily_average_minor: i64,
    pub by_category: Vec<CategoryTotal>,
    pub excluded: Vec<ExcludedRecord>,
    pub buckets: Vec<BucketReport>,
    pub forecast_minor: i64,
    pub advice: Vec<Advice>,
    pub assets: AssetSummary,
}

/// Computes the full period report.
///
/// Only records with `occurred_on` inside the period count; records in a
/// different currency are excluded from every sum and listed in
/// `excluded`. The forecast is a linear burn-rate extrapolation:
/// `expense_so_far / elapsed_days * period_days`, with no extrapolation when
/// `elapsed_days == 0`.
pub fn summarize(
    records: &[TransactionRecord],
    balances: &[AssetBalance],
    period: Period,
    reference_date: NaiveDate,
    currency: Currency,
) -> Report {
    let mut income_minor = 0i64;
    let mut expense_minor = 0i64;
    let mut invested_minor = 0i64;
    let mut excluded = Vec::new();
    let mut by_category: Vec<CategoryTotal> = Vec::new();

    for record in records {
        if !period.contains(record.occurred_on) {
            continue;
        }
        if record.currency != currency {
            excluded.push(ExcludedRecord {
                id: record.id,
                currency: record.currency,
            });
            continue;
        }
        match record.kind {
            RecordKind::Income => income_minor += record.amount_minor,
            RecordKind::Investment => invested_minor += record.amount_minor,
            RecordKind::Expense => {
                expense_minor += record.amount_minor;
                match by_category
                    .iter_mut()
                    .find(|c| c.category == record.category)
                {
                    Some(total) => total.expense_minor += record.amount_minor,
                    None => by_category.push(CategoryTotal {
                        category: record.category.clone(),
                        expense_minor: record.amount_minor,
                    }),
                }
            }
        }
    }

    by_category.sort_by(|a, b| {
        b.expense_minor
            .cmp(&a.expense_minor)
            .then_with(|| a.category.cmp(&b.category))
    });

    let elapsed_days = period.elapsed_days(reference_date);
    let period_days = period.days();
    let forecast_minor = forecast(expense_minor, elapsed_days, period_days);
    let daily_average_minor = if elapsed_days > 0 {
        expense_minor / elapsed_days
    } else {
        0
    };

    let buckets = classify(&by_category, expense_minor);
    let advice = advise(&buckets, income_minor, expense_minor, forecast_minor);
    let assets = summarize_assets(balances, currency);

    Report {
        period,
        currency,
        income_minor,
        expense_minor,
        invested_minor,
        net_minor: income_minor - expense_minor,
        daily_average_minor,
        by_category,
        excluded,
        buckets,
        forecast_minor,
        advice,
        assets,
    }
}

fn forecast(expense_minor: i64, elapsed_days: i64, period_days: i64) -> i64 {
    if elapsed_days == 0 {
        // Day zero: no burn rate to extrapolate from.
        return expense_minor;
    }
    let scaled = i128::from(expense_minor) * i128::from(period_days) / i128::from(elapsed_days);
    i64::try_from(scaled).unwrap_or(i64::MAX)
}

fn classify(by_category: &[CategoryTotal], expense_minor: i64) -> Vec<BucketReport> {
    Bucket::ALL
        .iter()
        .map(|&bucket| {
            let bucket_minor: i64 = by_category
                .iter()
                .filter(|c| bucket_for(&c.category) == bucket)
                .map(|c| c.expense_minor)
                .sum();
            let share_pct = if expense_minor > 0 {
                bucket_minor as f64 * 100.0 / expense_minor as f64
            } else {
                0.0
            };
            let target_pct = bucket.target_pct();
            let status = if (share_pct - target_pct).abs() <= BUCKET_TOLERANCE_PCT {
                BucketStatus::OnTarget
            } else if share_pct > target_pct {
                BucketStatus::Over
            } else {
                BucketStatus::Under
            };
            BucketReport {
                bucket,
                expense_minor: bucket_minor,
                share_pct,
                target_pct,
                status,
            }
        })
        .collect()
}

fn advise(
    buckets: &[BucketReport],
    income_minor: i64,
    expense_minor: i64,
    forecast_minor: i64,
) -> Vec<Advice> {
    let mut advice = Vec::new();

    for report in buckets {
        let observation = format!(
            "{} takes {:.1}% of spending (target {:.0}%)",
            report.bucket.as_str(),
            report.share_pct,
            report.target_pct
        );
        match (report.bucket, report.status) {
            (Bucket::Needs, BucketStatus::Over) => advice.push(Advice {
                bucket: report.bucket,
                observation,
                suggestion: "Essentials dominate the budget; review recurring bills and housing costs.".to_string(),
            }),
            (Bucket::Wants, BucketStatus::Over) => advice.push(Advice {
                bucket: report.bucket,
                observation,
                suggestion: "Discretionary spending is above target; pick one category to cap this month.".to_string(),
            }),
            (Bucket::Savings, BucketStatus::Under) => advice.push(Advice {
                bucket: report.bucket,
                observation,
                suggestion: "Savings and debt payments are below the 20% target; schedule a transfer right after income arrives.".to_string(),
            }),
            _ => {}
        }
    }

    if income_minor > 0 && forecast_minor > income_minor {
        advice.push(Advice {
            bucket: Bucket::Savings,
            observation: "Projected month-end spending exceeds income at the current pace".to_string(),
            suggestion: "Slow the daily burn rate or the month closes in deficit.".to_string(),
        });
    } else if expense_minor == 0 {
        advice.push(Advice {
            bucket: Bucket::Needs,
            observation: "No expense recorded in this period yet".to_string(),
            suggestion: "Log purchases as they happen for an accurate month-end picture.".to_string(),
        });
    }

    advice
}

fn summarize_assets(balances: &[AssetBalance], currency: Currency) -> AssetSummary {
    let mut total_minor = 0i64;
    let mut excluded = Vec::new();
    for balance in balances {
        if balance.currency == currency {
            total_minor += balance.balance_minor;
        } else {
            excluded.push(balance.account_name.clone());
        }
    }
    AssetSummary {
        total_minor,
        accounts: balances.to_vec(),
        excluded,
    }
}
