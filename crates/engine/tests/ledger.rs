use chrono::{Duration, NaiveDate, TimeZone, Utc};
use sea_orm::Database;

use engine::report::Period;
use engine::{
    BalanceUpdate, CreateOutcome, Currency, Engine, EngineError, NewBalance, NewTransaction,
    RecordKind, RecordListFilter,
};
use migration::MigratorTrait;
use uuid::Uuid;

async fn engine_with_db() -> Engine {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Engine::builder().database(db).build().await.unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn new_expense(amount_minor: i64, category: &str, occurred_on: NaiveDate) -> NewTransaction {
    NewTransaction {
        kind: RecordKind::Expense,
        amount_minor,
        currency: Currency::Cny,
        category: category.to_string(),
        description: format!("{category} purchase"),
        occurred_on,
    }
}

#[tokio::test]
async fn create_then_get_round_trips() {
    let engine = engine_with_db().await;
    let created_at = Utc.with_ymd_and_hms(2026, 8, 6, 10, 30, 0).unwrap();

    let created = engine
        .create_record(new_expense(2050, "Food", date(2026, 8, 6)), created_at)
        .await
        .unwrap();
    let fetched = engine.record(created.id).await.unwrap();

    assert_eq!(fetched, created);
}

#[tokio::test]
async fn last_record_is_max_created_at() {
    let engine = engine_with_db().await;
    let base = Utc.with_ymd_and_hms(2026, 8, 1, 8, 0, 0).unwrap();

    let mut newest_id = None;
    for i in 0..10 {
        let created = engine
            .create_record(
                new_expense(1000 + i, "Transport", date(2026, 8, 1)),
                base + Duration::minutes(i),
            )
            .await
            .unwrap();
        newest_id = Some(created.id);
    }

    let last = engine.last_record().await.unwrap().unwrap();
    assert_eq!(Some(last.id), newest_id);
}

#[tokio::test]
async fn delete_removes_exactly_one_record() {
    let engine = engine_with_db().await;
    let now = Utc::now();

    let keep = engine
        .create_record(new_expense(1000, "Food", date(2026, 8, 5)), now)
        .await
        .unwrap();
    let gone = engine
        .create_record(new_expense(2000, "Transport", date(2026, 8, 5)), now)
        .await
        .unwrap();

    let deleted = engine.delete_record(gone.id).await.unwrap();
    assert_eq!(deleted.id, gone.id);

    assert!(engine.record(keep.id).await.is_ok());
    let err = engine.record(gone.id).await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}

#[tokio::test]
async fn deleting_unknown_id_is_key_not_found() {
    let engine = engine_with_db().await;
    let err = engine.delete_record(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}

#[tokio::test]
async fn bulk_delete_removes_the_whole_set() {
    let engine = engine_with_db().await;
    let now = Utc::now();

    let mut ids = Vec::new();
    for i in 0..3 {
        let created = engine
            .create_record(
                new_expense(1500, "Transport", date(2026, 8, 2)),
                now + Duration::seconds(i),
            )
            .await
            .unwrap();
        ids.push(created.id);
    }
    let keep = engine
        .create_record(new_expense(900, "Food", date(2026, 8, 2)), now)
        .await
        .unwrap();

    let removed = engine.delete_records(&ids).await.unwrap();
    assert_eq!(removed, 3);
    assert!(engine.record(keep.id).await.is_ok());
}

#[tokio::test]
async fn duplicate_guard_skips_identical_recent_transactions() {
    let engine = engine_with_db().await;
    let now = Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap();

    let first = match engine
        .create_record_checked(new_expense(2050, "Food", date(2026, 8, 6)), now)
        .await
        .unwrap()
    {
        CreateOutcome::Created(record) => record,
        CreateOutcome::Duplicate(_) => panic!("first insert must not be a duplicate"),
    };

    let second = engine
        .create_record_checked(
            new_expense(2050, "Food", date(2026, 8, 6)),
            now + Duration::hours(1),
        )
        .await
        .unwrap();
    match second {
        CreateOutcome::Duplicate(existing) => assert_eq!(existing.id, first.id),
        CreateOutcome::Created(_) => panic!("identical transaction within 24h must be skipped"),
    }

    // Outside the window the same entry is legitimate again.
    let third = engine
        .create_record_checked(
            new_expense(2050, "Food", date(2026, 8, 8)),
            now + Duration::hours(25),
        )
        .await
        .unwrap();
    assert!(matches!(third, CreateOutcome::Created(_)));
}

#[tokio::test]
async fn list_filters_by_kind_category_and_range() {
    let engine = engine_with_db().await;
    let now = Utc::now();

    engine
        .create_record(new_expense(1000, "Food", date(2026, 8, 1)), now)
        .await
        .unwrap();
    engine
        .create_record(new_expense(2000, "Transport", date(2026, 8, 10)), now)
        .await
        .unwrap();
    engine
        .create_record(
            NewTransaction {
                kind: RecordKind::Income,
                amount_minor: 500_000,
                currency: Currency::Cny,
                category: "Salary".to_string(),
                description: "August".to_string(),
                occurred_on: date(2026, 8, 1),
            },
            now,
        )
        .await
        .unwrap();

    let expenses = engine
        .list_records(&RecordListFilter {
            kind: Some(RecordKind::Expense),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(expenses.len(), 2);

    let early_august = engine
        .list_records(&RecordListFilter {
            from: Some(date(2026, 8, 1)),
            to: Some(date(2026, 8, 5)),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(early_august.len(), 2);

    let transport = engine
        .list_records(&RecordListFilter {
            category: Some("Transport".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(transport.len(), 1);
    assert_eq!(transport[0].amount_minor, 2000);
}

#[tokio::test]
async fn balances_replace_never_append() {
    let engine = engine_with_db().await;
    let now = Utc::now();

    let created = engine
        .upsert_balance(
            NewBalance {
                account_name: "Alipay".to_string(),
                balance_minor: 120_000,
                currency: Currency::Cny,
            },
            now,
        )
        .await
        .unwrap();
    assert!(matches!(created, BalanceUpdate::Created(_)));

    let unchanged = engine
        .upsert_balance(
            NewBalance {
                account_name: "Alipay".to_string(),
                balance_minor: 120_000,
                currency: Currency::Cny,
            },
            now + Duration::hours(1),
        )
        .await
        .unwrap();
    assert!(matches!(unchanged, BalanceUpdate::Unchanged(_)));

    let updated = engine
        .upsert_balance(
            NewBalance {
                account_name: "Alipay".to_string(),
                balance_minor: 90_000,
                currency: Currency::Cny,
            },
            now + Duration::hours(2),
        )
        .await
        .unwrap();
    assert!(matches!(updated, BalanceUpdate::Updated(_)));

    let balances = engine.list_balances().await.unwrap();
    assert_eq!(balances.len(), 1);
    assert_eq!(balances[0].balance_minor, 90_000);
}

#[tokio::test]
async fn period_report_reads_a_consistent_snapshot() {
    let engine = engine_with_db().await;
    let now = Utc.with_ymd_and_hms(2026, 8, 6, 9, 0, 0).unwrap();

    engine
        .create_record(new_expense(30_000, "Food", date(2026, 8, 3)), now)
        .await
        .unwrap();
    engine
        .create_record(new_expense(15_000, "Transport", date(2026, 8, 4)), now)
        .await
        .unwrap();
    // Outside the period: must not count.
    engine
        .create_record(new_expense(99_000, "Food", date(2026, 7, 30)), now)
        .await
        .unwrap();
    engine
        .upsert_balance(
            NewBalance {
                account_name: "Bank".to_string(),
                balance_minor: 1_000_000,
                currency: Currency::Cny,
            },
            now,
        )
        .await
        .unwrap();

    let period = Period::calendar_month(date(2026, 8, 6));
    let report = engine
        .period_report(period, date(2026, 8, 6), Currency::Cny)
        .await
        .unwrap();

    assert_eq!(report.expense_minor, 45_000);
    assert_eq!(report.by_category[0].category, "Food");
    assert_eq!(report.assets.total_minor, 1_000_000);
}
