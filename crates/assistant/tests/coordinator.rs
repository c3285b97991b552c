use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use sea_orm::Database;

use assistant::{
    AssistantError, CompletionError, CompletionRequest, CompletionService, Coordinator,
    CoordinatorConfig, Extractor, Inbound, Outcome,
};
use engine::{Currency, Engine, NewTransaction, RecordKind};
use migration::MigratorTrait;

/// Scripted completion service: pops one canned answer per call.
#[derive(Clone, Default)]
struct ScriptedService {
    responses: Arc<Mutex<VecDeque<Result<String, ()>>>>,
    calls: Arc<Mutex<usize>>,
}

impl ScriptedService {
    fn push_ok(&self, body: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(body.to_string()));
    }

    fn push_failure(&self) {
        self.responses.lock().unwrap().push_back(Err(()));
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl CompletionService for ScriptedService {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, CompletionError> {
        *self.calls.lock().unwrap() += 1;
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(body)) => Ok(body),
            Some(Err(())) | None => Err(CompletionError::Empty),
        }
    }
}

async fn coordinator_with_db(
    service: ScriptedService,
    allowed_user_id: Option<u64>,
) -> (Coordinator<ScriptedService>, Arc<Engine>) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Arc::new(Engine::builder().database(db).build().await.unwrap());

    let extractor = Extractor::new(service).with_retry(3, Duration::from_millis(1));
    let config = CoordinatorConfig {
        allowed_user_id,
        default_currency: Currency::Cny,
        ..Default::default()
    };
    (
        Coordinator::new(engine.clone(), extractor, config),
        engine,
    )
}

fn text(user_id: u64, message: &str) -> Inbound {
    Inbound {
        user_id,
        text: Some(message.to_string()),
        image: None,
    }
}

fn new_expense(amount_minor: i64, category: &str, description: &str) -> NewTransaction {
    NewTransaction {
        kind: RecordKind::Expense,
        amount_minor,
        currency: Currency::Cny,
        category: category.to_string(),
        description: description.to_string(),
        occurred_on: Utc::now().date_naive(),
    }
}

#[tokio::test]
async fn unambiguous_record_commits_immediately() {
    let service = ScriptedService::default();
    service.push_ok(
        r#"{"intent": "record", "records": [
            {"record": "transaction", "kind": "expense", "amount": 20.5, "category": "Food", "description": "lunch"}
        ]}"#,
    );
    let (coordinator, engine) = coordinator_with_db(service, None).await;

    let outcome = coordinator.handle(text(7, "lunch 20.5")).await.unwrap();
    let Outcome::Committed { records, rejected, .. } = outcome else {
        panic!("expected a commit");
    };
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].amount_minor, 2050);
    assert_eq!(records[0].kind, RecordKind::Expense);
    assert!(rejected.is_empty());

    let stored = engine.last_record().await.unwrap().unwrap();
    assert_eq!(stored.id, records[0].id);
}

#[tokio::test]
async fn invalid_sibling_does_not_block_the_valid_one() {
    let service = ScriptedService::default();
    service.push_ok(
        r#"{"intent": "record", "records": [
            {"record": "transaction", "kind": "expense", "amount": 20, "category": "Food"},
            {"record": "transaction", "kind": "expense", "amount": -15, "category": "Transport"}
        ]}"#,
    );
    let (coordinator, engine) = coordinator_with_db(service, None).await;

    let outcome = coordinator
        .handle(text(7, "lunch 20 and taxi -15"))
        .await
        .unwrap();
    let Outcome::Committed { records, rejected, .. } = outcome else {
        panic!("expected a commit");
    };
    assert_eq!(records.len(), 1);
    assert_eq!(rejected.len(), 1);
    assert_eq!(engine.list_records(&Default::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn mixed_envelope_updates_assets_too() {
    let service = ScriptedService::default();
    service.push_ok(
        r#"{"intent": "mixed", "records": [
            {"record": "transaction", "kind": "income", "amount": 3000, "category": "Salary"},
            {"record": "asset", "account": "Alipay", "balance": 8200}
        ]}"#,
    );
    let (coordinator, engine) = coordinator_with_db(service, None).await;

    let outcome = coordinator
        .handle(text(7, "salary 3000, alipay now 8200"))
        .await
        .unwrap();
    let Outcome::Committed { records, balances, .. } = outcome else {
        panic!("expected a commit");
    };
    assert_eq!(records.len(), 1);
    assert_eq!(balances.len(), 1);

    let stored = engine.list_balances().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].account_name, "Alipay");
    assert_eq!(stored[0].balance_minor, 820_000);
}

#[tokio::test]
async fn ambiguous_delete_asks_then_selection_resolves() {
    let service = ScriptedService::default();
    service.push_ok(r#"{"intent": "delete", "delete": {"descriptor": "the taxi expense"}}"#);
    let (coordinator, engine) = coordinator_with_db(service, None).await;

    let base = Utc::now() - ChronoDuration::hours(2);
    engine
        .create_record(new_expense(3500, "Transport", "taxi to airport"), base)
        .await
        .unwrap();
    let second = engine
        .create_record(
            new_expense(1500, "Transport", "taxi home"),
            base + ChronoDuration::hours(1),
        )
        .await
        .unwrap();

    let outcome = coordinator
        .handle(text(7, "delete the taxi expense"))
        .await
        .unwrap();
    let Outcome::Clarification { options } = outcome else {
        panic!("expected a clarification set");
    };
    assert_eq!(options.len(), 2);

    // Options are newest-first; "1" is the taxi home ride.
    let outcome = coordinator.handle(text(7, "1")).await.unwrap();
    let Outcome::Deleted { records } = outcome else {
        panic!("expected a deletion");
    };
    assert_eq!(records[0].id, second.id);
    assert_eq!(engine.list_records(&Default::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn no_match_alters_nothing() {
    let service = ScriptedService::default();
    service.push_ok(r#"{"intent": "delete", "delete": {"descriptor": "the gym membership"}}"#);
    let (coordinator, engine) = coordinator_with_db(service, None).await;

    engine
        .create_record(new_expense(2000, "Food", "lunch"), Utc::now())
        .await
        .unwrap();

    let outcome = coordinator
        .handle(text(7, "delete the gym membership"))
        .await
        .unwrap();
    assert!(matches!(outcome, Outcome::NoMatch));
    assert_eq!(engine.list_records(&Default::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn last_reference_targets_newest_created_at() {
    let service = ScriptedService::default();
    service.push_ok(r#"{"intent": "delete", "delete": {"descriptor": "the last one"}}"#);
    let (coordinator, engine) = coordinator_with_db(service, None).await;

    let base = Utc::now() - ChronoDuration::hours(5);
    let mut newest = None;
    for i in 0..10 {
        let record = engine
            .create_record(
                new_expense(1000 + i, "Transport", &format!("ride {i}")),
                base + ChronoDuration::minutes(i),
            )
            .await
            .unwrap();
        newest = Some(record.id);
    }

    let outcome = coordinator
        .handle(text(7, "delete the last one"))
        .await
        .unwrap();
    let Outcome::Deleted { records } = outcome else {
        panic!("expected a deletion");
    };
    assert_eq!(Some(records[0].id), newest);
}

#[tokio::test]
async fn bulk_delete_requires_confirmation() {
    let service = ScriptedService::default();
    service.push_ok(
        r#"{"intent": "delete", "delete": {"descriptor": "taxi", "bulk": true}}"#,
    );
    let (coordinator, engine) = coordinator_with_db(service, None).await;

    let base = Utc::now() - ChronoDuration::hours(3);
    engine
        .create_record(new_expense(3500, "Transport", "taxi to airport"), base)
        .await
        .unwrap();
    engine
        .create_record(
            new_expense(1500, "Transport", "taxi home"),
            base + ChronoDuration::hours(1),
        )
        .await
        .unwrap();
    engine
        .create_record(
            new_expense(2000, "Food", "lunch"),
            base + ChronoDuration::hours(2),
        )
        .await
        .unwrap();

    let outcome = coordinator
        .handle(text(7, "delete all taxi expenses"))
        .await
        .unwrap();
    let Outcome::BulkConfirmation { matches } = outcome else {
        panic!("expected a bulk confirmation");
    };
    assert_eq!(matches.len(), 2);
    // Nothing deleted before the confirmation.
    assert_eq!(engine.list_records(&Default::default()).await.unwrap().len(), 3);

    let outcome = coordinator.handle(text(7, "yes")).await.unwrap();
    assert!(matches!(outcome, Outcome::Deleted { .. }));
    let remaining = engine.list_records(&Default::default()).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].category, "Food");
}

#[tokio::test]
async fn new_extraction_supersedes_pending_clarification() {
    let service = ScriptedService::default();
    service.push_ok(r#"{"intent": "delete", "delete": {"descriptor": "taxi"}}"#);
    service.push_ok(
        r#"{"intent": "record", "records": [
            {"record": "transaction", "kind": "expense", "amount": 15, "category": "Food", "description": "coffee"}
        ]}"#,
    );
    let (coordinator, engine) = coordinator_with_db(service, None).await;

    let base = Utc::now() - ChronoDuration::hours(2);
    for (i, desc) in ["taxi to airport", "taxi home"].iter().enumerate() {
        engine
            .create_record(
                new_expense(1500, "Transport", desc),
                base + ChronoDuration::minutes(i as i64),
            )
            .await
            .unwrap();
    }

    let outcome = coordinator.handle(text(7, "delete the taxi")).await.unwrap();
    assert!(matches!(outcome, Outcome::Clarification { .. }));

    // A new unrelated message discards the pending clarification and is
    // processed as a fresh extraction.
    let outcome = coordinator.handle(text(7, "coffee 15")).await.unwrap();
    assert!(matches!(outcome, Outcome::Committed { .. }));
    assert_eq!(engine.list_records(&Default::default()).await.unwrap().len(), 3);
}

#[tokio::test]
async fn unauthorized_user_never_reaches_the_service() {
    let service = ScriptedService::default();
    let probe = service.clone();
    let (coordinator, engine) = coordinator_with_db(service, Some(42)).await;

    let outcome = coordinator.handle(text(7, "lunch 20")).await.unwrap();
    assert!(matches!(outcome, Outcome::Unauthorized));
    assert_eq!(probe.calls(), 0);
    assert!(engine.list_records(&Default::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn service_failure_surfaces_after_retries_without_records() {
    let service = ScriptedService::default();
    service.push_failure();
    service.push_failure();
    service.push_failure();
    let probe = service.clone();
    let (coordinator, engine) = coordinator_with_db(service, None).await;

    let err = coordinator.handle(text(7, "lunch 20")).await.unwrap_err();
    assert!(matches!(err, AssistantError::ExtractionFailed(_)));
    assert_eq!(probe.calls(), 3);
    assert!(engine.list_records(&Default::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_resubmission_is_skipped_and_echoed() {
    let envelope = r#"{"intent": "record", "records": [
        {"record": "transaction", "kind": "expense", "amount": 20, "category": "Food", "description": "lunch"}
    ]}"#;
    let service = ScriptedService::default();
    service.push_ok(envelope);
    service.push_ok(envelope);
    let (coordinator, engine) = coordinator_with_db(service, None).await;

    let first = coordinator.handle(text(7, "lunch 20")).await.unwrap();
    assert!(matches!(first, Outcome::Committed { ref records, .. } if records.len() == 1));

    let second = coordinator.handle(text(7, "lunch 20")).await.unwrap();
    let Outcome::Committed { records, duplicates, .. } = second else {
        panic!("expected a commit outcome");
    };
    assert!(records.is_empty());
    assert_eq!(duplicates.len(), 1);
    assert_eq!(engine.list_records(&Default::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn category_query_sums_the_month() {
    let service = ScriptedService::default();
    service.push_ok(r#"{"intent": "query", "query": {"category": "Food"}}"#);
    let (coordinator, engine) = coordinator_with_db(service, None).await;

    engine
        .create_record(new_expense(2000, "Food", "lunch"), Utc::now())
        .await
        .unwrap();
    engine
        .create_record(new_expense(3000, "Food", "dinner"), Utc::now())
        .await
        .unwrap();
    engine
        .create_record(new_expense(9900, "Transport", "taxi"), Utc::now())
        .await
        .unwrap();

    let outcome = coordinator
        .handle(text(7, "how much did I spend on food?"))
        .await
        .unwrap();
    let Outcome::CategorySpending { expense_minor, currency, .. } = outcome else {
        panic!("expected category spending");
    };
    assert_eq!(expense_minor, 5000);
    assert_eq!(currency, Currency::Cny);
}
