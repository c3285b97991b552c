use chrono::{DateTime, Duration, NaiveDate, Utc};
use sea_orm::{
    ActiveValue, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    EngineError, NewTransaction, RecordKind, ResultEngine, TransactionRecord, ledger_records,
    util::{model_currency, model_kind, parse_uuid},
};

use super::{Engine, with_tx};

/// Transactions identical in amount, kind and category within this window are
/// treated as accidental re-submissions.
const DUPLICATE_WINDOW_HOURS: i64 = 24;

/// Filters for listing records.
///
/// `from` and `to` are inclusive calendar dates on `occurred_on`.
#[derive(Clone, Debug, Default)]
pub struct RecordListFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub kind: Option<RecordKind>,
    pub category: Option<String>,
}

/// Result of a guarded create.
#[derive(Clone, Debug)]
pub enum CreateOutcome {
    Created(TransactionRecord),
    /// A matching record already exists inside the duplicate window; nothing
    /// was inserted and the existing record is returned for the echo.
    Duplicate(TransactionRecord),
}

fn to_model(record: &TransactionRecord) -> ledger_records::ActiveModel {
    ledger_records::ActiveModel {
        id: ActiveValue::Set(record.id.to_string()),
        kind: ActiveValue::Set(record.kind.as_str().to_string()),
        amount_minor: ActiveValue::Set(record.amount_minor),
        currency: ActiveValue::Set(record.currency.code().to_string()),
        category: ActiveValue::Set(record.category.clone()),
        description: ActiveValue::Set(record.description.clone()),
        occurred_on: ActiveValue::Set(record.occurred_on),
        created_at: ActiveValue::Set(record.created_at),
    }
}

pub(super) fn from_model(model: ledger_records::Model) -> ResultEngine<TransactionRecord> {
    Ok(TransactionRecord {
        id: parse_uuid(&model.id, "record")?,
        kind: model_kind(&model.kind)?,
        amount_minor: model.amount_minor,
        currency: model_currency(&model.currency)?,
        category: model.category,
        description: model.description,
        occurred_on: model.occurred_on,
        created_at: model.created_at,
    })
}

impl Engine {
    /// Inserts a new transaction record.
    pub async fn create_record(
        &self,
        new: NewTransaction,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<TransactionRecord> {
        let record = TransactionRecord::new(
            new.kind,
            new.amount_minor,
            new.currency,
            new.category,
            new.description,
            new.occurred_on,
            created_at,
        )?;

        with_tx!(self, |tx| {
            match ledger_records::Entity::insert(to_model(&record))
                .exec(&tx)
                .await
            {
                Ok(_) => Ok(record),
                Err(err) => Err(EngineError::Database(err)),
            }
        })
    }

    /// Inserts a new transaction record unless an identical one (amount, kind
    /// and category) was created within the previous 24 hours.
    pub async fn create_record_checked(
        &self,
        new: NewTransaction,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<CreateOutcome> {
        let window_start = created_at - Duration::hours(DUPLICATE_WINDOW_HOURS);
        let existing = ledger_records::Entity::find()
            .filter(ledger_records::Column::AmountMinor.eq(new.amount_minor))
            .filter(ledger_records::Column::Kind.eq(new.kind.as_str()))
            .filter(ledger_records::Column::Category.eq(new.category.clone()))
            .filter(ledger_records::Column::CreatedAt.gte(window_start))
            .order_by_desc(ledger_records::Column::CreatedAt)
            .one(&self.database)
            .await?;

        if let Some(model) = existing {
            return Ok(CreateOutcome::Duplicate(from_model(model)?));
        }

        let record = self.create_record(new, created_at).await?;
        Ok(CreateOutcome::Created(record))
    }

    /// Fetches a record by id.
    pub async fn record(&self, id: Uuid) -> ResultEngine<TransactionRecord> {
        let model = ledger_records::Entity::find_by_id(id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound(id.to_string()))?;
        from_model(model)
    }

    /// Lists records matching `filter`, newest `created_at` first.
    pub async fn list_records(
        &self,
        filter: &RecordListFilter,
    ) -> ResultEngine<Vec<TransactionRecord>> {
        let mut query = ledger_records::Entity::find();
        if let Some(from) = filter.from {
            query = query.filter(ledger_records::Column::OccurredOn.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(ledger_records::Column::OccurredOn.lte(to));
        }
        if let Some(kind) = filter.kind {
            query = query.filter(ledger_records::Column::Kind.eq(kind.as_str()));
        }
        if let Some(category) = &filter.category {
            query = query.filter(ledger_records::Column::Category.eq(category.clone()));
        }

        let models = query
            .order_by_desc(ledger_records::Column::CreatedAt)
            .order_by_desc(ledger_records::Column::Id)
            .all(&self.database)
            .await?;
        models.into_iter().map(from_model).collect()
    }

    /// The record with the maximum `created_at`, if any.
    pub async fn last_record(&self) -> ResultEngine<Option<TransactionRecord>> {
        let model = ledger_records::Entity::find()
            .order_by_desc(ledger_records::Column::CreatedAt)
            .order_by_desc(ledger_records::Column::Id)
            .one(&self.database)
            .await?;
        model.map(from_model).transpose()
    }

    /// Deletes one record, returning it for the user-facing echo.
    pub async fn delete_record(&self, id: Uuid) -> ResultEngine<TransactionRecord> {
        with_tx!(self, |tx| {
            let model = match ledger_records::Entity::find_by_id(id.to_string())
                .one(&tx)
                .await
            {
                Ok(Some(model)) => model,
                Ok(None) => return Err(EngineError::KeyNotFound(id.to_string())),
                Err(err) => return Err(EngineError::Database(err)),
            };
            let record = from_model(model)?;
            match ledger_records::Entity::delete_by_id(id.to_string())
                .exec(&tx)
                .await
            {
                Ok(_) => Ok(record),
                Err(err) => Err(EngineError::Database(err)),
            }
        })
    }

    /// Deletes a resolved bulk set in one transaction.
    pub async fn delete_records(&self, ids: &[Uuid]) -> ResultEngine<u64> {
        with_tx!(self, |tx| {
            let keys: Vec<String> = ids.iter().map(Uuid::to_string).collect();
            match ledger_records::Entity::delete_many()
                .filter(ledger_records::Column::Id.is_in(keys))
                .exec(&tx)
                .await
            {
                Ok(result) => Ok(result.rows_affected),
                Err(err) => Err(EngineError::Database(err)),
            }
        })
    }
}
