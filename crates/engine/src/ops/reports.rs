use chrono::NaiveDate;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, TransactionTrait};

use crate::{
    Currency, EngineError, ResultEngine, asset_balances, ledger_records,
    report::{self, Period, Report},
};

use super::{Engine, with_tx};

impl Engine {
    /// Computes the period report from one consistent snapshot.
    ///
    /// Both tables are read inside a single DB transaction so a concurrent
    /// write cannot make the sums and the asset section disagree.
    pub async fn period_report(
        &self,
        period: Period,
        reference_date: NaiveDate,
        currency: Currency,
    ) -> ResultEngine<Report> {
        with_tx!(self, |tx| {
            let record_models = match ledger_records::Entity::find()
                .filter(ledger_records::Column::OccurredOn.gte(period.start))
                .filter(ledger_records::Column::OccurredOn.lte(period.end))
                .order_by_desc(ledger_records::Column::CreatedAt)
                .all(&tx)
                .await
            {
                Ok(models) => models,
                Err(err) => return Err(EngineError::Database(err)),
            };
            let balance_models = match asset_balances::Entity::find()
                .order_by_asc(asset_balances::Column::AccountName)
                .all(&tx)
                .await
            {
                Ok(models) => models,
                Err(err) => return Err(EngineError::Database(err)),
            };

            let records = record_models
                .into_iter()
                .map(super::records::from_model)
                .collect::<ResultEngine<Vec<_>>>()?;
            let balances = balance_models
                .into_iter()
                .map(super::balances::from_model)
                .collect::<ResultEngine<Vec<_>>>()?;

            Ok(report::summarize(
                &records,
                &balances,
                period,
                reference_date,
                currency,
            ))
        })
    }
}
