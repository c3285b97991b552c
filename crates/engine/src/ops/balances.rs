use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, EntityTrait, QueryOrder, TransactionTrait};

use crate::{
    AssetBalance, EngineError, NewBalance, ResultEngine, asset_balances, util::model_currency,
};

use super::{Engine, with_tx};

/// Result of a balance upsert.
#[derive(Clone, Debug)]
pub enum BalanceUpdate {
    Created(AssetBalance),
    Updated(AssetBalance),
    /// The stated balance equals the stored one; nothing was written.
    Unchanged(AssetBalance),
}

pub(super) fn from_model(model: asset_balances::Model) -> ResultEngine<AssetBalance> {
    Ok(AssetBalance {
        account_name: model.account_name,
        balance_minor: model.balance_minor,
        currency: model_currency(&model.currency)?,
        updated_at: model.updated_at,
    })
}

impl Engine {
    /// Replaces the balance for one account; creates the account on first
    /// sight. Exactly one row exists per account name.
    pub async fn upsert_balance(
        &self,
        new: NewBalance,
        updated_at: DateTime<Utc>,
    ) -> ResultEngine<BalanceUpdate> {
        with_tx!(self, |tx| {
            let existing = match asset_balances::Entity::find_by_id(new.account_name.clone())
                .one(&tx)
                .await
            {
                Ok(existing) => existing,
                Err(err) => return Err(EngineError::Database(err)),
            };

            match existing {
                Some(model) => {
                    let stored = from_model(model)?;
                    if stored.balance_minor == new.balance_minor && stored.currency == new.currency
                    {
                        return Ok(BalanceUpdate::Unchanged(stored));
                    }
                    let updated = AssetBalance {
                        account_name: stored.account_name.clone(),
                        balance_minor: new.balance_minor,
                        currency: new.currency,
                        updated_at,
                    };
                    let active = asset_balances::ActiveModel {
                        account_name: ActiveValue::Unchanged(updated.account_name.clone()),
                        balance_minor: ActiveValue::Set(updated.balance_minor),
                        currency: ActiveValue::Set(updated.currency.code().to_string()),
                        updated_at: ActiveValue::Set(updated.updated_at),
                    };
                    match asset_balances::Entity::update(active).exec(&tx).await {
                        Ok(_) => Ok(BalanceUpdate::Updated(updated)),
                        Err(err) => Err(EngineError::Database(err)),
                    }
                }
                None => {
                    let created = AssetBalance {
                        account_name: new.account_name.clone(),
                        balance_minor: new.balance_minor,
                        currency: new.currency,
                        updated_at,
                    };
                    let active = asset_balances::ActiveModel {
                        account_name: ActiveValue::Set(created.account_name.clone()),
                        balance_minor: ActiveValue::Set(created.balance_minor),
                        currency: ActiveValue::Set(created.currency.code().to_string()),
                        updated_at: ActiveValue::Set(created.updated_at),
                    };
                    match asset_balances::Entity::insert(active).exec(&tx).await {
                        Ok(_) => Ok(BalanceUpdate::Created(created)),
                        Err(err) => Err(EngineError::Database(err)),
                    }
                }
            }
        })
    }

    /// Lists all account balances, alphabetically.
    pub async fn list_balances(&self) -> ResultEngine<Vec<AssetBalance>> {
        let models = asset_balances::Entity::find()
            .order_by_asc(asset_balances::Column::AccountName)
            .all(&self.database)
            .await?;
        models.into_iter().map(from_model).collect()
    }
}
