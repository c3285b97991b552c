use sea_orm::DatabaseConnection;

mod balances;
mod records;
mod reports;

pub use balances::BalanceUpdate;
pub use records::{CreateOutcome, RecordListFilter};

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// The ledger engine: owns validation and identity-resolution logic on top of
/// the store. All mutations go through here, never through the tables
/// directly.
#[derive(Debug)]
pub struct Engine {
    pub(crate) database: DatabaseConnection,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }
}

#[derive(Debug, Default)]
pub struct EngineBuilder {
    database: Option<DatabaseConnection>,
}

impl EngineBuilder {
    pub fn database(mut self, database: DatabaseConnection) -> EngineBuilder {
        self.database = Some(database);
        self
    }

    pub async fn build(self) -> crate::ResultEngine<Engine> {
        let database = self.database.ok_or_else(|| {
            crate::EngineError::KeyNotFound("engine built without a database".to_string())
        })?;
        Ok(Engine { database })
    }
}
