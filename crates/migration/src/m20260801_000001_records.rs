use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Records {
    Table,
    Id,
    Kind,
    AmountMinor,
    Currency,
    Category,
    Description,
    OccurredOn,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Records::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Records::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Records::Kind).string().not_null())
                    .col(
                        ColumnDef::new(Records::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Records::Currency).string().not_null())
                    .col(ColumnDef::new(Records::Category).string().not_null())
                    .col(ColumnDef::new(Records::Description).string().not_null())
                    .col(ColumnDef::new(Records::OccurredOn).date().not_null())
                    .col(ColumnDef::new(Records::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-records-occurred_on")
                    .table(Records::Table)
                    .col(Records::OccurredOn)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-records-created_at")
                    .table(Records::Table)
                    .col(Records::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Records::Table).to_owned())
            .await
    }
}
