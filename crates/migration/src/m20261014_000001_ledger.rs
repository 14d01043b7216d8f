use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Accounts::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Accounts::Name).string().not_null())
                    .col(ColumnDef::new(Accounts::Kind).string().not_null())
                    .col(
                        ColumnDef::new(Accounts::Closed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Accounts::CurrencyAssetId).string())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Categories::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Categories::Name).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Transactions::OccurredAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Payee).string())
                    .col(ColumnDef::new(Transactions::Memo).string())
                    .col(ColumnDef::new(Transactions::CheckNumber).big_integer())
                    .col(ColumnDef::new(Transactions::DebitAccountId).string())
                    .col(ColumnDef::new(Transactions::DebitAmountMinor).big_integer())
                    .col(ColumnDef::new(Transactions::DebitAssetId).string())
                    .col(
                        ColumnDef::new(Transactions::DebitCleared)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::CreditAccountId).string())
                    .col(ColumnDef::new(Transactions::CreditAmountMinor).big_integer())
                    .col(ColumnDef::new(Transactions::CreditAssetId).string())
                    .col(
                        ColumnDef::new(Transactions::CreditCleared)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::CategoryKind)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::CategoryId).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-debit_account_id")
                            .from(Transactions::Table, Transactions::DebitAccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-credit_account_id")
                            .from(Transactions::Table, Transactions::CreditAccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-category_id")
                            .from(Transactions::Table, Transactions::CategoryId)
                            .to(Categories::Table, Categories::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-debit_account_id")
                    .table(Transactions::Table)
                    .col(Transactions::DebitAccountId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-credit_account_id")
                    .table(Transactions::Table)
                    .col(Transactions::CreditAccountId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Splits::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Splits::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Splits::TransactionId).string().not_null())
                    .col(ColumnDef::new(Splits::AmountMinor).big_integer().not_null())
                    .col(ColumnDef::new(Splits::TargetKind).string().not_null())
                    .col(ColumnDef::new(Splits::TargetId).string())
                    .col(ColumnDef::new(Splits::Memo).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-splits-transaction_id")
                            .from(Splits::Table, Splits::TransactionId)
                            .to(Transactions::Table, Transactions::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-splits-transaction_id")
                    .table(Splits::Table)
                    .col(Splits::TransactionId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Splits::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Accounts {
    Table,
    Id,
    Name,
    Kind,
    Closed,
    CurrencyAssetId,
}

#[derive(Iden)]
pub enum Categories {
    Table,
    Id,
    Name,
}

#[derive(Iden)]
pub enum Transactions {
    Table,
    Id,
    OccurredAt,
    Payee,
    Memo,
    CheckNumber,
    DebitAccountId,
    DebitAmountMinor,
    DebitAssetId,
    DebitCleared,
    CreditAccountId,
    CreditAmountMinor,
    CreditAssetId,
    CreditCleared,
    CategoryKind,
    CategoryId,
}

#[derive(Iden)]
pub enum Splits {
    Table,
    Id,
    TransactionId,
    AmountMinor,
    TargetKind,
    TargetId,
    Memo,
}
