use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, DbErr, EntityTrait, QueryFilter, Select, SqlErr, TransactionTrait,
};

use crate::{
    Account, Category, EngineError, Entity, EntityFilter, EntityKey, EntityKind, EntityWrite,
    ResultEngine, SplitEntry, Transaction, accounts, categories, splits, transactions,
};

use super::EntityStore;

/// Run a block inside a DB transaction, committing on success. Returning
/// early drops the transaction, which rolls it back.
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

/// Store backed by a sea-orm connection. Each batch runs in one DB
/// transaction.
#[derive(Clone, Debug)]
pub struct DbStore {
    database: DatabaseConnection,
}

impl DbStore {
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }

    pub fn database(&self) -> &DatabaseConnection {
        &self.database
    }
}

async fn load<E, T, C>(db: &C, select: Select<E>) -> ResultEngine<Vec<Entity>>
where
    C: ConnectionTrait,
    E: EntityTrait,
    T: TryFrom<E::Model, Error = EngineError> + Into<Entity>,
{
    select
        .all(db)
        .await?
        .into_iter()
        .map(|model| T::try_from(model).map(Into::into))
        .collect()
}

async fn load_kind<C: ConnectionTrait>(db: &C, kind: EntityKind) -> ResultEngine<Vec<Entity>> {
    match kind {
        EntityKind::Account => load::<_, Account, _>(db, accounts::Entity::find()).await,
        EntityKind::Category => load::<_, Category, _>(db, categories::Entity::find()).await,
        EntityKind::Transaction => {
            load::<_, Transaction, _>(db, transactions::Entity::find()).await
        }
        EntityKind::Split => load::<_, SplitEntry, _>(db, splits::Entity::find()).await,
    }
}

async fn load_key<C: ConnectionTrait>(db: &C, key: EntityKey) -> ResultEngine<Vec<Entity>> {
    let id = key.id.to_string();
    match key.kind {
        EntityKind::Account => load::<_, Account, _>(db, accounts::Entity::find_by_id(id)).await,
        EntityKind::Category => {
            load::<_, Category, _>(db, categories::Entity::find_by_id(id)).await
        }
        EntityKind::Transaction => {
            load::<_, Transaction, _>(db, transactions::Entity::find_by_id(id)).await
        }
        EntityKind::Split => load::<_, SplitEntry, _>(db, splits::Entity::find_by_id(id)).await,
    }
}

fn insert_error(err: DbErr, key: EntityKey) -> EngineError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => EngineError::ExistingKey(key.to_string()),
        _ => err.into(),
    }
}

fn update_error(err: DbErr, key: EntityKey) -> EngineError {
    match err {
        DbErr::RecordNotUpdated => EngineError::KeyNotFound(key.to_string()),
        other => other.into(),
    }
}

async fn insert(db_tx: &DatabaseTransaction, entity: &Entity) -> ResultEngine<()> {
    let key = entity.key();
    let result = match entity {
        Entity::Account(account) => accounts::ActiveModel::from(account)
            .insert(db_tx)
            .await
            .map(drop),
        Entity::Category(category) => categories::ActiveModel::from(category)
            .insert(db_tx)
            .await
            .map(drop),
        Entity::Transaction(tx) => transactions::ActiveModel::from(tx)
            .insert(db_tx)
            .await
            .map(drop),
        Entity::Split(split) => splits::ActiveModel::from(split)
            .insert(db_tx)
            .await
            .map(drop),
    };
    result.map_err(|err| insert_error(err, key))
}

async fn update(db_tx: &DatabaseTransaction, entity: &Entity) -> ResultEngine<()> {
    let key = entity.key();
    let result = match entity {
        Entity::Account(account) => accounts::ActiveModel::from(account)
            .update(db_tx)
            .await
            .map(drop),
        Entity::Category(category) => categories::ActiveModel::from(category)
            .update(db_tx)
            .await
            .map(drop),
        Entity::Transaction(tx) => transactions::ActiveModel::from(tx)
            .update(db_tx)
            .await
            .map(drop),
        Entity::Split(split) => splits::ActiveModel::from(split)
            .update(db_tx)
            .await
            .map(drop),
    };
    result.map_err(|err| update_error(err, key))
}

async fn delete(db_tx: &DatabaseTransaction, key: EntityKey) -> ResultEngine<()> {
    let id = key.id.to_string();
    let deleted = match key.kind {
        EntityKind::Account => accounts::Entity::delete_by_id(id).exec(db_tx).await?,
        EntityKind::Category => categories::Entity::delete_by_id(id).exec(db_tx).await?,
        EntityKind::Transaction => transactions::Entity::delete_by_id(id).exec(db_tx).await?,
        EntityKind::Split => splits::Entity::delete_by_id(id).exec(db_tx).await?,
    };
    if deleted.rows_affected == 0 {
        return Err(EngineError::KeyNotFound(key.to_string()));
    }
    Ok(())
}

#[async_trait]
impl EntityStore for DbStore {
    async fn query(&self, filter: EntityFilter) -> ResultEngine<Vec<Entity>> {
        let db = &self.database;
        match filter {
            EntityFilter::All => {
                let mut entities = Vec::new();
                for kind in [
                    EntityKind::Account,
                    EntityKind::Category,
                    EntityKind::Transaction,
                    EntityKind::Split,
                ] {
                    entities.extend(load_kind(db, kind).await?);
                }
                Ok(entities)
            }
            EntityFilter::Kind(kind) => load_kind(db, kind).await,
            EntityFilter::Key(key) => load_key(db, key).await,
            EntityFilter::AccountTransactions(account_id) => {
                let account_id = account_id.to_string();
                let select = transactions::Entity::find().filter(
                    Condition::any()
                        .add(transactions::Column::DebitAccountId.eq(account_id.clone()))
                        .add(transactions::Column::CreditAccountId.eq(account_id)),
                );
                load::<_, Transaction, _>(db, select).await
            }
            EntityFilter::SplitsOf(transaction_id) => {
                let select = splits::Entity::find()
                    .filter(splits::Column::TransactionId.eq(transaction_id.to_string()));
                load::<_, SplitEntry, _>(db, select).await
            }
        }
    }

    async fn apply(&mut self, writes: &[EntityWrite]) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let mut result = Ok(());
            for write in writes {
                result = match write {
                    EntityWrite::Insert(entity) => insert(&db_tx, entity).await,
                    EntityWrite::Update(entity) => update(&db_tx, entity).await,
                    EntityWrite::Delete(key) => delete(&db_tx, *key).await,
                };
                if result.is_err() {
                    break;
                }
            }
            result
        })
    }
}
