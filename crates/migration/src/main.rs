use sea_orm::Database;
use sea_orm_migration::prelude::*;

/// Applies the moneybook schema to `DATABASE_URL`; `fresh` drops it first.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let db_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:./moneybook.db?mode=rwc".to_string());
    let db = Database::connect(&db_url).await?;

    match std::env::args().nth(1).as_deref() {
        None | Some("up") => migration::Migrator::up(&db, None).await?,
        Some("fresh") => migration::Migrator::fresh(&db).await?,
        Some(other) => return Err(format!("unknown command '{other}', expected up or fresh").into()),
    }
    Ok(())
}
