use engine::{DbStore, Document};
use migration::{Migrator, MigratorTrait};

mod error;
mod import;
mod settings;
mod shell;

#[tokio::main]
async fn main() -> error::Result<()> {
    let settings = settings::Settings::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "moneybook={level},engine={level},migration={level}",
            level = settings.app.level
        ))
        .with_writer(std::io::stderr)
        .init();

    let db = sea_orm::Database::connect(settings.database.url()).await?;
    Migrator::up(&db, None).await?;
    tracing::info!(database = ?settings.database, "database ready");

    let document = Document::builder()
        .store(DbStore::new(db))
        .undo_capacity(settings.undo.capacity)
        .build()
        .await?;

    let mut shell = shell::Shell::new(document);
    if let Err(err) = shell.run().await {
        tracing::error!("shell stopped: {err}");
        return Err(err);
    }
    tracing::info!(net_worth = %shell.document().net_worth(), "shell closed");
    Ok(())
}
