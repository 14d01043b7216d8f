//! Settings for the application.
//!
//! Values come from an optional `settings.toml`, then `MONEYBOOK_*`
//! environment variables (`MONEYBOOK_APP__LEVEL=debug`), then CLI flags.
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::Result;

const DEFAULT_CONFIG_PATH: &str = "settings";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    #[default]
    Memory,
    Sqlite(String),
}

impl Database {
    pub fn url(&self) -> String {
        match self {
            Database::Memory => String::from("sqlite::memory:"),
            Database::Sqlite(path) => format!("sqlite:{path}?mode=rwc"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Undo {
    pub capacity: usize,
}

impl Default for Undo {
    fn default() -> Self {
        Self {
            capacity: engine::UndoHistory::DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: App,
    pub database: Database,
    pub undo: Undo,
}

#[derive(Debug, Parser)]
#[command(name = "moneybook", about = "Personal ledger with undo/redo", version)]
struct Args {
    /// Optional config file path (TOML), without extension.
    #[arg(long)]
    config: Option<String>,
    /// SQLite file to open, or `memory` for a throwaway document.
    #[arg(long)]
    database: Option<String>,
    /// Override the log level (e.g. `debug`).
    #[arg(long)]
    level: Option<String>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let args = Args::parse();

        let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
        let mut settings: Settings = Config::builder()
            .add_source(File::with_name(config_path).required(false))
            .add_source(Environment::with_prefix("MONEYBOOK").separator("__"))
            .build()?
            .try_deserialize()?;

        if let Some(database) = args.database {
            settings.database = match database.as_str() {
                "memory" => Database::Memory,
                path => Database::Sqlite(path.to_string()),
            };
        }
        if let Some(level) = args.level {
            settings.app.level = level;
        }

        Ok(settings)
    }
}
