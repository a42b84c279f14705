use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use docsql::storage::{DocumentStore, MemoryStore};
use docsql::manager::keys::resolve_key;
use docsql::sql::StatementKind;
use docsql::{Config, Manager};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "docsql")]
#[command(about = "Run SQL statements against an in-memory document store", long_about = None)]
struct Args {
    /// Statements to run, in order
    statements: Vec<String>,

    /// Script file with `;`-terminated statements, run after the arguments
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Target database (overrides the config file)
    #[arg(short, long)]
    database: Option<String>,

    /// Logical key column for every table
    #[arg(long)]
    key_column: Option<String>,

    /// JSON object of table name to documents loaded before running
    #[arg(long)]
    seed: Option<PathBuf>,

    /// JSON array of parameters bound to every statement
    #[arg(short, long)]
    params: Option<String>,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docsql=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::new("127.0.0.1", "docsql"),
    };
    config.apply_env_overrides();
    if let Some(database) = args.database {
        config.database = database;
    }
    if let Some(column) = args.key_column {
        config.key_column = column;
    }

    let store = MemoryStore::listening_on(&config.address());
    if let Some(path) = &args.seed {
        let count = seed(&store, &config, path)?;
        tracing::info!("Seeded {} documents from {}", count, path.display());
    }

    let parameters: Vec<Value> = match &args.params {
        Some(text) => serde_json::from_str(text).context("--params must be a JSON array")?,
        None => Vec::new(),
    };

    let mut statements = args.statements;
    if let Some(path) = &args.file {
        let script = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        statements.extend(split_statements(&script));
    }

    let manager = Manager::new(config, Arc::new(store))?;
    for sql in &statements {
        run(&manager, sql, &parameters).with_context(|| format!("Statement failed: {}", sql))?;
    }

    Ok(())
}

fn run(manager: &Manager, sql: &str, parameters: &[Value]) -> anyhow::Result<()> {
    let statement = manager.prepare(sql)?;
    if statement.kind == StatementKind::Select {
        manager.read_statement_with_handler(&statement, parameters, |row| {
            println!("{}", serde_json::to_string(&row.into_value())?);
            Ok(true)
        })?;
    } else {
        let result = manager.execute_statement(&statement, parameters)?;
        println!("{}", serde_json::to_string(&result)?);
    }
    Ok(())
}

/// Load `{"table": [documents...]}` into the configured database, keyed by
/// each table's logical key column
fn seed(store: &MemoryStore, config: &Config, path: &Path) -> anyhow::Result<usize> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let tables: serde_json::Map<String, Value> = serde_json::from_str(&content)?;

    let session = store.connect(store.address(), None, None)?;
    let mut count = 0;
    for (table, documents) in tables {
        let mut documents: Vec<docsql::Document> = serde_json::from_value(documents)
            .with_context(|| format!("Seed for {} must be an array of objects", table))?;
        for document in &mut documents {
            resolve_key(config, &table, document, false);
        }
        count += documents.len();
        session
            .collection(&config.database, &table)
            .insert_many(documents)?;
    }
    Ok(count)
}

/// Split a script on `;` outside quoted text, skipping blank statements
fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in script.chars() {
        match (quote, ch) {
            (None, '\'' | '"' | '`') => quote = Some(ch),
            (Some(q), c) if q == c => quote = None,
            (None, ';') => {
                statements.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    statements.push(current);

    statements
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
