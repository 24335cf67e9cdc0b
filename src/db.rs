use log::{debug, info};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr, Statement};
use std::fs::{self, OpenOptions};
use std::path::Path;

use crate::config::AppConfig;

pub async fn connect_db(config: &AppConfig) -> Result<DatabaseConnection, DbErr> {
    let url = config.database_url();
    if url.starts_with("sqlite") && !is_memory(&url) {
        ensure_sqlite_path(&url);
    }
    connect_url(&url).await
}

/// Opens `url` and bootstraps the schema. In-memory SQLite databases are
/// per-connection, so their pool is pinned to a single connection.
pub async fn connect_url(url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(url.to_string());
    options.sqlx_logging(false);
    if is_memory(url) {
        options.max_connections(1).min_connections(1);
    }
    let db = Database::connect(options).await?;
    init_schema(&db).await?;
    Ok(db)
}

fn is_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

fn ensure_sqlite_path(url: &str) {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    let path = path.split('?').next().unwrap_or(path);
    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let _ = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path);
}

pub async fn init_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    if backend != DbBackend::Sqlite {
        info!("non-sqlite backend, expecting schema to be provisioned externally");
        return Ok(());
    }

    db.execute(Statement::from_string(backend, "PRAGMA foreign_keys = ON".to_string()))
        .await?;

    let exists_stmt = Statement::from_string(
        backend,
        "SELECT name FROM sqlite_master WHERE type='table' AND name='t_bookmark' LIMIT 1".to_string(),
    );
    if db.query_one(exists_stmt).await?.is_some() {
        return Ok(());
    }

    let sql = include_str!("../schema-sqlite.sql");
    for stmt in split_sql(sql) {
        debug!("schema: {}", stmt.lines().next().unwrap_or_default());
        db.execute(Statement::from_string(backend, stmt)).await?;
    }
    info!("sqlite schema created");
    Ok(())
}

fn split_sql(input: &str) -> Vec<String> {
    let mut buf = String::new();
    for line in input.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") || trimmed.is_empty() {
            continue;
        }
        buf.push_str(line);
        buf.push('\n');
    }
    buf.split(';')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}
