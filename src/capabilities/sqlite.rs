//! SQLite-backed query runner.
//!
//! Executes generated SQL against a sqlx pool and renders rows in the
//! `[('a', 1), ('b', 2)]` tuple text the rest of the pipeline consumes.
//! A query the database rejects comes back as `QueryOutcome::Failed`; only
//! pool/connection trouble is a capability error.

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool, TypeInfo, ValueRef};
use tracing::info;

use crate::capabilities::{CapabilityError, QueryOutcome, QueryRunner};
use crate::config::DatabaseConfig;

// Cap on rows rendered into prompts.
const MAX_RENDERED_ROWS: usize = 50;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, CapabilityError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;
        info!(url = %config.url, "connected to database");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// CREATE statements for every user table, for embedding in translation
    /// prompts.
    pub async fn schema_summary(&self) -> Result<String, CapabilityError> {
        let rows = sqlx::query(
            r#"
            SELECT sql FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND sql IS NOT NULL
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let statements: Vec<String> = rows
            .iter()
            .map(|row| row.try_get::<String, _>(0))
            .collect::<Result<_, _>>()?;

        Ok(statements.join("\n\n"))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl QueryRunner for SqliteStore {
    async fn run(&self, query: &str) -> Result<QueryOutcome, CapabilityError> {
        match sqlx::query(query).fetch_all(&self.pool).await {
            Ok(rows) => Ok(QueryOutcome::Rows(render_rows(&rows)?)),
            Err(sqlx::Error::Database(db_err)) => {
                Ok(QueryOutcome::Failed(db_err.message().to_string()))
            }
            Err(other) => Err(CapabilityError::Datastore(other)),
        }
    }
}

fn render_rows(rows: &[SqliteRow]) -> Result<String, CapabilityError> {
    let mut rendered = Vec::with_capacity(rows.len().min(MAX_RENDERED_ROWS));
    for row in rows.iter().take(MAX_RENDERED_ROWS) {
        let mut values = Vec::with_capacity(row.len());
        for idx in 0..row.len() {
            values.push(render_value(row, idx)?);
        }
        // Python-style tuple rendering, trailing comma for 1-tuples.
        let tuple = if values.len() == 1 {
            format!("({},)", values[0])
        } else {
            format!("({})", values.join(", "))
        };
        rendered.push(tuple);
    }
    if rows.len() > MAX_RENDERED_ROWS {
        rendered.push("...".to_string());
    }
    Ok(format!("[{}]", rendered.join(", ")))
}

fn render_value(row: &SqliteRow, idx: usize) -> Result<String, sqlx::Error> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok("None".to_string());
    }
    let type_name = raw.type_info().name().to_string();

    match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => Ok(row.try_get::<i64, _>(idx)?.to_string()),
        "REAL" => Ok(row.try_get::<f64, _>(idx)?.to_string()),
        "BLOB" => Ok(format!("<{} bytes>", row.try_get::<Vec<u8>, _>(idx)?.len())),
        _ => Ok(format!("'{}'", row.try_get::<String, _>(idx)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteStore {
        // A single connection keeps every query on the same in-memory db.
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        };
        let store = SqliteStore::connect(&config).await.expect("connect");
        sqlx::query(
            "CREATE TABLE orders (id INTEGER PRIMARY KEY, customer TEXT, total REAL)",
        )
        .execute(store.pool())
        .await
        .expect("create table");
        for (customer, total) in [("alice", 12.5), ("bob", 30.0), ("carol", 7.25)] {
            sqlx::query("INSERT INTO orders (customer, total) VALUES (?1, ?2)")
                .bind(customer)
                .bind(total)
                .execute(store.pool())
                .await
                .expect("insert");
        }
        store
    }

    #[tokio::test]
    async fn renders_rows_as_tuple_text() {
        let store = test_store().await;
        let outcome = store
            .run("SELECT customer, total FROM orders ORDER BY id")
            .await
            .expect("run");
        assert_eq!(
            outcome,
            QueryOutcome::Rows("[('alice', 12.5), ('bob', 30), ('carol', 7.25)]".to_string())
        );
    }

    #[tokio::test]
    async fn single_column_count_uses_one_tuple_form() {
        let store = test_store().await;
        let outcome = store
            .run("SELECT COUNT(*) FROM orders")
            .await
            .expect("run");
        assert_eq!(outcome, QueryOutcome::Rows("[(3,)]".to_string()));
    }

    #[tokio::test]
    async fn bad_query_is_a_failed_outcome_not_an_error() {
        let store = test_store().await;
        let outcome = store
            .run("SELECT cust_id FROM orders")
            .await
            .expect("store itself is fine");
        match outcome {
            QueryOutcome::Failed(message) => assert!(message.contains("cust_id")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn schema_summary_lists_create_statements() {
        let store = test_store().await;
        let schema = store.schema_summary().await.expect("schema");
        assert!(schema.contains("CREATE TABLE orders"));
    }
}
