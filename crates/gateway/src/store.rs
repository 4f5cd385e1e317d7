//! Shared SQLite handle backing usage accounting (C8) and budget enforcement
//! (C9). `rusqlite::Connection` isn't `Sync`, and its calls are blocking, so
//! every query is dispatched through `spawn_blocking` while holding a
//! `std::sync::Mutex` for the duration of that one blocking call only.

use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use rusqlite::Connection;

#[derive(Clone)]
pub(crate) struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub(crate) fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS usage_records (
                request_id TEXT PRIMARY KEY,
                provider TEXT NOT NULL,
                model TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                input_tokens INTEGER NOT NULL,
                cache_write_input_tokens INTEGER NOT NULL,
                cache_read_input_tokens INTEGER NOT NULL,
                output_tokens INTEGER NOT NULL,
                total_tokens INTEGER NOT NULL,
                input_cost REAL NOT NULL,
                cache_write_cost REAL NOT NULL,
                cache_read_cost REAL NOT NULL,
                output_cost REAL NOT NULL,
                total_cost REAL NOT NULL,
                currency TEXT NOT NULL,
                payment_method TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS usage_records_timestamp ON usage_records(timestamp);

            CREATE TABLE IF NOT EXISTS spend_limits (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                scope TEXT NOT NULL,
                amount_usd REAL,
                alert_only INTEGER NOT NULL,
                window TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;

        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Opens an in-memory database, for tests that need isolated storage.
    #[cfg(test)]
    pub(crate) fn open_in_memory() -> anyhow::Result<Self> {
        let tmp = std::env::temp_dir().join(format!("aigateway-test-{}.db", uuid::Uuid::new_v4()));
        Self::open(&tmp)
    }

    /// Runs `work` against the connection on a blocking thread.
    pub(crate) async fn run<F, T>(&self, work: F) -> anyhow::Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().expect("usage store mutex poisoned");
            work(&guard)
        })
        .await?
        .map_err(Into::into)
    }
}
