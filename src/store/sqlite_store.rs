//! Embedded SQLite implementation of the index store.
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use bitcoin::{hashes::Hash, Txid};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tokio::task;

use crate::{key::OutputKey, store::IndexStore};

/// Tables:
///   vars(id = 0, block_height_checked)                    -- exactly one row once initialized
///   script_pubkeys(script_pubkey_hash, txid)              -- UNIQUE pair, indexed by hash
const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS vars (
        id                   INTEGER PRIMARY KEY CHECK (id = 0),
        block_height_checked INTEGER NOT NULL CHECK (block_height_checked >= 0)
    );

    CREATE TABLE IF NOT EXISTS script_pubkeys (
        script_pubkey_hash BLOB NOT NULL,
        txid               BLOB NOT NULL,
        UNIQUE (script_pubkey_hash, txid)
    );

    CREATE INDEX IF NOT EXISTS script_pubkey_hash ON script_pubkeys (script_pubkey_hash);
"#;

/// SQLite store holding one shared connection, reopened after a connection-level failure.
#[derive(Clone)]
pub struct SqliteStore {
    path: PathBuf,
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteStore {
    /// Creates/initializes the SQLite file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let conn = Self::connect(&path)
            .with_context(|| format!("open sqlite at {}", path.display()))?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            "#,
        )?;
        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    /// Convenient in-memory store (useful for tests)
    ///
    /// There is nothing to reconnect to: reopening `:memory:` would yield a fresh, empty
    /// database, so connection-level errors are returned to the caller instead of replayed.
    pub fn new_in_memory() -> anyhow::Result<Self> {
        let path = PathBuf::from(":memory:");
        let conn = Self::connect(&path).context("open in-memory sqlite")?;
        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    /// Number of index entries (diagnostics).
    pub async fn entry_count(&self) -> anyhow::Result<u64> {
        let n: i64 = self
            .with_conn("count entries", |conn| {
                conn.query_row("SELECT COUNT(*) FROM script_pubkeys", [], |row| row.get(0))
            })
            .await?;
        Ok(u64::try_from(n)?)
    }

    fn connect(path: &Path) -> rusqlite::Result<Connection> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        log::info!("Connected to sqlite database at {}", path.display());
        Ok(conn)
    }

    fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == ":memory:"
    }

    /// Run `f` on the shared connection from a blocking thread. A connection-level
    /// failure on a file-backed store drops the handle and replays `f` once on a fresh
    /// connection.
    async fn with_conn<T, F>(&self, op: &'static str, f: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: Fn(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let path = self.path.clone();
        let reconnect = !self.is_in_memory();
        let slot = Arc::clone(&self.conn);
        task::spawn_blocking(move || {
            let mut guard = slot
                .lock()
                .map_err(|_| anyhow!("sqlite connection lock poisoned"))?;
            match Self::run_on(&mut guard, &path, &f) {
                Err(e) if reconnect && is_connection_lost(&e) => {
                    log::warn!("Database error ({e}). Reconnecting.");
                    *guard = None;
                    Self::run_on(&mut guard, &path, &f).with_context(|| format!("sqlite {op}"))
                }
                res => res.with_context(|| format!("sqlite {op}")),
            }
        })
        .await?
    }

    fn run_on<T>(
        slot: &mut Option<Connection>,
        path: &Path,
        f: &impl Fn(&Connection) -> rusqlite::Result<T>,
    ) -> rusqlite::Result<T> {
        let conn = match slot.take() {
            Some(conn) => conn,
            None => Self::connect(path)?,
        };
        f(slot.insert(conn))
    }
}

fn is_connection_lost(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(
            ErrorCode::CannotOpen
                | ErrorCode::SystemIoFailure
                | ErrorCode::NotADatabase
                | ErrorCode::ApiMisuse
        )
    )
}

#[async_trait]
impl IndexStore for SqliteStore {
    async fn ensure_schema(&self) -> anyhow::Result<()> {
        self.with_conn("create schema", |conn| conn.execute_batch(SCHEMA))
            .await
    }

    async fn read_progress(&self) -> anyhow::Result<Option<u32>> {
        self.with_conn("read block_height_checked", |conn| {
            conn.query_row(
                "SELECT block_height_checked FROM vars WHERE id = 0",
                [],
                |row| row.get::<_, u32>(0),
            )
            .optional()
        })
        .await
    }

    async fn write_progress(&self, height: u32) -> anyhow::Result<()> {
        self.with_conn("update block_height_checked", move |conn| {
            conn.execute(
                "INSERT INTO vars(id, block_height_checked) VALUES(0, ?1)
                 ON CONFLICT(id) DO UPDATE SET block_height_checked=excluded.block_height_checked",
                params![height],
            )
            .map(|_| ())
        })
        .await
    }

    async fn insert_entry(&self, key: OutputKey, txid: Txid) -> anyhow::Result<()> {
        let txid = txid.to_byte_array();
        self.with_conn("insert script_pubkey", move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO script_pubkeys (script_pubkey_hash, txid) VALUES (?1, ?2)",
                params![&key.0[..], &txid[..]],
            )
            .map(|_| ())
        })
        .await
    }

    async fn lookup(&self, key: OutputKey) -> anyhow::Result<Vec<Txid>> {
        let rows: Vec<Vec<u8>> = self
            .with_conn("lookup script_pubkey", move |conn| {
                let mut stmt = conn.prepare_cached(
                    "SELECT txid FROM script_pubkeys WHERE script_pubkey_hash = ?1 ORDER BY rowid",
                )?;
                let rows = stmt.query_map(params![&key.0[..]], |row| row.get(0))?;
                rows.collect()
            })
            .await?;

        rows.into_iter()
            .map(|raw| {
                let bytes: [u8; 32] = raw
                    .as_slice()
                    .try_into()
                    .map_err(|_| anyhow!("stored txid has {} bytes, expected 32", raw.len()))?;
                Ok(Txid::from_byte_array(bytes))
            })
            .collect()
    }
}
