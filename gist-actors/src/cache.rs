//! Result cache keyed by the exact page address.
//!
//! Only summarize results are stored. Entries never expire; a newer result for
//! the same address replaces the old one.
use anyhow::{Context as _, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use gist_common::{CacheEntry, PageAddress};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::{debug, info};

#[async_trait]
pub trait ResultCache: Send + Sync {
    /// `Ok(None)` is a miss; `Err` means the backend could not answer.
    async fn lookup(&self, address: &PageAddress) -> Result<Option<CacheEntry>>;
    async fn store(&self, address: &PageAddress, entry: &CacheEntry) -> Result<()>;
    /// Drop every entry. Returns how many were removed.
    async fn clear(&self) -> Result<u64>;
}

/// Process-lifetime cache.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<PageAddress, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ResultCache for MemoryCache {
    async fn lookup(&self, address: &PageAddress) -> Result<Option<CacheEntry>> {
        Ok(self.entries.get(address).map(|e| e.value().clone()))
    }

    async fn store(&self, address: &PageAddress, entry: &CacheEntry) -> Result<()> {
        self.entries.insert(address.clone(), entry.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<u64> {
        let n = self.entries.len() as u64;
        self.entries.clear();
        Ok(n)
    }
}

/// Cache persisted in a SQLite file so results survive restarts.
pub struct SqliteCache {
    pool: SqlitePool,
}

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS page_cache (
    address    TEXT PRIMARY KEY,
    entry      TEXT NOT NULL,
    updated_at TEXT NOT NULL
)"#;

impl SqliteCache {
    /// Open (or create) the cache database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create cache dir {}", parent.display()))?;
        }
        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await
            .with_context(|| format!("failed to open cache {}", path.display()))?;
        info!(path = %path.display(), "cache.sqlite.open");
        Self::with_pool(pool).await
    }

    /// Private in-memory database; lives as long as the pool's single connection.
    pub async fn in_memory() -> Result<Self> {
        let opts = SqliteConnectOptions::new().in_memory(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl ResultCache for SqliteCache {
    async fn lookup(&self, address: &PageAddress) -> Result<Option<CacheEntry>> {
        let row = sqlx::query("SELECT entry FROM page_cache WHERE address = ?1")
            .bind(address.as_str())
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let raw: String = row.try_get("entry")?;
        let entry: CacheEntry = serde_json::from_str(&raw)
            .with_context(|| format!("corrupt cache entry for {address}"))?;
        Ok(Some(entry))
    }

    async fn store(&self, address: &PageAddress, entry: &CacheEntry) -> Result<()> {
        let raw = serde_json::to_string(entry)?;
        let res = sqlx::query(
            r#"INSERT INTO page_cache (address, entry, updated_at)
               VALUES (?1, ?2, ?3)
               ON CONFLICT(address) DO UPDATE SET
                 entry=excluded.entry,
                 updated_at=excluded.updated_at"#,
        )
        .bind(address.as_str())
        .bind(raw)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        debug!(%address, rows = res.rows_affected(), "cache.sqlite.store");
        Ok(())
    }

    async fn clear(&self) -> Result<u64> {
        let res = sqlx::query("DELETE FROM page_cache")
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }
}
