//! Persistent service-response cache on libSQL (embedded, offline mode).
//!
//! [`CacheStore`] is a content-addressed key-value store: the key is the
//! service name plus a hash of the normalized request parameters, the value
//! is the raw response body, or the message of a permanent failure (a page
//! that does not exist stays missing). Entries are never evicted; historical portal
//! dates and knowledge-base answers are treated as static.
//!
//! The store is opened once per run and passed explicitly (usually behind an
//! `Arc`) to every component that talks to an external service.

mod migrations;

use std::path::Path;

use chrono::Utc;
use eventgraph_shared::{EventGraphError, Result, normalize_whitespace, sha256_hex};
use libsql::{Connection, Database, params};
use tokio::sync::Mutex;

/// Content-addressed key for a request: SHA-256 of its whitespace-normalized parameters.
pub fn cache_key(params: &str) -> String {
    sha256_hex(&normalize_whitespace(params))
}

/// A stored answer: either a response body or a permanent failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedResponse {
    Body(String),
    Failed { status: u16, message: String },
}

/// Persistent response cache wrapping a libSQL database.
pub struct CacheStore {
    #[allow(dead_code)]
    db: Database,
    // Serializes statements issued from concurrent lookups.
    conn: Mutex<Connection>,
}

impl CacheStore {
    /// Open or create the cache database at `path`.
    ///
    /// Failure here is fatal for a run: nothing can be looked up or reused.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| EventGraphError::io(parent, e))?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| EventGraphError::Storage(format!("open {}: {e}", path.display())))?;

        let conn = db
            .connect()
            .map_err(|e| EventGraphError::Storage(e.to_string()))?;

        let store = Self {
            db,
            conn: Mutex::new(conn),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;
        let conn = self.conn.lock().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                conn.execute_batch(migration.sql).await.map_err(|e| {
                    EventGraphError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let conn = self.conn.lock().await;
        let result = conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Cache operations
    // -----------------------------------------------------------------------

    /// Look up the stored response body for `(service, params)`. Cached
    /// failures read as a miss here; use [`CacheStore::lookup`] to see them.
    pub async fn get(&self, service: &str, params: &str) -> Result<Option<String>> {
        Ok(match self.lookup(service, params).await? {
            Some(CachedResponse::Body(body)) => Some(body),
            _ => None,
        })
    }

    /// Look up whatever is stored for `(service, params)`.
    pub async fn lookup(&self, service: &str, params: &str) -> Result<Option<CachedResponse>> {
        let key = cache_key(params);
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(
                "SELECT status, response FROM service_cache
                 WHERE service = ?1 AND request_key = ?2",
                params![service, key.as_str()],
            )
            .await
            .map_err(|e| EventGraphError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let status: i64 = row
                    .get(0)
                    .map_err(|e| EventGraphError::Storage(e.to_string()))?;
                let response: String = row
                    .get(1)
                    .map_err(|e| EventGraphError::Storage(e.to_string()))?;
                if status == 200 {
                    Ok(Some(CachedResponse::Body(response)))
                } else {
                    let status = u16::try_from(status).map_err(|_| {
                        EventGraphError::Storage(format!("bad cached status {status}"))
                    })?;
                    Ok(Some(CachedResponse::Failed {
                        status,
                        message: response,
                    }))
                }
            }
            Ok(None) => Ok(None),
            Err(e) => Err(EventGraphError::Storage(e.to_string())),
        }
    }

    /// Store a response for `(service, params)`. Last write wins.
    pub async fn put(&self, service: &str, params: &str, response: &str) -> Result<()> {
        self.upsert(service, params, 200, response).await
    }

    /// Record a permanent failure (status plus message) for `(service, params)`.
    pub async fn put_failure(
        &self,
        service: &str,
        params: &str,
        status: u16,
        message: &str,
    ) -> Result<()> {
        self.upsert(service, params, status, message).await
    }

    async fn upsert(&self, service: &str, params: &str, status: u16, response: &str) -> Result<()> {
        let key = cache_key(params);
        let normalized = normalize_whitespace(params);
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO service_cache (service, request_key, params, response, created_at, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(service, request_key) DO UPDATE SET
               response = excluded.response,
               created_at = excluded.created_at,
               status = excluded.status",
            params![
                service,
                key.as_str(),
                normalized.as_str(),
                response,
                now.as_str(),
                i64::from(status)
            ],
        )
        .await
        .map_err(|e| EventGraphError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Number of cached responses, optionally restricted to one service.
    pub async fn count(&self, service: Option<&str>) -> Result<u64> {
        let conn = self.conn.lock().await;
        let mut rows = match service {
            Some(service) => {
                conn.query(
                    "SELECT COUNT(*) FROM service_cache WHERE service = ?1",
                    params![service],
                )
                .await
            }
            None => conn.query("SELECT COUNT(*) FROM service_cache", params![]).await,
        }
        .map_err(|e| EventGraphError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<i64>(0)
                .map(|n| n.max(0) as u64)
                .map_err(|e| EventGraphError::Storage(e.to_string())),
            Ok(None) => Ok(0),
            Err(e) => Err(EventGraphError::Storage(e.to_string())),
        }
    }
}
