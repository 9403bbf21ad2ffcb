//! SQL migration definitions for the eventgraph cache database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed as one batch.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: service_cache",
            sql: r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per (service, normalized request). Never evicted.
CREATE TABLE IF NOT EXISTS service_cache (
    service     TEXT NOT NULL,
    request_key TEXT NOT NULL,
    params      TEXT NOT NULL,
    response    TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    PRIMARY KEY (service, request_key)
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Index service_cache by service for stats",
            sql: r#"
CREATE INDEX IF NOT EXISTS idx_service_cache_service ON service_cache(service);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
        Migration {
            version: 3,
            description: "Record response status for permanent failures",
            sql: r#"
-- 200 for stored bodies; 404/410 rows hold the error message instead.
ALTER TABLE service_cache ADD COLUMN status INTEGER NOT NULL DEFAULT 200;

INSERT INTO schema_migrations (version) VALUES (3);
"#,
        },
    ]
}
