//! Database schema.

pub const SCHEMA_VERSION: i32 = 1;

const SCHEMA_VERSION_TABLE: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    updated_at TEXT NOT NULL
);
";

const VOLUMES_TABLE: &str = "
CREATE TABLE IF NOT EXISTS volumes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    size INTEGER NOT NULL,
    volume_type TEXT NOT NULL,
    template_id INTEGER,
    pool_id INTEGER,
    install_path TEXT,
    state TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_volumes_pool ON volumes(pool_id);
";

const TEMPLATE_STAGING_TABLE: &str = "
CREATE TABLE IF NOT EXISTS template_staging (
    template_id INTEGER NOT NULL,
    pool_id INTEGER NOT NULL,
    status TEXT NOT NULL,
    state TEXT NOT NULL,
    install_path TEXT,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (template_id, pool_id)
);
";

pub fn all_schemas() -> [&'static str; 3] {
    [SCHEMA_VERSION_TABLE, VOLUMES_TABLE, TEMPLATE_STAGING_TABLE]
}
