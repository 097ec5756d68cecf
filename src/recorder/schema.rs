//! Table definitions and migrations for the SQLite recorder.

use sqlx::SqlitePool;

pub const EXECUTIONS_TABLE: &str = "executions";
pub const TEMPLATE_USAGE_TABLE: &str = "template_usage";

pub const CREATE_EXECUTIONS_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS executions (\
    id TEXT PRIMARY KEY,\
    category TEXT NOT NULL,\
    input_payload TEXT NOT NULL,\
    output_payload TEXT NOT NULL,\
    status TEXT NOT NULL,\
    model TEXT NOT NULL,\
    tokens_input INTEGER NOT NULL DEFAULT 0,\
    tokens_output INTEGER NOT NULL DEFAULT 0,\
    cost_estimate REAL NOT NULL DEFAULT 0,\
    latency_ms INTEGER NOT NULL DEFAULT 0,\
    rating INTEGER,\
    feedback TEXT NOT NULL DEFAULT '',\
    error_message TEXT,\
    metadata TEXT NOT NULL DEFAULT '{}',\
    created_at TEXT NOT NULL\
)";

pub const CREATE_EXECUTIONS_CATEGORY_INDEX_SQL: &str =
    "CREATE INDEX IF NOT EXISTS idx_executions_category ON executions (category)";

pub const CREATE_EXECUTIONS_CREATED_INDEX_SQL: &str =
    "CREATE INDEX IF NOT EXISTS idx_executions_created_at ON executions (created_at)";

pub const CREATE_TEMPLATE_USAGE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS template_usage (\
    category TEXT PRIMARY KEY,\
    usage_count INTEGER NOT NULL DEFAULT 0\
)";

pub const MIGRATION_STATEMENTS_SQL: [&str; 4] = [
    CREATE_EXECUTIONS_TABLE_SQL,
    CREATE_EXECUTIONS_CATEGORY_INDEX_SQL,
    CREATE_EXECUTIONS_CREATED_INDEX_SQL,
    CREATE_TEMPLATE_USAGE_TABLE_SQL,
];

/// Apply every statement in order. Safe to run on each start.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in MIGRATION_STATEMENTS_SQL {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
