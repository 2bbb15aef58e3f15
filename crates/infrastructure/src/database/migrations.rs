use fleet_errors::FleetResult;
use sqlx::SqlitePool;
use tracing::debug;

const TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS targets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        primary_ip TEXT NOT NULL,
        hostname TEXT,
        machine_uuid TEXT,
        primary_mac TEXT,
        public_ip TEXT,
        created_at TEXT NOT NULL,
        UNIQUE (name, primary_ip)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS jobs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at TEXT NOT NULL,
        prev_id INTEGER REFERENCES jobs(id) ON DELETE SET NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        job_id INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
        target_id INTEGER NOT NULL REFERENCES targets(id) ON DELETE CASCADE,
        content TEXT NOT NULL,
        state TEXT NOT NULL DEFAULT 'QUEUED' CHECK (state IN ('QUEUED', 'CLAIMED', 'COMPLETED')),
        queue_time TEXT NOT NULL,
        claim_time TEXT,
        exec_start_time TEXT,
        exec_stop_time TEXT,
        completed_time TEXT,
        output TEXT,
        error TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS credentials (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        target_id INTEGER NOT NULL REFERENCES targets(id) ON DELETE CASCADE,
        principal TEXT NOT NULL,
        secret TEXT NOT NULL,
        fails INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS target_tags (
        target_id INTEGER NOT NULL REFERENCES targets(id) ON DELETE CASCADE,
        tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
        PRIMARY KEY (target_id, tag_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS job_tags (
        job_id INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
        tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
        PRIMARY KEY (job_id, tag_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS task_tags (
        task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
        tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
        PRIMARY KEY (task_id, tag_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS identities (
        public_key TEXT PRIMARY KEY,
        service TEXT NOT NULL,
        target_id INTEGER REFERENCES targets(id) ON DELETE SET NULL,
        created_at TEXT NOT NULL
    )
    "#,
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_target_tags_tag_id ON target_tags(tag_id)",
    "CREATE INDEX IF NOT EXISTS idx_job_tags_tag_id ON job_tags(tag_id)",
    "CREATE INDEX IF NOT EXISTS idx_task_tags_tag_id ON task_tags(tag_id)",
    "CREATE INDEX IF NOT EXISTS idx_tasks_target_state ON tasks(target_id, state)",
    "CREATE INDEX IF NOT EXISTS idx_tasks_job_id ON tasks(job_id)",
    "CREATE INDEX IF NOT EXISTS idx_jobs_prev_id ON jobs(prev_id)",
    "CREATE INDEX IF NOT EXISTS idx_credentials_target_id ON credentials(target_id)",
    "CREATE INDEX IF NOT EXISTS idx_targets_machine_uuid ON targets(machine_uuid)",
    "CREATE INDEX IF NOT EXISTS idx_targets_primary_mac ON targets(primary_mac)",
    "CREATE INDEX IF NOT EXISTS idx_targets_hostname ON targets(hostname)",
    "CREATE INDEX IF NOT EXISTS idx_identities_target_id ON identities(target_id)",
];

/// 创建全部表与索引，可重复执行
pub async fn run_migrations(pool: &SqlitePool) -> FleetResult<()> {
    debug!("Running SQLite database migrations");

    let mut tx = pool.begin().await?;
    for table_sql in TABLES {
        sqlx::query(table_sql).execute(&mut *tx).await?;
    }
    for index_sql in INDEXES {
        sqlx::query(index_sql).execute(&mut *tx).await?;
    }
    tx.commit().await?;

    debug!("Successfully completed SQLite database migrations");
    Ok(())
}
