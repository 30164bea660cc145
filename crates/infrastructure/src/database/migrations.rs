use lesson_errors::SchedulerResult;
use sqlx::{Row, SqlitePool};
use tracing::debug;

const SCHEMA: &[&str] = &[
    // 读模型：由CRUD子系统维护，这里只负责建表
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS students (
        id TEXT PRIMARY KEY,
        owner_id TEXT NOT NULL,
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        language TEXT,
        level TEXT,
        next_lesson_topic TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tests (
        id TEXT PRIMARY KEY,
        student_id TEXT NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'draft',
        sent_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS scheduled_tasks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id TEXT NOT NULL,
        task_type TEXT NOT NULL,
        scheduled_for TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'PENDING',
        student_id TEXT NOT NULL,
        test_id TEXT,
        metadata TEXT NOT NULL DEFAULT '{}',
        claimed_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_scheduled_tasks_status_scheduled_for ON scheduled_tasks(status, scheduled_for)",
    "CREATE INDEX IF NOT EXISTS idx_scheduled_tasks_owner_id ON scheduled_tasks(owner_id)",
    "CREATE INDEX IF NOT EXISTS idx_students_owner_id ON students(owner_id)",
    "CREATE INDEX IF NOT EXISTS idx_tests_student_id ON tests(student_id)",
];

/// 幂等的建表和索引
pub async fn run_migrations(pool: &SqlitePool) -> SchedulerResult<()> {
    debug!("Running SQLite database migrations");
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    ensure_claimed_at_column(pool).await?;
    debug!("Successfully completed SQLite database migrations");
    Ok(())
}

/// 早期建立的库没有 claimed_at 列
async fn ensure_claimed_at_column(pool: &SqlitePool) -> SchedulerResult<()> {
    let columns = sqlx::query("PRAGMA table_info(scheduled_tasks)")
        .fetch_all(pool)
        .await?;
    let present = columns
        .iter()
        .any(|c| c.try_get::<String, _>("name").is_ok_and(|name| name == "claimed_at"));
    if !present {
        debug!("Adding claimed_at column to scheduled_tasks");
        sqlx::query("ALTER TABLE scheduled_tasks ADD COLUMN claimed_at TEXT")
            .execute(pool)
            .await?;
    }
    Ok(())
}
