pub mod migrations;
pub mod sqlite;

pub use sqlite::{SqliteScheduledTaskRepository, SqliteStudentRepository, SqliteTestRepository};

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use lesson_config::DatabaseConfig;
use lesson_errors::SchedulerResult;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// 建立连接池并执行迁移
    pub async fn new(config: &DatabaseConfig) -> SchedulerResult<Self> {
        debug!("Connecting to SQLite database at: {}", config.url);

        let mut connect_options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds));

        if config.is_in_memory() {
            // 内存数据库每个连接各自独立，只能保持单个长期连接
            pool_options = pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        } else {
            connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
            pool_options = pool_options
                .max_connections(config.max_connections)
                .min_connections(config.min_connections)
                .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
                .max_lifetime(Duration::from_secs(1800));
        }

        let pool = pool_options.connect_with(connect_options).await?;
        migrations::run_migrations(&pool).await?;

        info!(url = %config.url, "数据库连接池已就绪");
        Ok(Self { pool })
    }

    /// 测试和单次运行使用的内存数据库
    pub async fn in_memory() -> SchedulerResult<Self> {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            ..DatabaseConfig::default()
        };
        Self::new(&config).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn health_check(&self) -> SchedulerResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// 时间统一存为定长 RFC3339 文本（纳秒、Z 结尾），字符串比较即时间比较
pub(crate) fn db_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_db_timestamp_is_fixed_width_and_ordered() {
        let a = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        let b = a + chrono::Duration::milliseconds(500);
        let c = a + chrono::Duration::seconds(1);

        let (sa, sb, sc) = (db_timestamp(&a), db_timestamp(&b), db_timestamp(&c));
        assert_eq!(sa, "2025-03-01T08:00:00.000000000Z");
        assert_eq!(sa.len(), sb.len());
        assert!(sa < sb && sb < sc);
    }

    #[tokio::test]
    async fn test_in_memory_manager_runs_migrations() {
        let manager = DatabaseManager::in_memory().await.unwrap();
        manager.health_check().await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('scheduled_tasks', 'students', 'tests', 'users') ORDER BY name",
        )
        .fetch_all(manager.pool())
        .await
        .unwrap();
        let names: Vec<_> = tables.into_iter().map(|(n,)| n).collect();
        assert_eq!(names, vec!["scheduled_tasks", "students", "tests", "users"]);

        // 迁移可重复执行
        migrations::run_migrations(manager.pool()).await.unwrap();
        manager.close().await;
    }

    #[tokio::test]
    async fn test_migrations_add_claimed_at_to_existing_table() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE scheduled_tasks (id INTEGER PRIMARY KEY AUTOINCREMENT, owner_id TEXT NOT NULL, task_type TEXT NOT NULL, scheduled_for TEXT NOT NULL, status TEXT NOT NULL DEFAULT 'PENDING', student_id TEXT NOT NULL, test_id TEXT, metadata TEXT NOT NULL DEFAULT '{}', created_at TEXT NOT NULL, updated_at TEXT NOT NULL)",
        )
        .execute(&pool)
        .await
        .unwrap();

        migrations::run_migrations(&pool).await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();

        let claimed: Vec<(Option<String>,)> =
            sqlx::query_as("SELECT claimed_at FROM scheduled_tasks")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert!(claimed.is_empty());
    }
}
