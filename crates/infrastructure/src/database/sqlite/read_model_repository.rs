//! 学生/测试读模型的最小访问接口

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lesson_domain::{
    entities::{LessonTopicRecipient, StudentSnapshot, TeacherSnapshot},
    repositories::{StudentRepository, TestRepository},
};
use lesson_errors::SchedulerResult;
use sqlx::{Row, SqlitePool};
use tracing::instrument;

use crate::{
    database::db_timestamp,
    error_handling::{RepositoryEntity, RepositoryErrorHelpers, RepositoryOperation},
    repo_context,
};

pub struct SqliteStudentRepository {
    pool: SqlitePool,
}

impl SqliteStudentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StudentRepository for SqliteStudentRepository {
    #[instrument(skip(self))]
    async fn with_lesson_topic(&self) -> SchedulerResult<Vec<LessonTopicRecipient>> {
        let context = repo_context!(RepositoryOperation::Query, RepositoryEntity::Student)
            .with_additional_info("下节课主题非空".to_string());
        let rows = sqlx::query(
            r#"
            SELECT s.id, s.name, s.email, s.language, s.level, s.next_lesson_topic,
                   u.id AS u_id, u.name AS u_name, u.email AS u_email
            FROM students s
            JOIN users u ON u.id = s.owner_id
            WHERE s.next_lesson_topic IS NOT NULL AND TRIM(s.next_lesson_topic) <> ''
            ORDER BY s.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(context, e))?;

        let mut recipients = Vec::with_capacity(rows.len());
        for row in rows {
            recipients.push(LessonTopicRecipient {
                student: StudentSnapshot {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    email: row.try_get("email")?,
                    language: row.try_get("language")?,
                    level: row.try_get("level")?,
                    next_lesson_topic: row.try_get("next_lesson_topic")?,
                },
                teacher: TeacherSnapshot {
                    id: row.try_get("u_id")?,
                    name: row.try_get("u_name")?,
                    email: row.try_get("u_email")?,
                },
            });
        }
        Ok(recipients)
    }

    #[instrument(skip(self))]
    async fn clear_lesson_topic(&self, student_id: &str) -> SchedulerResult<bool> {
        let context = repo_context!(
            RepositoryOperation::Update,
            RepositoryEntity::Student,
            id = student_id
        );
        let result = sqlx::query("UPDATE students SET next_lesson_topic = NULL WHERE id = ?")
            .bind(student_id)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(context, e))?;
        Ok(result.rows_affected() > 0)
    }
}

pub struct SqliteTestRepository {
    pool: SqlitePool,
}

impl SqliteTestRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TestRepository for SqliteTestRepository {
    #[instrument(skip(self))]
    async fn mark_sent(&self, test_id: &str, sent_at: DateTime<Utc>) -> SchedulerResult<bool> {
        let context = repo_context!(RepositoryOperation::Update, RepositoryEntity::Test, id = test_id);
        let result = sqlx::query("UPDATE tests SET status = 'sent', sent_at = ? WHERE id = ?")
            .bind(db_timestamp(&sent_at))
            .bind(test_id)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(context, e))?;
        Ok(result.rows_affected() > 0)
    }
}
