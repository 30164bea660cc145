use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lesson_domain::{
    entities::{
        DueTask, NewScheduledTask, ScheduledTask, ScheduledTaskStatus, ScheduledTaskView,
        StudentSnapshot, StudentSummary, TaskType, TeacherSnapshot, TestSnapshot, TestSummary,
    },
    repositories::ScheduledTaskRepository,
    value_objects::TransitionOutcome,
};
use lesson_errors::{SchedulerError, SchedulerResult};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument, warn};

use crate::{
    database::db_timestamp,
    error_handling::{RepositoryEntity, RepositoryErrorHelpers, RepositoryOperation},
    repo_context,
};

const TASK_COLUMNS: &str = "t.id, t.owner_id, t.task_type, t.scheduled_for, t.status, t.student_id, t.test_id, t.metadata, t.created_at, t.updated_at";

pub struct SqliteScheduledTaskRepository {
    pool: SqlitePool,
}

impl SqliteScheduledTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_metadata(row: &SqliteRow, task_id: i64) -> SchedulerResult<serde_json::Value> {
        let raw: String = row.try_get("metadata")?;
        serde_json::from_str(&raw).map_err(|e| {
            RepositoryErrorHelpers::serialization_error(
                repo_context!(
                    RepositoryOperation::Read,
                    RepositoryEntity::ScheduledTask,
                    id = task_id
                ),
                e,
            )
        })
    }

    fn row_to_task(row: &SqliteRow) -> SchedulerResult<ScheduledTask> {
        let id: i64 = row.try_get("id")?;
        let raw_type: String = row.try_get("task_type")?;
        let task_type = TaskType::parse(&raw_type).ok_or_else(|| {
            SchedulerError::database_error(format!("计划任务 {id} 的类型无法识别: {raw_type}"))
        })?;

        Ok(ScheduledTask {
            id,
            owner_id: row.try_get("owner_id")?,
            task_type,
            scheduled_for: row.try_get("scheduled_for")?,
            status: row.try_get("status")?,
            student_id: row.try_get("student_id")?,
            test_id: row.try_get("test_id")?,
            metadata: Self::parse_metadata(row, id)?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_due_task(row: &SqliteRow) -> SchedulerResult<DueTask> {
        let id: i64 = row.try_get("id")?;
        let raw_task_type: String = row.try_get("task_type")?;

        let student = match row.try_get::<Option<String>, _>("s_id")? {
            Some(student_id) => Some(StudentSnapshot {
                id: student_id,
                name: row.try_get("s_name")?,
                email: row.try_get("s_email")?,
                language: row.try_get("s_language")?,
                level: row.try_get("s_level")?,
                next_lesson_topic: row.try_get("s_next_lesson_topic")?,
            }),
            None => None,
        };
        let teacher = match row.try_get::<Option<String>, _>("u_id")? {
            Some(teacher_id) => Some(TeacherSnapshot {
                id: teacher_id,
                name: row.try_get("u_name")?,
                email: row.try_get("u_email")?,
            }),
            None => None,
        };
        let test = match row.try_get::<Option<String>, _>("x_id")? {
            Some(test_id) => Some(TestSnapshot {
                id: test_id,
                title: row.try_get("x_title")?,
                content: row.try_get("x_content")?,
                status: row.try_get("x_status")?,
                sent_at: row.try_get("x_sent_at")?,
            }),
            None => None,
        };

        Ok(DueTask {
            id,
            owner_id: row.try_get("owner_id")?,
            task_type: TaskType::parse(&raw_task_type),
            raw_task_type,
            scheduled_for: row.try_get("scheduled_for")?,
            student_id: row.try_get("student_id")?,
            test_id: row.try_get("test_id")?,
            metadata: Self::parse_metadata(row, id)?,
            student,
            teacher,
            test,
            load_error: None,
        })
    }

    /// 无法完整解析的到期行，保留能读出的字段交给扫描器判定失败
    ///
    /// 连 id 都读不出时返回 None。
    fn unreadable_due_task(
        row: &SqliteRow,
        now: DateTime<Utc>,
        error: &SchedulerError,
    ) -> Option<DueTask> {
        let id: i64 = row.try_get("id").ok()?;
        let raw_task_type: String = row.try_get("task_type").unwrap_or_default();
        Some(DueTask {
            id,
            owner_id: row.try_get("owner_id").unwrap_or_default(),
            task_type: TaskType::parse(&raw_task_type),
            raw_task_type,
            scheduled_for: row.try_get("scheduled_for").unwrap_or(now),
            student_id: row.try_get("student_id").unwrap_or_default(),
            test_id: row.try_get("test_id").unwrap_or_default(),
            metadata: serde_json::Value::Null,
            student: None,
            teacher: None,
            test: None,
            load_error: Some(error.to_string()),
        })
    }

    fn row_to_view(row: &SqliteRow) -> SchedulerResult<ScheduledTaskView> {
        let task = Self::row_to_task(row)?;
        let student = match row.try_get::<Option<String>, _>("s_id")? {
            Some(id) => Some(StudentSummary {
                id,
                name: row.try_get("s_name")?,
                email: row.try_get("s_email")?,
            }),
            None => None,
        };
        let test = match row.try_get::<Option<String>, _>("x_id")? {
            Some(id) => Some(TestSummary {
                id,
                title: row.try_get("x_title")?,
                status: row.try_get("x_status")?,
            }),
            None => None,
        };
        Ok(ScheduledTaskView {
            task,
            student,
            test,
        })
    }
}

#[async_trait]
impl ScheduledTaskRepository for SqliteScheduledTaskRepository {
    #[instrument(skip(self, task), fields(
        owner_id = %task.owner_id,
        student_id = %task.student_id,
        task_type = ?task.task_type,
    ))]
    async fn insert(&self, task: &NewScheduledTask) -> SchedulerResult<ScheduledTask> {
        let (task_type, scheduled_for) = task.validate()?;
        let context = repo_context!(
            RepositoryOperation::Create,
            RepositoryEntity::ScheduledTask,
            owner = &task.owner_id
        );

        let metadata_json = serde_json::to_string(&task.metadata)
            .map_err(|e| RepositoryErrorHelpers::serialization_error(context.clone(), e))?;
        let now = db_timestamp(&Utc::now());

        let row = sqlx::query(
            r#"
            INSERT INTO scheduled_tasks (owner_id, task_type, scheduled_for, status, student_id, test_id, metadata, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, owner_id, task_type, scheduled_for, status, student_id, test_id, metadata, created_at, updated_at
            "#,
        )
        .bind(&task.owner_id)
        .bind(task_type)
        .bind(db_timestamp(&scheduled_for))
        .bind(ScheduledTaskStatus::Pending)
        .bind(&task.student_id)
        .bind(&task.test_id)
        .bind(metadata_json)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(context, e))?;

        let created = Self::row_to_task(&row)?;
        debug!(task_id = created.id, "计划任务已写入");
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i64) -> SchedulerResult<Option<ScheduledTask>> {
        let context = repo_context!(
            RepositoryOperation::Read,
            RepositoryEntity::ScheduledTask,
            id = id
        );
        let row = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM scheduled_tasks t WHERE t.id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(context, e))?;

        row.as_ref().map(Self::row_to_task).transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_owner(&self, owner_id: &str) -> SchedulerResult<Vec<ScheduledTaskView>> {
        let context = repo_context!(
            RepositoryOperation::Query,
            RepositoryEntity::ScheduledTask,
            owner = owner_id
        );
        let rows = sqlx::query(&format!(
            r#"
            SELECT {TASK_COLUMNS},
                   s.id AS s_id, s.name AS s_name, s.email AS s_email,
                   x.id AS x_id, x.title AS x_title, x.status AS x_status
            FROM scheduled_tasks t
            LEFT JOIN students s ON s.id = t.student_id AND s.owner_id = t.owner_id
            LEFT JOIN tests x ON x.id = t.test_id AND x.student_id = t.student_id
            WHERE t.owner_id = ?
            ORDER BY t.scheduled_for ASC, t.id ASC
            "#
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(context, e))?;

        let mut views = Vec::with_capacity(rows.len());
        for row in &rows {
            match Self::row_to_view(row) {
                Ok(view) => views.push(view),
                Err(e) => {
                    let id = row.try_get::<i64, _>("id").ok();
                    warn!(task_id = ?id, error = %e, "跳过无法解析的计划任务");
                }
            }
        }
        Ok(views)
    }

    #[instrument(skip(self), fields(now = %now))]
    async fn find_due(&self, now: DateTime<Utc>) -> SchedulerResult<Vec<DueTask>> {
        let context = repo_context!(RepositoryOperation::Query, RepositoryEntity::ScheduledTask)
            .with_additional_info(format!("到期时间 <= {now}"));
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.owner_id, t.task_type, t.scheduled_for, t.student_id, t.test_id, t.metadata,
                   s.id AS s_id, s.name AS s_name, s.email AS s_email, s.language AS s_language,
                   s.level AS s_level, s.next_lesson_topic AS s_next_lesson_topic,
                   u.id AS u_id, u.name AS u_name, u.email AS u_email,
                   x.id AS x_id, x.title AS x_title, x.content AS x_content,
                   x.status AS x_status, x.sent_at AS x_sent_at
            FROM scheduled_tasks t
            LEFT JOIN students s ON s.id = t.student_id AND s.owner_id = t.owner_id
            LEFT JOIN users u ON u.id = s.owner_id
            LEFT JOIN tests x ON x.id = t.test_id AND x.student_id = t.student_id
            WHERE t.status = ? AND t.claimed_at IS NULL AND t.scheduled_for <= ?
            ORDER BY t.scheduled_for ASC, t.id ASC
            "#,
        )
        .bind(ScheduledTaskStatus::Pending)
        .bind(db_timestamp(&now))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(context, e))?;

        let mut due = Vec::with_capacity(rows.len());
        for row in &rows {
            match Self::row_to_due_task(row) {
                Ok(task) => due.push(task),
                Err(e) => match Self::unreadable_due_task(row, now, &e) {
                    Some(task) => {
                        warn!(task_id = task.id, error = %e, "到期任务数据无法解析");
                        due.push(task);
                    }
                    None => warn!(error = %e, "跳过无法识别的到期任务行"),
                },
            }
        }
        debug!(count = due.len(), "查询到期计划任务");
        Ok(due)
    }

    #[instrument(skip(self))]
    async fn transition_status(
        &self,
        id: i64,
        new_status: ScheduledTaskStatus,
    ) -> SchedulerResult<TransitionOutcome> {
        if !new_status.is_terminal() {
            return Err(SchedulerError::validation_error(
                "计划任务只能迁移到 COMPLETED 或 FAILED",
            ));
        }
        let context = repo_context!(
            RepositoryOperation::Transition,
            RepositoryEntity::ScheduledTask,
            id = id
        )
        .with_additional_info(format!("目标状态 {new_status}"));

        let result = sqlx::query(
            "UPDATE scheduled_tasks SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(new_status)
        .bind(db_timestamp(&Utc::now()))
        .bind(id)
        .bind(ScheduledTaskStatus::Pending)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(context, e))?;

        if result.rows_affected() == 1 {
            Ok(TransitionOutcome::Applied)
        } else {
            debug!(task_id = id, "任务已不处于 PENDING，跳过状态迁移");
            Ok(TransitionOutcome::Skipped)
        }
    }

    #[instrument(skip(self), fields(claimed_at = %claimed_at))]
    async fn claim(&self, id: i64, claimed_at: DateTime<Utc>) -> SchedulerResult<TransitionOutcome> {
        let context = repo_context!(
            RepositoryOperation::Claim,
            RepositoryEntity::ScheduledTask,
            id = id
        );
        let claimed_at = db_timestamp(&claimed_at);

        let result = sqlx::query(
            r#"
            UPDATE scheduled_tasks SET claimed_at = ?, updated_at = ?
            WHERE id = ? AND status = ? AND claimed_at IS NULL
            "#,
        )
        .bind(&claimed_at)
        .bind(&claimed_at)
        .bind(id)
        .bind(ScheduledTaskStatus::Pending)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(context, e))?;

        if result.rows_affected() == 1 {
            Ok(TransitionOutcome::Applied)
        } else {
            debug!(task_id = id, "任务已被占用或不再处于 PENDING");
            Ok(TransitionOutcome::Skipped)
        }
    }

    #[instrument(skip(self))]
    async fn delete_if_pending(&self, id: i64, owner_id: &str) -> SchedulerResult<bool> {
        let context = repo_context!(
            RepositoryOperation::Delete,
            RepositoryEntity::ScheduledTask,
            id = id,
            owner = owner_id
        );
        let result = sqlx::query(
            "DELETE FROM scheduled_tasks WHERE id = ? AND owner_id = ? AND status = ? AND claimed_at IS NULL",
        )
        .bind(id)
        .bind(owner_id)
        .bind(ScheduledTaskStatus::Pending)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(context, e))?;

        Ok(result.rows_affected() > 0)
    }
}
