use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use lesson_domain::entities::{StudentSnapshot, TeacherSnapshot, TestSnapshot};
use sqlx::{Row, SqlitePool};

pub struct TestEnv;

impl TestEnv {
    /// Polls `condition` until it holds or `timeout` elapses
    pub async fn wait_for<F, Fut>(mut condition: F, timeout: Duration) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if condition().await {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        condition().await
    }
}

fn stored_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub async fn seed_teacher(pool: &SqlitePool, teacher: &TeacherSnapshot) -> sqlx::Result<()> {
    sqlx::query("INSERT INTO users (id, name, email) VALUES (?, ?, ?)")
        .bind(&teacher.id)
        .bind(&teacher.name)
        .bind(&teacher.email)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn seed_student(
    pool: &SqlitePool,
    owner_id: &str,
    student: &StudentSnapshot,
) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO students (id, owner_id, name, email, language, level, next_lesson_topic) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&student.id)
    .bind(owner_id)
    .bind(&student.name)
    .bind(&student.email)
    .bind(&student.language)
    .bind(&student.level)
    .bind(&student.next_lesson_topic)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn seed_test(pool: &SqlitePool, student_id: &str, test: &TestSnapshot) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO tests (id, student_id, title, content, status, sent_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&test.id)
    .bind(student_id)
    .bind(&test.title)
    .bind(&test.content)
    .bind(&test.status)
    .bind(test.sent_at.as_ref().map(stored_timestamp))
    .execute(pool)
    .await?;
    Ok(())
}

/// Inserts a pending row with an arbitrary type tag, bypassing validation
pub async fn seed_raw_task(
    pool: &SqlitePool,
    owner_id: &str,
    raw_task_type: &str,
    scheduled_for: DateTime<Utc>,
    student_id: &str,
) -> sqlx::Result<i64> {
    let now = stored_timestamp(&Utc::now());
    let row = sqlx::query(
        r#"
        INSERT INTO scheduled_tasks (owner_id, task_type, scheduled_for, status, student_id, metadata, created_at, updated_at)
        VALUES (?, ?, ?, 'PENDING', ?, '{}', ?, ?)
        RETURNING id
        "#,
    )
    .bind(owner_id)
    .bind(raw_task_type)
    .bind(stored_timestamp(&scheduled_for))
    .bind(student_id)
    .bind(&now)
    .bind(&now)
    .fetch_one(pool)
    .await?;
    row.try_get("id")
}

/// Returns `(status, sent_at)` of a test row
pub async fn fetch_test_state(
    pool: &SqlitePool,
    test_id: &str,
) -> sqlx::Result<Option<(String, Option<String>)>> {
    let row = sqlx::query("SELECT status, sent_at FROM tests WHERE id = ?")
        .bind(test_id)
        .fetch_optional(pool)
        .await?;
    row.map(|r| Ok((r.try_get("status")?, r.try_get("sent_at")?)))
        .transpose()
}

pub async fn fetch_lesson_topic(pool: &SqlitePool, student_id: &str) -> sqlx::Result<Option<String>> {
    sqlx::query("SELECT next_lesson_topic FROM students WHERE id = ?")
        .bind(student_id)
        .fetch_one(pool)
        .await?
        .try_get("next_lesson_topic")
}

pub async fn fetch_task_status(pool: &SqlitePool, task_id: i64) -> sqlx::Result<Option<String>> {
    let row = sqlx::query("SELECT status FROM scheduled_tasks WHERE id = ?")
        .bind(task_id)
        .fetch_optional(pool)
        .await?;
    row.map(|r| r.try_get("status")).transpose()
}

/// Overwrites the stored metadata text of a task without validation
pub async fn overwrite_task_metadata(
    pool: &SqlitePool,
    task_id: i64,
    raw_metadata: &str,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE scheduled_tasks SET metadata = ? WHERE id = ?")
        .bind(raw_metadata)
        .bind(task_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn fetch_task_claimed_at(
    pool: &SqlitePool,
    task_id: i64,
) -> sqlx::Result<Option<String>> {
    sqlx::query("SELECT claimed_at FROM scheduled_tasks WHERE id = ?")
        .bind(task_id)
        .fetch_one(pool)
        .await?
        .try_get("claimed_at")
}
