use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use lesson_errors::{SchedulerError, SchedulerResult};
use serde::{Deserialize, Serialize};

/// 计划任务类型，决定由哪个投递处理器执行
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskType {
    #[serde(rename = "TEST", alias = "test", alias = "Test")]
    Test,
    #[serde(
        rename = "LESSON_TOPIC",
        alias = "lesson_topic",
        alias = "lessonTopic",
        alias = "LessonTopic"
    )]
    LessonTopic,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Test => "TEST",
            TaskType::LessonTopic => "LESSON_TOPIC",
        }
    }

    /// 解析存储或请求中的类型标签，未知标签返回 None
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "TEST" | "test" | "Test" => Some(TaskType::Test),
            "LESSON_TOPIC" | "lesson_topic" | "lessonTopic" | "LessonTopic" => {
                Some(TaskType::LessonTopic)
            }
            _ => None,
        }
    }

    pub fn requires_test(&self) -> bool {
        matches!(self, TaskType::Test)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            SchedulerError::validation_error(format!(
                "不支持的任务类型: {s}，可选值为 TEST 或 LESSON_TOPIC"
            ))
        })
    }
}

/// 计划任务状态，只允许 PENDING -> COMPLETED / FAILED
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ScheduledTaskStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "FAILED")]
    Failed,
}

impl ScheduledTaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduledTaskStatus::Pending => "PENDING",
            ScheduledTaskStatus::Completed => "COMPLETED",
            ScheduledTaskStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ScheduledTaskStatus::Pending)
    }
}

impl fmt::Display for ScheduledTaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduledTaskStatus {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ScheduledTaskStatus::Pending),
            "COMPLETED" => Ok(ScheduledTaskStatus::Completed),
            "FAILED" => Ok(ScheduledTaskStatus::Failed),
            _ => Err(SchedulerError::validation_error(format!(
                "无效的任务状态: {s}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledTask {
    pub id: i64,
    pub owner_id: String,
    pub task_type: TaskType,
    pub scheduled_for: DateTime<Utc>,
    pub status: ScheduledTaskStatus,
    pub student_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduledTask {
    pub fn is_pending(&self) -> bool {
        self.status == ScheduledTaskStatus::Pending
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && self.scheduled_for <= now
    }
}

/// 待插入的计划任务，类型和时间在写入前校验
#[derive(Debug, Clone, PartialEq)]
pub struct NewScheduledTask {
    pub owner_id: String,
    pub task_type: Option<TaskType>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub student_id: String,
    pub test_id: Option<String>,
    pub metadata: serde_json::Value,
}

impl NewScheduledTask {
    pub fn new(owner_id: impl Into<String>, student_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            task_type: None,
            scheduled_for: None,
            student_id: student_id.into(),
            test_id: None,
            metadata: serde_json::json!({}),
        }
    }

    pub fn validate(&self) -> SchedulerResult<(TaskType, DateTime<Utc>)> {
        let task_type = self
            .task_type
            .ok_or_else(|| SchedulerError::validation_error("缺少任务类型 taskType"))?;
        let scheduled_for = self
            .scheduled_for
            .ok_or_else(|| SchedulerError::validation_error("缺少计划时间 scheduledFor"))?;
        if self.owner_id.trim().is_empty() {
            return Err(SchedulerError::validation_error("缺少任务所有者"));
        }
        if self.student_id.trim().is_empty() {
            return Err(SchedulerError::validation_error("缺少学生 studentId"));
        }
        Ok((task_type, scheduled_for))
    }
}

/// 投递时使用的学生快照
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudentSnapshot {
    pub id: String,
    pub name: String,
    pub email: String,
    pub language: Option<String>,
    pub level: Option<String>,
    pub next_lesson_topic: Option<String>,
}

impl StudentSnapshot {
    /// 非空白的下节课主题
    pub fn lesson_topic(&self) -> Option<&str> {
        self.next_lesson_topic
            .as_deref()
            .map(str::trim)
            .filter(|topic| !topic.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeacherSnapshot {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestSnapshot {
    pub id: String,
    pub title: String,
    pub content: String,
    pub status: String,
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestSummary {
    pub id: String,
    pub title: String,
    pub status: String,
}

/// 列表展示用的计划任务，附带学生和测试的摘要
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledTaskView {
    #[serde(flatten)]
    pub task: ScheduledTask,
    pub student: Option<StudentSummary>,
    pub test: Option<TestSummary>,
}

/// 到期任务，查询时一次性解析出学生、教师和测试
///
/// `task_type` 为 None 表示存储中的类型标签无法识别，原始值保存在 `raw_task_type`。
/// `load_error` 非空表示该行无法完整解析，其余字段只保证 id 可用。
#[derive(Debug, Clone, PartialEq)]
pub struct DueTask {
    pub id: i64,
    pub owner_id: String,
    pub task_type: Option<TaskType>,
    pub raw_task_type: String,
    pub scheduled_for: DateTime<Utc>,
    pub student_id: String,
    pub test_id: Option<String>,
    pub metadata: serde_json::Value,
    pub student: Option<StudentSnapshot>,
    pub teacher: Option<TeacherSnapshot>,
    pub test: Option<TestSnapshot>,
    pub load_error: Option<String>,
}

/// 周期性课程主题任务的接收者
#[derive(Debug, Clone, PartialEq)]
pub struct LessonTopicRecipient {
    pub student: StudentSnapshot,
    pub teacher: TeacherSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_task_type_wire_values() {
        assert_eq!(serde_json::to_string(&TaskType::Test).unwrap(), "\"TEST\"");
        assert_eq!(
            serde_json::to_string(&TaskType::LessonTopic).unwrap(),
            "\"LESSON_TOPIC\""
        );
        let parsed: TaskType = serde_json::from_str("\"lessonTopic\"").unwrap();
        assert_eq!(parsed, TaskType::LessonTopic);
        assert!(serde_json::from_str::<TaskType>("\"VIDEO\"").is_err());
    }

    #[test]
    fn test_task_type_parse() {
        assert_eq!(TaskType::parse("TEST"), Some(TaskType::Test));
        assert_eq!(TaskType::parse("lesson_topic"), Some(TaskType::LessonTopic));
        assert_eq!(TaskType::parse("homework"), None);
        assert!("homework".parse::<TaskType>().is_err());
        assert!(TaskType::Test.requires_test());
        assert!(!TaskType::LessonTopic.requires_test());
    }

    #[test]
    fn test_status_terminality() {
        assert!(!ScheduledTaskStatus::Pending.is_terminal());
        assert!(ScheduledTaskStatus::Completed.is_terminal());
        assert!(ScheduledTaskStatus::Failed.is_terminal());
        assert_eq!(
            "FAILED".parse::<ScheduledTaskStatus>().unwrap(),
            ScheduledTaskStatus::Failed
        );
        assert!("DONE".parse::<ScheduledTaskStatus>().is_err());
    }

    #[test]
    fn test_new_task_validation() {
        let mut input = NewScheduledTask::new("owner-1", "student-1");
        assert!(matches!(
            input.validate(),
            Err(SchedulerError::ValidationError(_))
        ));

        input.task_type = Some(TaskType::LessonTopic);
        assert!(input.validate().is_err());

        let when = Utc::now();
        input.scheduled_for = Some(when);
        assert_eq!(input.validate().unwrap(), (TaskType::LessonTopic, when));

        input.student_id = "  ".to_string();
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_due_check_includes_boundary() {
        let now = Utc::now();
        let task = ScheduledTask {
            id: 1,
            owner_id: "owner-1".into(),
            task_type: TaskType::Test,
            scheduled_for: now,
            status: ScheduledTaskStatus::Pending,
            student_id: "student-1".into(),
            test_id: Some("test-1".into()),
            metadata: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        };
        assert!(task.is_due(now));
        assert!(!task.is_due(now - Duration::seconds(1)));

        let done = ScheduledTask {
            status: ScheduledTaskStatus::Completed,
            ..task
        };
        assert!(!done.is_due(now));
    }

    #[test]
    fn test_view_serializes_flat_camel_case() {
        let now = Utc::now();
        let view = ScheduledTaskView {
            task: ScheduledTask {
                id: 5,
                owner_id: "owner-1".into(),
                task_type: TaskType::LessonTopic,
                scheduled_for: now,
                status: ScheduledTaskStatus::Pending,
                student_id: "student-1".into(),
                test_id: None,
                metadata: serde_json::json!({}),
                created_at: now,
                updated_at: now,
            },
            student: Some(StudentSummary {
                id: "student-1".into(),
                name: "Ana".into(),
                email: "ana@example.com".into(),
            }),
            test: None,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["id"], 5);
        assert_eq!(json["taskType"], "LESSON_TOPIC");
        assert_eq!(json["studentId"], "student-1");
        assert!(json.get("testId").is_none());
        assert_eq!(json["student"]["name"], "Ana");
        assert!(json["test"].is_null());
    }

    #[test]
    fn test_lesson_topic_ignores_blank_values() {
        let mut student = StudentSnapshot {
            id: "s".into(),
            name: "Ana".into(),
            email: "ana@example.com".into(),
            language: None,
            level: None,
            next_lesson_topic: Some("   ".into()),
        };
        assert_eq!(student.lesson_topic(), None);
        student.next_lesson_topic = Some(" Past tense ".into());
        assert_eq!(student.lesson_topic(), Some("Past tense"));
        student.next_lesson_topic = None;
        assert_eq!(student.lesson_topic(), None);
    }
}
