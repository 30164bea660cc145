use chrono::{DateTime, Utc};
use lesson_domain::entities::{
    DueTask, NewScheduledTask, StudentSnapshot, TaskType, TeacherSnapshot, TestSnapshot,
};

pub fn teacher(id: &str, name: &str) -> TeacherSnapshot {
    TeacherSnapshot {
        id: id.to_string(),
        name: name.to_string(),
        email: Some(format!("{id}@teachers.example.com")),
    }
}

pub fn student(id: &str, name: &str) -> StudentSnapshot {
    StudentSnapshot {
        id: id.to_string(),
        name: name.to_string(),
        email: format!("{id}@students.example.com"),
        language: Some("Spanish".to_string()),
        level: Some("B1".to_string()),
        next_lesson_topic: None,
    }
}

pub fn student_with_topic(id: &str, name: &str, topic: &str) -> StudentSnapshot {
    StudentSnapshot {
        next_lesson_topic: Some(topic.to_string()),
        ..student(id, name)
    }
}

pub fn test_snapshot(id: &str, title: &str) -> TestSnapshot {
    TestSnapshot {
        id: id.to_string(),
        title: title.to_string(),
        content: format!("# {title}\n\n1. Conjugate *ser* in the present tense."),
        status: "draft".to_string(),
        sent_at: None,
    }
}

pub fn new_task(
    owner_id: &str,
    student_id: &str,
    task_type: TaskType,
    scheduled_for: DateTime<Utc>,
) -> NewScheduledTask {
    NewScheduledTask {
        task_type: Some(task_type),
        scheduled_for: Some(scheduled_for),
        ..NewScheduledTask::new(owner_id, student_id)
    }
}

pub fn new_test_task(
    owner_id: &str,
    student_id: &str,
    test_id: &str,
    scheduled_for: DateTime<Utc>,
) -> NewScheduledTask {
    NewScheduledTask {
        test_id: Some(test_id.to_string()),
        ..new_task(owner_id, student_id, TaskType::Test, scheduled_for)
    }
}

/// Builder for fully resolved due tasks used by handler tests
pub struct DueTaskBuilder {
    task: DueTask,
}

impl DueTaskBuilder {
    pub fn new(id: i64, task_type: TaskType) -> Self {
        Self {
            task: DueTask {
                id,
                owner_id: "teacher-1".to_string(),
                task_type: Some(task_type),
                raw_task_type: task_type.as_str().to_string(),
                scheduled_for: Utc::now(),
                student_id: "student-1".to_string(),
                test_id: None,
                metadata: serde_json::json!({}),
                student: Some(student("student-1", "Ana")),
                teacher: Some(teacher("teacher-1", "Marta")),
                test: None,
                load_error: None,
            },
        }
    }

    pub fn test(id: i64) -> Self {
        Self::new(id, TaskType::Test).with_test(test_snapshot("test-1", "Verbs quiz"))
    }

    pub fn lesson_topic(id: i64, topic: &str) -> Self {
        Self::new(id, TaskType::LessonTopic)
            .with_student(student_with_topic("student-1", "Ana", topic))
    }

    pub fn with_owner(mut self, owner_id: &str) -> Self {
        self.task.owner_id = owner_id.to_string();
        self
    }

    pub fn with_student(mut self, student: StudentSnapshot) -> Self {
        self.task.student_id = student.id.clone();
        self.task.student = Some(student);
        self
    }

    pub fn without_student(mut self) -> Self {
        self.task.student = None;
        self
    }

    pub fn without_teacher(mut self) -> Self {
        self.task.teacher = None;
        self
    }

    pub fn with_test(mut self, test: TestSnapshot) -> Self {
        self.task.test_id = Some(test.id.clone());
        self.task.test = Some(test);
        self
    }

    pub fn without_test(mut self) -> Self {
        self.task.test = None;
        self
    }

    pub fn with_raw_type(mut self, raw: &str) -> Self {
        self.task.task_type = TaskType::parse(raw);
        self.task.raw_task_type = raw.to_string();
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.task.metadata = metadata;
        self
    }

    pub fn with_load_error(mut self, error: &str) -> Self {
        self.task.load_error = Some(error.to_string());
        self
    }

    pub fn scheduled_for(mut self, when: DateTime<Utc>) -> Self {
        self.task.scheduled_for = when;
        self
    }

    pub fn build(self) -> DueTask {
        self.task
    }
}
