//! In-memory implementations of the store traits and collaborator ports
//!
//! They follow the same contracts as the production adapters (ownership joins,
//! compare-and-set transitions, ordering) so dispatcher tests exercise real
//! semantics without a database or network.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lesson_domain::entities::{
    DueTask, LessonTopicRecipient, NewScheduledTask, ScheduledTask, ScheduledTaskStatus,
    ScheduledTaskView, StudentSnapshot, StudentSummary, TaskType, TeacherSnapshot, TestSnapshot,
    TestSummary,
};
use lesson_domain::ports::{
    DeliveryObserver, DocumentRenderer, MailDispatcher, OutboundMail, RenderOptions,
    RenderedDocument,
};
use lesson_domain::repositories::{ScheduledTaskRepository, StudentRepository, TestRepository};
use lesson_domain::value_objects::{BatchReport, SweepReport, TransitionOutcome};
use lesson_errors::{SchedulerError, SchedulerResult};

#[derive(Debug, Clone)]
struct StoredTask {
    id: i64,
    owner_id: String,
    raw_task_type: String,
    scheduled_for: DateTime<Utc>,
    status: ScheduledTaskStatus,
    student_id: String,
    test_id: Option<String>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StoredTask {
    fn to_task(&self) -> Option<ScheduledTask> {
        Some(ScheduledTask {
            id: self.id,
            owner_id: self.owner_id.clone(),
            task_type: TaskType::parse(&self.raw_task_type)?,
            scheduled_for: self.scheduled_for,
            status: self.status,
            student_id: self.student_id.clone(),
            test_id: self.test_id.clone(),
            metadata: self.metadata.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Default)]
struct StoreState {
    tasks: BTreeMap<i64, StoredTask>,
    next_id: i64,
    teachers: HashMap<String, TeacherSnapshot>,
    students: HashMap<String, (String, StudentSnapshot)>,
    tests: HashMap<String, (String, TestSnapshot)>,
    stale_pending: HashSet<i64>,
    claimed: HashSet<i64>,
    unreadable: HashMap<i64, String>,
    fail_find_due: bool,
    fail_transitions: bool,
    fail_mark_sent: bool,
    fail_clear_for: HashSet<String>,
    transitions: Vec<(i64, ScheduledTaskStatus, TransitionOutcome)>,
}

impl StoreState {
    fn student_of(&self, task: &StoredTask) -> Option<&StudentSnapshot> {
        self.students
            .get(&task.student_id)
            .filter(|(owner, _)| owner == &task.owner_id)
            .map(|(_, s)| s)
    }

    fn test_of(&self, task: &StoredTask) -> Option<&TestSnapshot> {
        let test_id = task.test_id.as_ref()?;
        self.tests
            .get(test_id)
            .filter(|(student, _)| student == &task.student_id)
            .map(|(_, t)| t)
    }
}

/// In-memory task store plus student/test read model
#[derive(Clone, Default)]
pub struct InMemoryLessonStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryLessonStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_teacher(&self, teacher: TeacherSnapshot) {
        let mut state = self.state.lock().unwrap();
        state.teachers.insert(teacher.id.clone(), teacher);
    }

    pub fn add_student(&self, owner_id: &str, student: StudentSnapshot) {
        let mut state = self.state.lock().unwrap();
        state
            .students
            .insert(student.id.clone(), (owner_id.to_string(), student));
    }

    pub fn add_test(&self, student_id: &str, test: TestSnapshot) {
        let mut state = self.state.lock().unwrap();
        state
            .tests
            .insert(test.id.clone(), (student_id.to_string(), test));
    }

    /// Stores a row with an arbitrary type tag, bypassing validation
    pub fn insert_raw(
        &self,
        owner_id: &str,
        raw_task_type: &str,
        scheduled_for: DateTime<Utc>,
        student_id: &str,
        test_id: Option<&str>,
    ) -> i64 {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        let now = Utc::now();
        state.tasks.insert(
            id,
            StoredTask {
                id,
                owner_id: owner_id.to_string(),
                raw_task_type: raw_task_type.to_string(),
                scheduled_for,
                status: ScheduledTaskStatus::Pending,
                student_id: student_id.to_string(),
                test_id: test_id.map(str::to_string),
                metadata: serde_json::json!({}),
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    /// Marks the task terminal while `find_due` keeps reporting it as pending,
    /// the situation an overlapping sweep produces.
    pub fn simulate_concurrent_transition(&self, id: i64, status: ScheduledTaskStatus) {
        let mut state = self.state.lock().unwrap();
        if let Some(task) = state.tasks.get_mut(&id) {
            task.status = status;
        }
        state.stale_pending.insert(id);
    }

    /// `find_due` reports the task with a decode error instead of its data
    pub fn mark_unreadable(&self, id: i64, error: &str) {
        self.state
            .lock()
            .unwrap()
            .unreadable
            .insert(id, error.to_string());
    }

    pub fn set_transition_error(&self, fail: bool) {
        self.state.lock().unwrap().fail_transitions = fail;
    }

    pub fn is_claimed(&self, id: i64) -> bool {
        self.state.lock().unwrap().claimed.contains(&id)
    }

    pub fn set_find_due_error(&self, fail: bool) {
        self.state.lock().unwrap().fail_find_due = fail;
    }

    pub fn set_mark_sent_error(&self, fail: bool) {
        self.state.lock().unwrap().fail_mark_sent = fail;
    }

    pub fn fail_clear_for(&self, student_id: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_clear_for
            .insert(student_id.to_string());
    }

    pub fn status_of(&self, id: i64) -> Option<ScheduledTaskStatus> {
        self.state.lock().unwrap().tasks.get(&id).map(|t| t.status)
    }

    pub fn test(&self, id: &str) -> Option<TestSnapshot> {
        self.state
            .lock()
            .unwrap()
            .tests
            .get(id)
            .map(|(_, t)| t.clone())
    }

    pub fn student(&self, id: &str) -> Option<StudentSnapshot> {
        self.state
            .lock()
            .unwrap()
            .students
            .get(id)
            .map(|(_, s)| s.clone())
    }

    pub fn transitions(&self) -> Vec<(i64, ScheduledTaskStatus, TransitionOutcome)> {
        self.state.lock().unwrap().transitions.clone()
    }

    pub fn count(&self) -> usize {
        self.state.lock().unwrap().tasks.len()
    }
}

#[async_trait]
impl ScheduledTaskRepository for InMemoryLessonStore {
    async fn insert(&self, task: &NewScheduledTask) -> SchedulerResult<ScheduledTask> {
        let (task_type, scheduled_for) = task.validate()?;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        let now = Utc::now();
        let stored = StoredTask {
            id,
            owner_id: task.owner_id.clone(),
            raw_task_type: task_type.as_str().to_string(),
            scheduled_for,
            status: ScheduledTaskStatus::Pending,
            student_id: task.student_id.clone(),
            test_id: task.test_id.clone(),
            metadata: task.metadata.clone(),
            created_at: now,
            updated_at: now,
        };
        let created = stored
            .to_task()
            .ok_or_else(|| SchedulerError::Internal("stored task lost its type".into()))?;
        state.tasks.insert(id, stored);
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> SchedulerResult<Option<ScheduledTask>> {
        let state = self.state.lock().unwrap();
        match state.tasks.get(&id) {
            Some(stored) => stored.to_task().map(Some).ok_or_else(|| {
                SchedulerError::database_error(format!("unknown task type for task {id}"))
            }),
            None => Ok(None),
        }
    }

    async fn find_by_owner(&self, owner_id: &str) -> SchedulerResult<Vec<ScheduledTaskView>> {
        let state = self.state.lock().unwrap();
        let mut views: Vec<ScheduledTaskView> = state
            .tasks
            .values()
            .filter(|t| t.owner_id == owner_id)
            .filter_map(|stored| {
                let task = stored.to_task()?;
                let student = state.student_of(stored).map(|s| StudentSummary {
                    id: s.id.clone(),
                    name: s.name.clone(),
                    email: s.email.clone(),
                });
                let test = state.test_of(stored).map(|t| TestSummary {
                    id: t.id.clone(),
                    title: t.title.clone(),
                    status: t.status.clone(),
                });
                Some(ScheduledTaskView {
                    task,
                    student,
                    test,
                })
            })
            .collect();
        views.sort_by_key(|v| (v.task.scheduled_for, v.task.id));
        Ok(views)
    }

    async fn find_due(&self, now: DateTime<Utc>) -> SchedulerResult<Vec<DueTask>> {
        let state = self.state.lock().unwrap();
        if state.fail_find_due {
            return Err(SchedulerError::database_error("find_due unavailable"));
        }
        let mut due: Vec<DueTask> = state
            .tasks
            .values()
            .filter(|t| {
                (t.status == ScheduledTaskStatus::Pending || state.stale_pending.contains(&t.id))
                    && !state.claimed.contains(&t.id)
                    && t.scheduled_for <= now
            })
            .map(|stored| {
                if let Some(error) = state.unreadable.get(&stored.id) {
                    return DueTask {
                        id: stored.id,
                        owner_id: stored.owner_id.clone(),
                        task_type: TaskType::parse(&stored.raw_task_type),
                        raw_task_type: stored.raw_task_type.clone(),
                        scheduled_for: stored.scheduled_for,
                        student_id: stored.student_id.clone(),
                        test_id: stored.test_id.clone(),
                        metadata: serde_json::Value::Null,
                        student: None,
                        teacher: None,
                        test: None,
                        load_error: Some(error.clone()),
                    };
                }
                let student = state.student_of(stored).cloned();
                let teacher = student
                    .as_ref()
                    .and_then(|_| state.teachers.get(&stored.owner_id).cloned());
                DueTask {
                    id: stored.id,
                    owner_id: stored.owner_id.clone(),
                    task_type: TaskType::parse(&stored.raw_task_type),
                    raw_task_type: stored.raw_task_type.clone(),
                    scheduled_for: stored.scheduled_for,
                    student_id: stored.student_id.clone(),
                    test_id: stored.test_id.clone(),
                    metadata: stored.metadata.clone(),
                    student,
                    teacher,
                    test: state.test_of(stored).cloned(),
                    load_error: None,
                }
            })
            .collect();
        due.sort_by_key(|t| (t.scheduled_for, t.id));
        Ok(due)
    }

    async fn transition_status(
        &self,
        id: i64,
        new_status: ScheduledTaskStatus,
    ) -> SchedulerResult<TransitionOutcome> {
        if !new_status.is_terminal() {
            return Err(SchedulerError::validation_error(
                "transition target must be terminal",
            ));
        }
        let mut state = self.state.lock().unwrap();
        if state.fail_transitions {
            return Err(SchedulerError::database_error("status write unavailable"));
        }
        let outcome = match state.tasks.get_mut(&id) {
            Some(task) if task.status == ScheduledTaskStatus::Pending => {
                task.status = new_status;
                task.updated_at = Utc::now();
                TransitionOutcome::Applied
            }
            _ => TransitionOutcome::Skipped,
        };
        state.transitions.push((id, new_status, outcome));
        Ok(outcome)
    }

    async fn claim(&self, id: i64, _claimed_at: DateTime<Utc>) -> SchedulerResult<TransitionOutcome> {
        let mut state = self.state.lock().unwrap();
        let pending = state
            .tasks
            .get(&id)
            .is_some_and(|t| t.status == ScheduledTaskStatus::Pending);
        if pending && state.claimed.insert(id) {
            Ok(TransitionOutcome::Applied)
        } else {
            Ok(TransitionOutcome::Skipped)
        }
    }

    async fn delete_if_pending(&self, id: i64, owner_id: &str) -> SchedulerResult<bool> {
        let mut state = self.state.lock().unwrap();
        let removable = !state.claimed.contains(&id)
            && state
                .tasks
                .get(&id)
                .map(|t| t.owner_id == owner_id && t.status == ScheduledTaskStatus::Pending)
                .unwrap_or(false);
        if removable {
            state.tasks.remove(&id);
        }
        Ok(removable)
    }
}

#[async_trait]
impl StudentRepository for InMemoryLessonStore {
    async fn with_lesson_topic(&self) -> SchedulerResult<Vec<LessonTopicRecipient>> {
        let state = self.state.lock().unwrap();
        let mut recipients: Vec<LessonTopicRecipient> = state
            .students
            .values()
            .filter(|(_, s)| s.lesson_topic().is_some())
            .filter_map(|(owner, s)| {
                state.teachers.get(owner).map(|teacher| LessonTopicRecipient {
                    student: s.clone(),
                    teacher: teacher.clone(),
                })
            })
            .collect();
        recipients.sort_by(|a, b| a.student.id.cmp(&b.student.id));
        Ok(recipients)
    }

    async fn clear_lesson_topic(&self, student_id: &str) -> SchedulerResult<bool> {
        let mut state = self.state.lock().unwrap();
        if state.fail_clear_for.contains(student_id) {
            return Err(SchedulerError::database_error(format!(
                "cannot clear topic of {student_id}"
            )));
        }
        match state.students.get_mut(student_id) {
            Some((_, student)) => {
                student.next_lesson_topic = None;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl TestRepository for InMemoryLessonStore {
    async fn mark_sent(&self, test_id: &str, sent_at: DateTime<Utc>) -> SchedulerResult<bool> {
        let mut state = self.state.lock().unwrap();
        if state.fail_mark_sent {
            return Err(SchedulerError::database_error("mark_sent unavailable"));
        }
        match state.tests.get_mut(test_id) {
            Some((_, test)) => {
                test.status = "sent".to_string();
                test.sent_at = Some(sent_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// A mail accepted by [`RecordingMailDispatcher`]
#[derive(Debug, Clone)]
pub struct SentMail {
    pub mail: OutboundMail,
    /// Attachment contents read at send time
    pub attachment_bytes: Option<Vec<u8>>,
}

#[derive(Default)]
struct MailState {
    sent: Vec<SentMail>,
    attempts: usize,
    fail_all: bool,
    fail_recipients: HashSet<String>,
    delay: Option<Duration>,
}

#[derive(Clone, Default)]
pub struct RecordingMailDispatcher {
    state: Arc<Mutex<MailState>>,
}

impl RecordingMailDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let mailer = Self::default();
        mailer.set_failing(true);
        mailer
    }

    pub fn set_failing(&self, fail: bool) {
        self.state.lock().unwrap().fail_all = fail;
    }

    pub fn fail_for(&self, recipient: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_recipients
            .insert(recipient.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn sent_count(&self) -> usize {
        self.state.lock().unwrap().sent.len()
    }

    pub fn attempts(&self) -> usize {
        self.state.lock().unwrap().attempts
    }
}

#[async_trait]
impl MailDispatcher for RecordingMailDispatcher {
    async fn send(&self, mail: &OutboundMail) -> SchedulerResult<()> {
        let (fail, delay) = {
            let mut state = self.state.lock().unwrap();
            state.attempts += 1;
            (
                state.fail_all || state.fail_recipients.contains(&mail.to),
                state.delay,
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(SchedulerError::mail_error(format!(
                "mock relay rejected {}",
                mail.to
            )));
        }
        let attachment_bytes = mail
            .attachment
            .as_ref()
            .and_then(|a| std::fs::read(&a.path).ok());
        self.state.lock().unwrap().sent.push(SentMail {
            mail: mail.clone(),
            attachment_bytes,
        });
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Succeed,
    Fail,
    Hang,
}

/// Document renderer whose behaviour is chosen per test
pub struct MockDocumentRenderer {
    mode: Mutex<RenderMode>,
    calls: AtomicUsize,
    produced: Mutex<Vec<PathBuf>>,
}

impl MockDocumentRenderer {
    pub fn new(mode: RenderMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            calls: AtomicUsize::new(0),
            produced: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(RenderMode::Succeed)
    }

    pub fn failing() -> Self {
        Self::new(RenderMode::Fail)
    }

    pub fn hanging() -> Self {
        Self::new(RenderMode::Hang)
    }

    pub fn set_mode(&self, mode: RenderMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Paths of every document handed out so far
    pub fn produced_paths(&self) -> Vec<PathBuf> {
        self.produced.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentRenderer for MockDocumentRenderer {
    async fn render(
        &self,
        content: &str,
        options: &RenderOptions,
    ) -> SchedulerResult<RenderedDocument> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mode = *self.mode.lock().unwrap();
        match mode {
            RenderMode::Succeed => {
                let path = tempfile::Builder::new()
                    .prefix("mock-doc-")
                    .suffix(".pdf")
                    .tempfile()
                    .map_err(|e| SchedulerError::render_error(e.to_string()))?
                    .into_temp_path();
                std::fs::write(&path, format!("%PDF-mock {content}"))
                    .map_err(|e| SchedulerError::render_error(e.to_string()))?;
                self.produced.lock().unwrap().push(path.to_path_buf());
                Ok(RenderedDocument::new(path, options.file_name.clone()))
            }
            RenderMode::Fail => Err(SchedulerError::render_error("mock renderer failure")),
            RenderMode::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(SchedulerError::render_error("mock renderer woke up"))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObservedEvent {
    SweepStarted(usize),
    SweepFinished(SweepReport),
    SweepAborted(String),
    TaskCompleted(i64),
    TaskFailed { task_id: i64, kind: &'static str },
    TaskSkipped(i64),
    ClaimLost(i64),
    StatusWriteFailed {
        task_id: i64,
        attempted: ScheduledTaskStatus,
    },
    RenderDegraded(Option<i64>),
    FollowUpFailed(i64),
    BatchItemFailed { job: String, item: String },
    BatchFinished { job: String, report: BatchReport },
}

#[derive(Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<ObservedEvent>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ObservedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn failure_kind(&self, task_id: i64) -> Option<&'static str> {
        self.events().into_iter().find_map(|e| match e {
            ObservedEvent::TaskFailed { task_id: id, kind } if id == task_id => Some(kind),
            _ => None,
        })
    }

    pub fn count(&self, predicate: impl Fn(&ObservedEvent) -> bool) -> usize {
        self.events().iter().filter(|e| predicate(e)).count()
    }

    fn push(&self, event: ObservedEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl DeliveryObserver for RecordingObserver {
    fn sweep_started(&self, due: usize) {
        self.push(ObservedEvent::SweepStarted(due));
    }

    fn sweep_finished(&self, report: &SweepReport, _elapsed: Duration) {
        self.push(ObservedEvent::SweepFinished(*report));
    }

    fn sweep_aborted(&self, error: &SchedulerError) {
        self.push(ObservedEvent::SweepAborted(error.to_string()));
    }

    fn task_completed(&self, task: &DueTask, _elapsed: Duration) {
        self.push(ObservedEvent::TaskCompleted(task.id));
    }

    fn task_failed(&self, task: &DueTask, error: &SchedulerError) {
        self.push(ObservedEvent::TaskFailed {
            task_id: task.id,
            kind: error.kind(),
        });
    }

    fn task_skipped(&self, task_id: i64, _attempted: ScheduledTaskStatus) {
        self.push(ObservedEvent::TaskSkipped(task_id));
    }

    fn task_claim_lost(&self, task_id: i64) {
        self.push(ObservedEvent::ClaimLost(task_id));
    }

    fn status_write_failed(
        &self,
        task: &DueTask,
        attempted: ScheduledTaskStatus,
        _error: &SchedulerError,
    ) {
        self.push(ObservedEvent::StatusWriteFailed {
            task_id: task.id,
            attempted,
        });
    }

    fn render_degraded(&self, task_id: Option<i64>, _error: &SchedulerError) {
        self.push(ObservedEvent::RenderDegraded(task_id));
    }

    fn follow_up_failed(&self, task_id: i64, _error: &SchedulerError) {
        self.push(ObservedEvent::FollowUpFailed(task_id));
    }

    fn batch_item_failed(&self, job: &str, item: &str, _error: &SchedulerError) {
        self.push(ObservedEvent::BatchItemFailed {
            job: job.to_string(),
            item: item.to_string(),
        });
    }

    fn batch_finished(&self, job: &str, report: &BatchReport, _elapsed: Duration) {
        self.push(ObservedEvent::BatchFinished {
            job: job.to_string(),
            report: *report,
        });
    }
}
