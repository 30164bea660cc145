use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use lesson_dispatcher::{DeliveryContext, DueTaskSweeper, HandlerRegistry};
use lesson_domain::entities::{ScheduledTaskStatus, TaskType};
use lesson_domain::repositories::ScheduledTaskRepository;
use lesson_domain::value_objects::SweepReport;
use lesson_errors::SchedulerError;
use lesson_infrastructure::timeout_handler::{TimeoutConfig, TimeoutHandler};
use lesson_testing_utils::{
    new_task, new_test_task, student, student_with_topic, teacher, test_snapshot,
    InMemoryLessonStore, MockDocumentRenderer, ObservedEvent, RecordingMailDispatcher,
    RecordingObserver,
};

struct Harness {
    store: InMemoryLessonStore,
    mailer: RecordingMailDispatcher,
    renderer: Arc<MockDocumentRenderer>,
    observer: RecordingObserver,
    sweeper: DueTaskSweeper,
}

fn harness_with(renderer: MockDocumentRenderer, max_concurrent: usize) -> Harness {
    let store = InMemoryLessonStore::new();
    store.add_teacher(teacher("teacher-1", "Marta"));
    store.add_student("teacher-1", student("student-1", "Ana"));
    store.add_student(
        "teacher-1",
        student_with_topic("student-2", "Bea", "Past tense"),
    );
    store.add_student("teacher-2", student("student-9", "Zoe"));
    store.add_test("student-1", test_snapshot("test-1", "Verbs quiz"));

    let mailer = RecordingMailDispatcher::new();
    let renderer = Arc::new(renderer);
    let observer = RecordingObserver::new();
    let context = DeliveryContext::new(Arc::new(mailer.clone()), Arc::new(observer.clone()))
        .with_renderer(renderer.clone())
        .with_timeouts(TimeoutHandler::new(TimeoutConfig {
            render_timeout: Duration::from_millis(100),
            mail_timeout: Duration::from_millis(100),
        }));
    let sweeper = DueTaskSweeper::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        HandlerRegistry::standard(context),
        Arc::new(observer.clone()),
    )
    .with_max_concurrent(max_concurrent);

    Harness {
        store,
        mailer,
        renderer,
        observer,
        sweeper,
    }
}

fn harness() -> Harness {
    harness_with(MockDocumentRenderer::succeeding(), 1)
}

#[tokio::test]
async fn test_due_test_task_is_delivered_and_marked_sent() {
    let h = harness();
    let task = h
        .store
        .insert(&new_test_task(
            "teacher-1",
            "student-1",
            "test-1",
            Utc::now() - ChronoDuration::seconds(1),
        ))
        .await
        .unwrap();

    let report = h.sweeper.sweep().await.unwrap();

    assert_eq!(
        report,
        SweepReport {
            due: 1,
            completed: 1,
            failed: 0,
            skipped: 0
        }
    );
    assert_eq!(h.store.status_of(task.id), Some(ScheduledTaskStatus::Completed));
    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].mail.to, "student-1@students.example.com");
    let test = h.store.test("test-1").unwrap();
    assert_eq!(test.status, "sent");
    assert!(test.sent_at.is_some());
}

#[tokio::test]
async fn test_failure_is_isolated_within_batch() {
    let h = harness();
    let now = Utc::now();
    // student-9 belongs to another teacher, so this task cannot resolve its student
    let broken = h
        .store
        .insert(&new_task("teacher-1", "student-9", TaskType::LessonTopic, now))
        .await
        .unwrap();
    let fine = h
        .store
        .insert(&new_task("teacher-1", "student-2", TaskType::LessonTopic, now))
        .await
        .unwrap();

    let report = h.sweeper.sweep_once(now).await.unwrap();

    assert_eq!(report.completed, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(h.store.status_of(broken.id), Some(ScheduledTaskStatus::Failed));
    assert_eq!(h.store.status_of(fine.id), Some(ScheduledTaskStatus::Completed));
    assert_eq!(h.observer.failure_kind(broken.id), Some("missing_data"));
}

#[tokio::test]
async fn test_future_task_is_untouched() {
    let h = harness();
    let now = Utc::now();
    let task = h
        .store
        .insert(&new_task(
            "teacher-1",
            "student-2",
            TaskType::LessonTopic,
            now + ChronoDuration::minutes(10),
        ))
        .await
        .unwrap();

    let report = h.sweeper.sweep_once(now).await.unwrap();

    assert_eq!(report, SweepReport::default());
    assert_eq!(h.store.status_of(task.id), Some(ScheduledTaskStatus::Pending));
    assert_eq!(h.mailer.attempts(), 0);
    assert!(h.store.transitions().is_empty());
}

#[tokio::test]
async fn test_task_scheduled_exactly_now_is_due() {
    let h = harness();
    let now = Utc::now();
    let task = h
        .store
        .insert(&new_task("teacher-1", "student-2", TaskType::LessonTopic, now))
        .await
        .unwrap();

    h.sweeper.sweep_once(now).await.unwrap();
    assert_eq!(h.store.status_of(task.id), Some(ScheduledTaskStatus::Completed));
}

#[tokio::test]
async fn test_test_task_without_test_id_fails_without_mail() {
    let h = harness();
    let mut input = new_task("teacher-1", "student-1", TaskType::Test, Utc::now());
    input.test_id = None;
    let task = h.store.insert(&input).await.unwrap();

    h.sweeper.sweep().await.unwrap();

    assert_eq!(h.store.status_of(task.id), Some(ScheduledTaskStatus::Failed));
    assert_eq!(h.observer.failure_kind(task.id), Some("missing_data"));
    assert_eq!(h.mailer.attempts(), 0);
    assert_eq!(h.renderer.calls(), 0);
}

#[tokio::test]
async fn test_foreign_test_is_treated_as_missing() {
    let h = harness();
    h.store.add_student("teacher-1", student("student-3", "Cleo"));
    let task = h
        .store
        .insert(&new_test_task("teacher-1", "student-3", "test-1", Utc::now()))
        .await
        .unwrap();

    h.sweeper.sweep().await.unwrap();

    assert_eq!(h.store.status_of(task.id), Some(ScheduledTaskStatus::Failed));
    assert_eq!(h.mailer.attempts(), 0);
}

#[tokio::test]
async fn test_empty_lesson_topic_fails_without_mail() {
    let h = harness();
    let task = h
        .store
        .insert(&new_task("teacher-1", "student-1", TaskType::LessonTopic, Utc::now()))
        .await
        .unwrap();

    h.sweeper.sweep().await.unwrap();

    assert_eq!(h.store.status_of(task.id), Some(ScheduledTaskStatus::Failed));
    assert_eq!(h.observer.failure_kind(task.id), Some("missing_data"));
    assert_eq!(h.mailer.attempts(), 0);
}

#[tokio::test]
async fn test_render_failure_still_completes() {
    let h = harness_with(MockDocumentRenderer::failing(), 1);
    let task = h
        .store
        .insert(&new_test_task("teacher-1", "student-1", "test-1", Utc::now()))
        .await
        .unwrap();

    h.sweeper.sweep().await.unwrap();

    assert_eq!(h.store.status_of(task.id), Some(ScheduledTaskStatus::Completed));
    assert!(h.mailer.sent()[0].mail.attachment.is_none());
    assert!(h
        .observer
        .events()
        .contains(&ObservedEvent::RenderDegraded(Some(task.id))));
}

#[tokio::test]
async fn test_mail_failure_fails_task_without_side_effect() {
    let h = harness();
    h.mailer.set_failing(true);
    let task = h
        .store
        .insert(&new_test_task("teacher-1", "student-1", "test-1", Utc::now()))
        .await
        .unwrap();

    h.sweeper.sweep().await.unwrap();

    assert_eq!(h.store.status_of(task.id), Some(ScheduledTaskStatus::Failed));
    assert_eq!(h.observer.failure_kind(task.id), Some("mail_dispatch"));
    let test = h.store.test("test-1").unwrap();
    assert_eq!(test.status, "draft");
    assert!(test.sent_at.is_none());
    for path in h.renderer.produced_paths() {
        assert!(!path.exists());
    }
}

#[tokio::test]
async fn test_mail_timeout_fails_task() {
    let h = harness();
    h.mailer.set_delay(Duration::from_secs(5));
    let task = h
        .store
        .insert(&new_task("teacher-1", "student-2", TaskType::LessonTopic, Utc::now()))
        .await
        .unwrap();

    h.sweeper.sweep().await.unwrap();

    assert_eq!(h.store.status_of(task.id), Some(ScheduledTaskStatus::Failed));
    assert_eq!(h.observer.failure_kind(task.id), Some("timeout"));
}

#[tokio::test]
async fn test_unknown_type_fails_without_handler() {
    let h = harness();
    let id = h
        .store
        .insert_raw("teacher-1", "HOMEWORK", Utc::now(), "student-1", None);

    let report = h.sweeper.sweep().await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(h.store.status_of(id), Some(ScheduledTaskStatus::Failed));
    assert_eq!(h.observer.failure_kind(id), Some("validation"));
    assert_eq!(h.mailer.attempts(), 0);
}

#[tokio::test]
async fn test_task_taken_by_another_sweep_is_skipped() {
    let h = harness();
    let task = h
        .store
        .insert(&new_test_task("teacher-1", "student-1", "test-1", Utc::now()))
        .await
        .unwrap();
    h.store
        .simulate_concurrent_transition(task.id, ScheduledTaskStatus::Completed);

    let report = h.sweeper.sweep().await.unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(report.completed, 0);
    assert_eq!(h.mailer.attempts(), 0);
    // 另一次扫描已负责后续写入
    assert_eq!(h.store.test("test-1").unwrap().status, "draft");
    assert!(h
        .observer
        .events()
        .contains(&ObservedEvent::ClaimLost(task.id)));
}

#[tokio::test]
async fn test_overlapping_sweeps_claim_each_task_once() {
    let h = harness();
    h.mailer.set_delay(Duration::from_millis(200));
    let task = h
        .store
        .insert(&new_test_task("teacher-1", "student-1", "test-1", Utc::now()))
        .await
        .unwrap();

    let now = Utc::now();
    let (first, second) = tokio::join!(h.sweeper.sweep_once(now), h.sweeper.sweep_once(now));
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_eq!(h.mailer.attempts(), 1);
    assert_eq!(first.completed + second.completed, 1);
    assert_eq!(h.store.status_of(task.id), Some(ScheduledTaskStatus::Completed));
}

#[tokio::test]
async fn test_unreadable_task_fails_and_batch_continues() {
    let h = harness();
    let now = Utc::now();
    let broken = h
        .store
        .insert(&new_task(
            "teacher-1",
            "student-2",
            TaskType::LessonTopic,
            now - ChronoDuration::seconds(2),
        ))
        .await
        .unwrap();
    let fine = h
        .store
        .insert(&new_task(
            "teacher-1",
            "student-2",
            TaskType::LessonTopic,
            now - ChronoDuration::seconds(1),
        ))
        .await
        .unwrap();
    h.store.mark_unreadable(broken.id, "metadata is not valid JSON");

    let report = h.sweeper.sweep_once(now).await.unwrap();

    assert_eq!((report.completed, report.failed), (1, 1));
    assert_eq!(h.store.status_of(broken.id), Some(ScheduledTaskStatus::Failed));
    assert_eq!(h.store.status_of(fine.id), Some(ScheduledTaskStatus::Completed));
    assert_eq!(h.observer.failure_kind(broken.id), Some("serialization"));
    assert_eq!(h.mailer.sent_count(), 1);
}

#[tokio::test]
async fn test_status_write_failure_is_reported_and_not_resent() {
    let h = harness();
    let task = h
        .store
        .insert(&new_task(
            "teacher-1",
            "student-2",
            TaskType::LessonTopic,
            Utc::now(),
        ))
        .await
        .unwrap();
    h.store.set_transition_error(true);

    let report = h.sweeper.sweep().await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(h.mailer.sent_count(), 1);
    assert!(h.observer.events().contains(&ObservedEvent::StatusWriteFailed {
        task_id: task.id,
        attempted: ScheduledTaskStatus::Completed,
    }));
    assert_eq!(h.observer.failure_kind(task.id), None);

    // 任务保持占用：状态仍为 PENDING，但后续扫描不会重发
    h.store.set_transition_error(false);
    let next = h.sweeper.sweep().await.unwrap();
    assert_eq!(next.due, 0);
    assert_eq!(h.mailer.sent_count(), 1);
    assert!(h.store.is_claimed(task.id));
    assert_eq!(h.store.status_of(task.id), Some(ScheduledTaskStatus::Pending));
}

#[tokio::test]
async fn test_second_sweep_does_not_resend() {
    let h = harness();
    h.store
        .insert(&new_test_task("teacher-1", "student-1", "test-1", Utc::now()))
        .await
        .unwrap();

    h.sweeper.sweep().await.unwrap();
    let second = h.sweeper.sweep().await.unwrap();

    assert_eq!(second.due, 0);
    assert_eq!(h.mailer.sent_count(), 1);
}

#[tokio::test]
async fn test_follow_up_failure_keeps_task_completed() {
    let h = harness();
    h.store.set_mark_sent_error(true);
    let task = h
        .store
        .insert(&new_test_task("teacher-1", "student-1", "test-1", Utc::now()))
        .await
        .unwrap();

    let report = h.sweeper.sweep().await.unwrap();

    assert_eq!(report.completed, 1);
    assert_eq!(h.store.status_of(task.id), Some(ScheduledTaskStatus::Completed));
    assert!(h
        .observer
        .events()
        .contains(&ObservedEvent::FollowUpFailed(task.id)));
}

#[tokio::test]
async fn test_find_due_error_aborts_sweep() {
    let h = harness();
    h.store.set_find_due_error(true);

    let err = h.sweeper.sweep().await.unwrap_err();
    assert!(matches!(err, SchedulerError::DatabaseOperation(_)));
    assert_eq!(
        h.observer
            .count(|e| matches!(e, ObservedEvent::SweepAborted(_))),
        1
    );

    h.store.set_find_due_error(false);
    assert!(h.sweeper.sweep().await.is_ok());
}

#[tokio::test]
async fn test_bounded_concurrency_keeps_order_and_outcomes() {
    let h = harness_with(MockDocumentRenderer::succeeding(), 4);
    let now = Utc::now();
    let mut ids = Vec::new();
    for offset in 0..6 {
        let task = h
            .store
            .insert(&new_task(
                "teacher-1",
                "student-2",
                TaskType::LessonTopic,
                now - ChronoDuration::seconds(10 - offset),
            ))
            .await
            .unwrap();
        ids.push(task.id);
    }

    let report = h.sweeper.sweep_once(now).await.unwrap();

    assert_eq!(report.completed, 6);
    let completed: Vec<i64> = h
        .observer
        .events()
        .into_iter()
        .filter_map(|e| match e {
            ObservedEvent::TaskCompleted(id) => Some(id),
            _ => None,
        })
        .collect();
    let mut sorted = completed.clone();
    sorted.sort();
    assert_eq!(sorted, ids);
}
