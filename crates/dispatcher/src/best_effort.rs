//! 尽力而为的执行辅助
//!
//! 可选的增强步骤（文档渲染）失败时被吸收，批量任务中单项失败不影响其余项。

use std::future::Future;
use std::time::Instant;

use lesson_domain::ports::DeliveryObserver;
use lesson_domain::value_objects::BatchReport;
use lesson_errors::SchedulerResult;

/// 执行可选的增强步骤，失败时上报观察者并返回 None
pub async fn absorb_enrichment<T, F>(
    observer: &dyn DeliveryObserver,
    task_id: Option<i64>,
    enrichment: F,
) -> Option<T>
where
    F: Future<Output = SchedulerResult<T>>,
{
    match enrichment.await {
        Ok(value) => Some(value),
        Err(e) => {
            observer.render_degraded(task_id, &e);
            None
        }
    }
}

/// 按顺序对每一项执行操作，记录失败并继续
pub async fn run_best_effort<I, L, F, Fut>(
    job: &str,
    items: Vec<I>,
    label: L,
    observer: &dyn DeliveryObserver,
    mut operation: F,
) -> BatchReport
where
    L: Fn(&I) -> String,
    F: FnMut(I) -> Fut,
    Fut: Future<Output = SchedulerResult<()>>,
{
    let started = Instant::now();
    let mut report = BatchReport::default();

    for item in items {
        let item_label = label(&item);
        match operation(item).await {
            Ok(()) => report.succeeded += 1,
            Err(e) => {
                observer.batch_item_failed(job, &item_label, &e);
                report.failed += 1;
            }
        }
    }

    observer.batch_finished(job, &report, started.elapsed());
    report
}
