use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;

use lesson_errors::{SchedulerError, SchedulerResult};

/// CRON表达式解析和调度工具，驱动每周课程主题任务
#[derive(Debug, Clone)]
pub struct CronScheduler {
    schedule: Schedule,
}

impl CronScheduler {
    pub fn new(cron_expr: &str) -> SchedulerResult<Self> {
        let schedule = Schedule::from_str(cron_expr).map_err(|e| SchedulerError::InvalidCron {
            expr: cron_expr.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self { schedule })
    }

    pub fn next_execution_time(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&from).next()
    }

    /// 距离下一次执行的时长，用于驱动循环的休眠
    pub fn time_until_next_execution(&self, now: DateTime<Utc>) -> Option<std::time::Duration> {
        self.next_execution_time(now)
            .and_then(|next| (next - now).to_std().ok())
    }
}
