//! 计划任务的调度与投递
//!
//! 控制器负责同步的创建/列出/取消，扫描器周期性地把到期任务交给投递处理器，
//! 每周任务复用同一套投递和尽力而为的批处理逻辑。

pub mod best_effort;
pub mod controller;
pub mod cron_utils;
pub mod handlers;
pub mod jobs;
pub mod sweeper;

pub use controller::{ScheduleTaskInput, ScheduledTaskController};
pub use cron_utils::CronScheduler;
pub use handlers::{
    DeliveryContext, DeliveryHandler, DeliveryReceipt, FollowUp, HandlerRegistry,
    LessonTopicDeliveryHandler, TestDeliveryHandler,
};
pub use jobs::{BatchJob, LessonTopicBroadcastJob, LessonTopicClearingJob};
pub use sweeper::{DueTaskSweeper, TaskOutcome};
