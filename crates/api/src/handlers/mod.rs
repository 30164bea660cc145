pub mod health;
pub mod metrics;
pub mod scheduled_tasks;
