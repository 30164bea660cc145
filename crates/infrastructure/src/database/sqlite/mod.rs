pub mod read_model_repository;
pub mod scheduled_task_repository;

pub use read_model_repository::{SqliteStudentRepository, SqliteTestRepository};
pub use scheduled_task_repository::SqliteScheduledTaskRepository;
