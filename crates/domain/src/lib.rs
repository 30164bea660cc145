pub mod entities;
pub mod ports;
pub mod repositories;
pub mod sqlx_impls;
pub mod value_objects;

pub use entities::*;
pub use lesson_errors::{SchedulerError, SchedulerResult};
pub use ports::*;
pub use repositories::*;
pub use value_objects::*;
