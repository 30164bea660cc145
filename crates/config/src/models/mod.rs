pub mod api_observability;
pub mod app_config;
pub mod database;
pub mod delivery;
pub mod logging;
pub mod sweeper_jobs;

pub use api_observability::*;
pub use app_config::*;
pub use database::*;
pub use delivery::*;
pub use logging::*;
pub use sweeper_jobs::*;
