pub mod database;
pub mod error_handling;
pub mod mail;
pub mod observability;
pub mod rendering;
pub mod timeout_handler;

pub use database::*;
pub use mail::SmtpMailDispatcher;
pub use observability::*;
pub use rendering::HttpDocumentRenderer;
pub use timeout_handler::TimeoutHandler;
