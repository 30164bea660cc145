pub mod app;
pub mod shutdown;

pub use app::{AppMode, Application, DeliveryBackends};
pub use shutdown::ShutdownManager;
