pub mod delivery_observer;
pub mod metrics_collector;
pub mod structured_logger;

pub use delivery_observer::TracingDeliveryObserver;
pub use metrics_collector::MetricsCollector;
pub use structured_logger::StructuredLogger;
