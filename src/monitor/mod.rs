//! Per-request instrumentation.

pub mod request_monitor;

pub use request_monitor::{
    RequestMetrics, RequestMonitor, RequestTimer, ResponseTimeDistribution, RouteMetrics,
    UNMATCHED_ROUTE,
};
