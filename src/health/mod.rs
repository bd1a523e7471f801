//! # Health Monitoring
//!
//! Cache-first health subsystem. The [`HealthChecker`] is the only writer of
//! the [`SnapshotCache`]; endpoints and the admission gate only read it.

pub mod alerts;
pub mod checker;
pub mod metrics_source;
pub mod probes;
pub mod snapshot_cache;
pub mod types;

pub use alerts::{evaluate_thresholds, AlertHistory, RequestAggregates};
pub use checker::{HealthChecker, MonitoringMetrics};
pub use metrics_source::{MetricsSource, RuntimeMetrics, SysinfoMetricsSource};
pub use probes::{DependencyProbes, HttpSelfProbe, SelfProbe, StoreConnectionState, StoreProbe};
#[cfg(feature = "postgres")]
pub use probes::PgStoreProbe;
pub use snapshot_cache::SnapshotCache;
pub use types::{
    Alert, AlertKind, AlertLevel, AlertThresholds, DependencyKind, DependencyReport,
    DependencyState, HealthStatus, MemoryUsage, Snapshot, ThresholdUpdate,
};
