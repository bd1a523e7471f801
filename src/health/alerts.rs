//! # Alert Evaluation
//!
//! Threshold comparison for each tick and the bounded alert history exposed to
//! operators.

use parking_lot::Mutex;
use std::sync::Arc;

use super::types::{Alert, AlertKind, AlertThresholds, Snapshot};
use crate::utils::RingBuffer;

/// Request aggregates consulted by the error-rate check
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RequestAggregates {
    pub total_requests: u64,
    pub error_rate_percent: f64,
}

/// Compare a snapshot against the thresholds. Each breached metric yields one alert.
///
/// The error rate is only evaluated once at least one request was observed.
pub fn evaluate_thresholds(
    snapshot: &Snapshot,
    thresholds: &AlertThresholds,
    requests: Option<RequestAggregates>,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if snapshot.memory.percent > thresholds.memory_percent {
        alerts.push(Alert::for_breach(
            AlertKind::Memory,
            snapshot.memory.percent,
            thresholds.memory_percent,
        ));
    }
    if snapshot.cpu_percent > thresholds.cpu_percent {
        alerts.push(Alert::for_breach(
            AlertKind::Cpu,
            snapshot.cpu_percent,
            thresholds.cpu_percent,
        ));
    }
    if snapshot.average_response_time_ms > thresholds.response_time_ms {
        alerts.push(Alert::for_breach(
            AlertKind::ResponseTime,
            snapshot.average_response_time_ms,
            thresholds.response_time_ms,
        ));
    }
    if let Some(requests) = requests.filter(|r| r.total_requests > 0) {
        if requests.error_rate_percent > thresholds.error_rate_percent {
            alerts.push(Alert::for_breach(
                AlertKind::ErrorRate,
                requests.error_rate_percent,
                thresholds.error_rate_percent,
            ));
        }
    }

    alerts
}

/// Bounded FIFO of recently raised alerts
#[derive(Debug, Clone)]
pub struct AlertHistory {
    inner: Arc<Mutex<RingBuffer<Alert>>>,
}

impl AlertHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RingBuffer::new(capacity))),
        }
    }

    pub fn record(&self, alert: Alert) {
        self.inner.lock().push(alert);
    }

    /// Newest first
    pub fn recent(&self, limit: usize) -> Vec<Alert> {
        self.inner.lock().recent(limit)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
