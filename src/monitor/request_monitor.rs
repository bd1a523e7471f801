//! # Request Monitor
//!
//! Per-request instrumentation: route and status counters, a bounded rolling
//! list of response times and structured request logging. The aggregates feed
//! the health snapshot and the metrics endpoint.
//!
//! A [`RequestTimer`] dropped before `complete` is called means no response was
//! ever sent (client went away, handler cancelled); it is recorded as a
//! transport error.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::config::RequestMonitorConfig;
use crate::health::alerts::RequestAggregates;
use crate::utils::RingBuffer;

/// Route label shared by every request that matched no route template
pub const UNMATCHED_ROUTE: &str = "<unmatched>";

/// Response-time distribution buckets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseTimeDistribution {
    pub under_100ms: u64,
    pub from_100_to_500ms: u64,
    pub from_500_to_1000ms: u64,
    pub from_1_to_5s: u64,
    pub over_5s: u64,
}

impl ResponseTimeDistribution {
    fn add(&mut self, ms: f64) {
        if ms < 100.0 {
            self.under_100ms += 1;
        } else if ms < 500.0 {
            self.from_100_to_500ms += 1;
        } else if ms < 1_000.0 {
            self.from_500_to_1000ms += 1;
        } else if ms < 5_000.0 {
            self.from_1_to_5s += 1;
        } else {
            self.over_5s += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteMetrics {
    pub route: String,
    pub count: u64,
    pub average_ms: f64,
    pub errors: u64,
}

/// Aggregates served by the metrics endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMetrics {
    pub total_requests: u64,
    pub completed_requests: u64,
    pub error_count: u64,
    pub transport_errors: u64,
    pub error_rate_percent: f64,
    pub average_response_time_ms: f64,
    pub response_time_distribution: ResponseTimeDistribution,
    pub status_counters: HashMap<u16, u64>,
    pub routes: Vec<RouteMetrics>,
}

#[derive(Debug, Default)]
struct RouteCounters {
    count: u64,
    completed: u64,
    total_ms: f64,
    errors: u64,
}

#[derive(Debug)]
pub struct RequestMonitor {
    routes: DashMap<String, RouteCounters>,
    status_counters: DashMap<u16, u64>,
    response_times: Mutex<RingBuffer<f64>>,
    total_requests: AtomicU64,
    completed_requests: AtomicU64,
    error_count: AtomicU64,
    transport_errors: AtomicU64,
    slow_request_ms: u64,
    production: bool,
}

impl RequestMonitor {
    pub fn new(config: &RequestMonitorConfig, production: bool) -> Self {
        Self {
            routes: DashMap::new(),
            status_counters: DashMap::new(),
            response_times: Mutex::new(RingBuffer::new(config.response_time_capacity)),
            total_requests: AtomicU64::new(0),
            completed_requests: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            slow_request_ms: config.slow_request_ms,
            production,
        }
    }

    /// Count the request against its route template and start its timer.
    ///
    /// `route` is the matched template (`/api/events/:id`), never the raw
    /// path, so the counter map is bounded by the router's route table.
    /// Requests without a match share [`UNMATCHED_ROUTE`].
    pub fn begin(
        self: &Arc<Self>,
        request_id: impl Into<String>,
        method: &str,
        route: Option<&str>,
    ) -> RequestTimer {
        let route = format!("{method} {}", route.unwrap_or(UNMATCHED_ROUTE));
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.routes.entry(route.clone()).or_default().count += 1;

        RequestTimer {
            monitor: Arc::clone(self),
            request_id: request_id.into(),
            route,
            started: Instant::now(),
            finished: false,
        }
    }

    fn finish(&self, timer: &RequestTimer, status: u16) {
        let elapsed_ms = timer.started.elapsed().as_secs_f64() * 1_000.0;
        let is_error = status >= 400;

        self.response_times.lock().push(elapsed_ms);
        *self.status_counters.entry(status).or_default() += 1;
        self.completed_requests.fetch_add(1, Ordering::Relaxed);
        if is_error {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(mut route) = self.routes.get_mut(&timer.route) {
            route.completed += 1;
            route.total_ms += elapsed_ms;
            if is_error {
                route.errors += 1;
            }
        }

        let slow = elapsed_ms > self.slow_request_ms as f64;
        if !self.production {
            info!(
                request_id = %timer.request_id,
                route = %timer.route,
                status = status,
                duration_ms = elapsed_ms,
                "Request completed"
            );
        } else if status >= 500 {
            error!(
                request_id = %timer.request_id,
                route = %timer.route,
                status = status,
                duration_ms = elapsed_ms,
                "Request failed"
            );
        } else if is_error || slow {
            warn!(
                request_id = %timer.request_id,
                route = %timer.route,
                status = status,
                duration_ms = elapsed_ms,
                slow = slow,
                "Request completed with error or slow response"
            );
        }
    }

    fn record_transport_error(&self, timer: &RequestTimer) {
        let elapsed_ms = timer.started.elapsed().as_secs_f64() * 1_000.0;
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
        self.error_count.fetch_add(1, Ordering::Relaxed);
        if let Some(mut route) = self.routes.get_mut(&timer.route) {
            route.errors += 1;
        }
        error!(
            request_id = %timer.request_id,
            route = %timer.route,
            duration_ms = elapsed_ms,
            "Request ended without a response"
        );
    }

    // =========================================================================
    // Aggregates
    // =========================================================================

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Mean over the rolling response time list
    pub fn average_response_time_ms(&self) -> f64 {
        let times = self.response_times.lock();
        if times.is_empty() {
            return 0.0;
        }
        times.iter().sum::<f64>() / times.len() as f64
    }

    /// Errors (status >= 400 or transport) as a percentage of all requests
    pub fn error_rate_percent(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 0.0;
        }
        self.error_count.load(Ordering::Relaxed) as f64 / total as f64 * 100.0
    }

    pub fn aggregates(&self) -> RequestAggregates {
        RequestAggregates {
            total_requests: self.total_requests(),
            error_rate_percent: self.error_rate_percent(),
        }
    }

    pub fn request_counters(&self) -> HashMap<String, u64> {
        self.routes
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().count))
            .collect()
    }

    pub fn status_counters(&self) -> HashMap<u16, u64> {
        self.status_counters
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }

    pub fn response_time_distribution(&self) -> ResponseTimeDistribution {
        let mut distribution = ResponseTimeDistribution::default();
        for ms in self.response_times.lock().iter() {
            distribution.add(*ms);
        }
        distribution
    }

    /// Busiest routes first
    pub fn route_breakdown(&self) -> Vec<RouteMetrics> {
        let mut routes: Vec<RouteMetrics> = self
            .routes
            .iter()
            .map(|entry| {
                let counters = entry.value();
                RouteMetrics {
                    route: entry.key().clone(),
                    count: counters.count,
                    average_ms: if counters.completed == 0 {
                        0.0
                    } else {
                        counters.total_ms / counters.completed as f64
                    },
                    errors: counters.errors,
                }
            })
            .collect();
        routes.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.route.cmp(&b.route)));
        routes
    }

    pub fn metrics(&self) -> RequestMetrics {
        RequestMetrics {
            total_requests: self.total_requests(),
            completed_requests: self.completed_requests.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            error_rate_percent: self.error_rate_percent(),
            average_response_time_ms: self.average_response_time_ms(),
            response_time_distribution: self.response_time_distribution(),
            status_counters: self.status_counters(),
            routes: self.route_breakdown(),
        }
    }
}

/// Live timer for one in-flight request
#[derive(Debug)]
pub struct RequestTimer {
    monitor: Arc<RequestMonitor>,
    request_id: String,
    route: String,
    started: Instant,
    finished: bool,
}

impl RequestTimer {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Record the response status
    pub fn complete(mut self, status: u16) {
        self.finished = true;
        self.monitor.finish(&self, status);
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        if !self.finished {
            let monitor = Arc::clone(&self.monitor);
            monitor.record_transport_error(self);
        }
    }
}
