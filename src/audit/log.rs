//! # Audit Log
//!
//! Append-only security event recorder. Every event is scored, cached in a
//! bounded in-memory ring and appended to the durable JSON-lines file, which is
//! the only source of truth; the ring is lost on restart.

use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::detectors;
use super::risk::{calculate_risk_level, RiskFactors};
use super::sink::AuditFileSink;
use super::types::{
    AuditEvent, AuditFilter, AuditLevel, AuditStats, IpCount, NewAuditEvent, RiskLevel,
};
use crate::config::AuditConfig;
use crate::constants::audit::{RECENT_CRITICAL_LIMIT, RISK_FAILURE_WINDOW_MINUTES, TOP_IP_LIMIT};
use crate::error::{VigilError, VigilResult};
use crate::logging::log_audit_write_failure;
use crate::utils::RingBuffer;

const DEFAULT_QUERY_LIMIT: usize = 100;

#[derive(Debug)]
pub struct AuditLog {
    events: Mutex<RingBuffer<AuditEvent>>,
    sink: Option<AuditFileSink>,
    write_failures: AtomicU64,
}

impl AuditLog {
    pub fn new(config: &AuditConfig) -> Self {
        Self {
            events: Mutex::new(RingBuffer::new(config.capacity)),
            sink: Some(AuditFileSink::new(
                config.log_path.clone(),
                config.max_file_bytes,
            )),
            write_failures: AtomicU64::new(0),
        }
    }

    /// Ring-only log with no durable file
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            events: Mutex::new(RingBuffer::new(capacity)),
            sink: None,
            write_failures: AtomicU64::new(0),
        }
    }

    /// Record an event, then run the pattern detectors over it.
    ///
    /// Events emitted by detectors are recorded but not analyzed again.
    pub fn log_event(&self, input: NewAuditEvent) -> AuditEvent {
        let event = self.record(input);

        let derived =
            detectors::analyze_event(&event, |ip, minutes| self.get_recent_failures(ip, minutes));
        for secondary in derived {
            let recorded = self.record(secondary);
            warn!(
                action = %recorded.action,
                related_event_id = ?recorded.related_event_id,
                ip = ?recorded.ip,
                risk_level = ?recorded.risk_level,
                "🛡️ Security detector triggered"
            );
        }

        event
    }

    fn record(&self, input: NewAuditEvent) -> AuditEvent {
        let event = {
            let mut ring = self.events.lock();
            let recent_login_failures = match input.ip.as_deref() {
                Some(ip) => count_failures(&ring, ip, RISK_FAILURE_WINDOW_MINUTES),
                None => 0,
            };
            let risk_level = calculate_risk_level(&RiskFactors {
                status_code: input.status_code,
                action: &input.action,
                category: input.category,
                user_agent: input.user_agent.as_deref(),
                recent_login_failures,
            });

            let event = AuditEvent {
                id: input.id.unwrap_or_else(Uuid::new_v4),
                timestamp: input.timestamp.unwrap_or_else(Utc::now),
                level: input.level,
                category: input.category,
                action: input.action,
                actor_id: input.actor_id,
                ip: input.ip,
                user_agent: input.user_agent,
                path: input.path,
                method: input.method,
                status_code: input.status_code,
                details: input.details,
                risk_level,
                related_event_id: input.related_event_id,
            };
            ring.push(event.clone());
            event
        };

        self.persist(&event);
        debug!(
            event_id = %event.id,
            action = %event.action,
            risk_level = ?event.risk_level,
            "Audit event recorded"
        );
        event
    }

    /// Durable append. Failures are logged and counted, never propagated.
    fn persist(&self, event: &AuditEvent) {
        let Some(sink) = &self.sink else {
            return;
        };
        let result = serde_json::to_string(event)
            .map_err(std::io::Error::from)
            .and_then(|line| sink.append_line(&line));
        if let Err(e) = result {
            self.write_failures.fetch_add(1, Ordering::Relaxed);
            log_audit_write_failure(sink.path(), &e);
        }
    }

    /// Login failures from `ip` in the trailing `minutes`, from the ring only
    pub fn get_recent_failures(&self, ip: &str, minutes: i64) -> usize {
        count_failures(&self.events.lock(), ip, minutes)
    }

    /// Newest first, at most `filter.limit` (default 100)
    pub fn get_events(&self, filter: &AuditFilter) -> Vec<AuditEvent> {
        let limit = filter.limit.unwrap_or(DEFAULT_QUERY_LIMIT);
        self.events
            .lock()
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn get_audit_stats(&self) -> AuditStats {
        let ring = self.events.lock();
        let mut stats = AuditStats {
            total: ring.len() as u64,
            ..AuditStats::default()
        };
        let mut ip_counts: HashMap<&str, u64> = HashMap::new();

        for event in ring.iter() {
            *stats.by_level.entry(event.level).or_default() += 1;
            *stats.by_category.entry(event.category).or_default() += 1;
            *stats.by_risk.entry(event.risk_level).or_default() += 1;
            if let Some(ip) = event.ip.as_deref() {
                *ip_counts.entry(ip).or_default() += 1;
            }
        }

        let mut top: Vec<IpCount> = ip_counts
            .into_iter()
            .map(|(ip, count)| IpCount {
                ip: ip.to_string(),
                count,
            })
            .collect();
        top.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.ip.cmp(&b.ip)));
        top.truncate(TOP_IP_LIMIT);
        stats.top_ips = top;

        stats.recent_critical = ring
            .iter()
            .rev()
            .filter(|e| e.level == AuditLevel::Critical || e.risk_level >= RiskLevel::High)
            .take(RECENT_CRITICAL_LIMIT)
            .cloned()
            .collect();

        stats
    }

    /// Rotate the durable file if it exceeds the size limit
    pub fn rotate_if_needed(&self) -> VigilResult<Option<PathBuf>> {
        match &self.sink {
            Some(sink) => sink.rotate_if_needed().map_err(|e| {
                error!(path = %sink.path().display(), error = %e, "Audit log rotation failed");
                VigilError::from(e)
            }),
            None => Ok(None),
        }
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }
}

fn count_failures(ring: &RingBuffer<AuditEvent>, ip: &str, minutes: i64) -> usize {
    let cutoff = Utc::now() - ChronoDuration::minutes(minutes);
    ring.iter()
        .filter(|e| {
            e.action == "login_failed" && e.ip.as_deref() == Some(ip) && e.timestamp >= cutoff
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::types::AuditCategory;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn login_failed(ip: &str) -> NewAuditEvent {
        NewAuditEvent::new(
            AuditLevel::Warning,
            AuditCategory::Authentication,
            "login_failed",
        )
        .ip(ip)
        .status(401)
    }

    #[test]
    fn test_log_event_assigns_id_timestamp_and_risk() {
        let log = AuditLog::in_memory(10);
        let event = log.log_event(
            NewAuditEvent::new(AuditLevel::Info, AuditCategory::DataAccess, "view_event")
                .ip("10.0.0.5")
                .status(200),
        );
        assert_eq!(event.risk_level, RiskLevel::Minimal);
        assert_eq!(log.len(), 1);

        let fixed = Uuid::new_v4();
        let mut input = NewAuditEvent::new(AuditLevel::Info, AuditCategory::System, "boot");
        input.id = Some(fixed);
        assert_eq!(log.log_event(input).id, fixed);
    }

    #[test]
    fn test_ring_evicts_oldest() {
        let log = AuditLog::in_memory(3);
        for i in 0..5 {
            log.log_event(
                NewAuditEvent::new(AuditLevel::Info, AuditCategory::System, format!("a{i}")),
            );
        }
        let actions: Vec<_> = log
            .get_events(&AuditFilter::default())
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(actions, vec!["a4", "a3", "a2"]);
    }

    #[test]
    fn test_recent_failures_respect_window_and_ip() {
        let log = AuditLog::in_memory(100);
        log.log_event(login_failed("1.1.1.1").at(Utc::now() - ChronoDuration::minutes(20)));
        log.log_event(login_failed("1.1.1.1"));
        log.log_event(login_failed("2.2.2.2"));
        assert_eq!(log.get_recent_failures("1.1.1.1", 5), 1);
        assert_eq!(log.get_recent_failures("1.1.1.1", 30), 2);
        assert_eq!(log.get_recent_failures("3.3.3.3", 30), 0);
    }

    #[test]
    fn test_repeated_failures_raise_risk() {
        let log = AuditLog::in_memory(100);
        let risks: Vec<_> = (0..5)
            .map(|_| log.log_event(login_failed("9.9.9.9")).risk_level)
            .collect();
        assert_eq!(risks[0], RiskLevel::High);
        // More than three prior failures inside the window adds the factor
        assert_eq!(risks[4], RiskLevel::Critical);
    }

    #[test]
    fn test_unauthorized_status_emits_secondary_event() {
        let log = AuditLog::in_memory(100);
        let original = log.log_event(
            NewAuditEvent::new(AuditLevel::Warning, AuditCategory::Authorization, "view_admin")
                .status(403),
        );
        let derived = log.get_events(&AuditFilter {
            action: Some("unauthorized_access_attempt".to_string()),
            ..AuditFilter::default()
        });
        assert_eq!(derived.len(), 1);
        assert_eq!(derived[0].related_event_id, Some(original.id));
        // The original is never mutated
        let stored = log.get_events(&AuditFilter {
            action: Some("view_admin".to_string()),
            ..AuditFilter::default()
        });
        assert_eq!(stored[0], original);
    }

    #[test]
    fn test_filters_and_limit() {
        let log = AuditLog::in_memory(100);
        for _ in 0..3 {
            log.log_event(login_failed("4.4.4.4").actor("u1"));
        }
        log.log_event(NewAuditEvent::new(AuditLevel::Info, AuditCategory::System, "tick").actor("u2"));

        let by_actor = log.get_events(&AuditFilter {
            actor_id: Some("u2".to_string()),
            ..AuditFilter::default()
        });
        assert_eq!(by_actor.len(), 1);

        let limited = log.get_events(&AuditFilter {
            ip: Some("4.4.4.4".to_string()),
            action: Some("login_failed".to_string()),
            limit: Some(2),
            ..AuditFilter::default()
        });
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_stats_aggregation() {
        let log = AuditLog::in_memory(100);
        for _ in 0..2 {
            log.log_event(login_failed("5.5.5.5"));
        }
        log.log_event(login_failed("6.6.6.6"));

        let stats = log.get_audit_stats();
        // Three originals plus one unauthorized_access_attempt each
        assert_eq!(stats.total, 6);
        assert_eq!(stats.by_category[&AuditCategory::Authentication], 3);
        assert_eq!(stats.by_category[&AuditCategory::Security], 3);
        assert_eq!(stats.top_ips[0].ip, "5.5.5.5");
        assert_eq!(stats.top_ips[0].count, 4);
        assert!(!stats.recent_critical.is_empty());
    }

    #[test]
    fn test_durable_file_gets_one_json_line_per_event() {
        let dir = TempDir::new().unwrap();
        let config = AuditConfig {
            log_path: dir.path().join("audit.log"),
            capacity: 10,
            max_file_bytes: 1024 * 1024,
        };
        let log = AuditLog::new(&config);
        log.log_event(
            NewAuditEvent::new(AuditLevel::Info, AuditCategory::DataAccess, "export")
                .details(json!({ "rows": 12 })),
        );

        let contents = fs::read_to_string(&config.log_path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 1);
        let parsed: AuditEvent = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.action, "export");
        assert_eq!(parsed.details["rows"], 12);
    }

    #[test]
    fn test_write_failures_are_swallowed() {
        let dir = TempDir::new().unwrap();
        let config = AuditConfig {
            log_path: dir.path().to_path_buf(),
            capacity: 10,
            max_file_bytes: 1024,
        };
        let log = AuditLog::new(&config);
        let event =
            log.log_event(NewAuditEvent::new(AuditLevel::Info, AuditCategory::System, "x"));
        assert_eq!(event.action, "x");
        assert_eq!(log.len(), 1);
        assert_eq!(log.write_failures(), 1);
    }
}
