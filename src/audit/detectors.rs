//! # Pattern Detectors
//!
//! Three independent detectors run against every logged event. A detector never
//! mutates the triggering event; it may only emit a new event that references
//! it through `related_event_id`.

use regex::Regex;
use serde_json::json;
use std::sync::LazyLock;

use super::types::{AuditCategory, AuditEvent, AuditLevel, NewAuditEvent, RiskLevel};
use crate::constants::audit::{BRUTE_FORCE_THRESHOLD, BRUTE_FORCE_WINDOW_MINUTES};

/// A compiled dangerous-content pattern
pub struct SuspiciousPattern {
    pub label: &'static str,
    pub risk: RiskLevel,
    regex: Option<Regex>,
}

impl SuspiciousPattern {
    fn new(label: &'static str, risk: RiskLevel, regex_str: &str) -> Self {
        Self {
            label,
            risk,
            regex: Regex::new(regex_str).ok(),
        }
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex
            .as_ref()
            .is_some_and(|regex| regex.is_match(haystack))
    }
}

pub static SUSPICIOUS_PATTERNS: LazyLock<Vec<SuspiciousPattern>> = LazyLock::new(|| {
    vec![
        SuspiciousPattern::new(
            "path_traversal",
            RiskLevel::High,
            r"(?i)(?:\.\./|\.\.\\|%2e%2e%2f)",
        ),
        SuspiciousPattern::new("script_injection", RiskLevel::High, r"(?i)<\s*script\b"),
        SuspiciousPattern::new("script_injection", RiskLevel::Medium, r"(?i)javascript\s*:"),
        SuspiciousPattern::new(
            "script_injection",
            RiskLevel::Medium,
            r"(?i)\bon(?:error|load|click)\s*=",
        ),
        SuspiciousPattern::new(
            "sql_injection",
            RiskLevel::Critical,
            r"(?i)\b(?:union\s+(?:all\s+)?select|drop\s+table|insert\s+into|delete\s+from|truncate\s+table)\b",
        ),
        SuspiciousPattern::new(
            "sql_injection",
            RiskLevel::High,
            r"(?i)'\s*or\s+'?1'?\s*=\s*'?1",
        ),
    ]
});

/// First dangerous pattern found in the event details
pub fn match_suspicious(details: &serde_json::Value) -> Option<&'static SuspiciousPattern> {
    if details.is_null() {
        return None;
    }
    let haystack = match details {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    SUSPICIOUS_PATTERNS.iter().find(|p| p.is_match(&haystack))
}

pub fn detect_suspicious_pattern(event: &AuditEvent) -> Option<NewAuditEvent> {
    let pattern = match_suspicious(&event.details)?;
    Some(
        NewAuditEvent::new(
            AuditLevel::Warning,
            AuditCategory::Security,
            "suspicious_pattern_detected",
        )
        .context_from(event)
        .details(json!({
            "pattern": pattern.label,
            "risk": pattern.risk,
            "original_event_id": event.id,
            "original_action": event.action,
        })),
    )
}

/// `recent_failures` counts login failures from the event's ip inside the
/// brute-force window, including the event itself
pub fn detect_brute_force(event: &AuditEvent, recent_failures: usize) -> Option<NewAuditEvent> {
    if event.action != "login_failed" || recent_failures < BRUTE_FORCE_THRESHOLD {
        return None;
    }
    Some(
        NewAuditEvent::new(
            AuditLevel::Critical,
            AuditCategory::Security,
            "brute_force_attack_detected",
        )
        .context_from(event)
        .details(json!({
            "failed_attempts": recent_failures,
            "window_minutes": BRUTE_FORCE_WINDOW_MINUTES,
            "original_event_id": event.id,
        })),
    )
}

pub fn detect_unauthorized_access(event: &AuditEvent) -> Option<NewAuditEvent> {
    match event.status_code {
        Some(code @ (401 | 403)) => Some(
            NewAuditEvent::new(
                AuditLevel::Warning,
                AuditCategory::Security,
                "unauthorized_access_attempt",
            )
            .context_from(event)
            .details(json!({
                "status_code": code,
                "original_event_id": event.id,
            })),
        ),
        _ => None,
    }
}

/// Run all detectors. `failures_in_window(ip, minutes)` counts recent login failures.
pub fn analyze_event<F>(event: &AuditEvent, failures_in_window: F) -> Vec<NewAuditEvent>
where
    F: Fn(&str, i64) -> usize,
{
    let mut derived = Vec::new();

    if let Some(e) = detect_suspicious_pattern(event) {
        derived.push(e);
    }
    if event.action == "login_failed" {
        if let Some(ip) = event.ip.as_deref() {
            let failures = failures_in_window(ip, BRUTE_FORCE_WINDOW_MINUTES);
            if let Some(e) = detect_brute_force(event, failures) {
                derived.push(e);
            }
        }
    }
    if let Some(e) = detect_unauthorized_access(event) {
        derived.push(e);
    }

    derived
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn event(action: &str, status: Option<u16>, details: serde_json::Value) -> AuditEvent {
        AuditEvent {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            level: AuditLevel::Info,
            category: AuditCategory::DataAccess,
            action: action.to_string(),
            actor_id: Some("user-7".to_string()),
            ip: Some("10.0.0.1".to_string()),
            user_agent: None,
            path: Some("/api/events".to_string()),
            method: Some("GET".to_string()),
            status_code: status,
            details,
            risk_level: RiskLevel::Minimal,
            related_event_id: None,
        }
    }

    #[test]
    fn test_all_patterns_compile() {
        assert!(SUSPICIOUS_PATTERNS.iter().all(|p| p.regex.is_some()));
        assert_eq!(SUSPICIOUS_PATTERNS.len(), 6);
    }

    #[test]
    fn test_suspicious_content_detected() {
        let cases = [
            (json!({ "file": "../../etc/passwd" }), "path_traversal"),
            (json!({ "comment": "<script>alert(1)</script>" }), "script_injection"),
            (json!({ "q": "1; DROP TABLE users" }), "sql_injection"),
            (json!("name' OR '1'='1"), "sql_injection"),
        ];
        for (details, label) in cases {
            let original = event("search", Some(200), details);
            let derived = detect_suspicious_pattern(&original).unwrap();
            assert_eq!(derived.details["pattern"], label);
            assert_eq!(derived.related_event_id, Some(original.id));
            assert_eq!(derived.ip.as_deref(), Some("10.0.0.1"));
        }
    }

    #[test]
    fn test_benign_content_ignored() {
        let original = event("search", Some(200), json!({ "q": "selection of events" }));
        assert!(detect_suspicious_pattern(&original).is_none());
        assert!(detect_suspicious_pattern(&event("x", None, serde_json::Value::Null)).is_none());
    }

    #[test]
    fn test_brute_force_threshold() {
        let failed = event("login_failed", Some(401), serde_json::Value::Null);
        assert!(detect_brute_force(&failed, 4).is_none());
        let derived = detect_brute_force(&failed, 5).unwrap();
        assert_eq!(derived.level, AuditLevel::Critical);
        assert_eq!(derived.action, "brute_force_attack_detected");
        assert_eq!(derived.related_event_id, Some(failed.id));

        let other = event("login", Some(200), serde_json::Value::Null);
        assert!(detect_brute_force(&other, 50).is_none());
    }

    #[test]
    fn test_unauthorized_access_on_401_and_403_only() {
        for code in [401, 403] {
            let derived =
                detect_unauthorized_access(&event("view", Some(code), serde_json::Value::Null))
                    .unwrap();
            assert_eq!(derived.level, AuditLevel::Warning);
            assert_eq!(derived.action, "unauthorized_access_attempt");
        }
        assert!(
            detect_unauthorized_access(&event("view", Some(404), serde_json::Value::Null))
                .is_none()
        );
    }

    #[test]
    fn test_analyze_runs_detectors_independently() {
        let failed = event(
            "login_failed",
            Some(401),
            json!({ "username": "admin' OR '1'='1" }),
        );
        let derived = analyze_event(&failed, |ip, minutes| {
            assert_eq!(ip, "10.0.0.1");
            assert_eq!(minutes, BRUTE_FORCE_WINDOW_MINUTES);
            6
        });
        let actions: Vec<_> = derived.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(
            actions,
            vec![
                "suspicious_pattern_detected",
                "brute_force_attack_detected",
                "unauthorized_access_attempt"
            ]
        );
    }
}
