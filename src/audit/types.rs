//! Audit event model, query filters and aggregate statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditLevel {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    Authentication,
    Authorization,
    Security,
    DataAccess,
    DataModification,
    System,
}

/// Heuristic severity, ordered from least to most severe
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Minimal,
    Low,
    Medium,
    High,
    Critical,
}

/// Recorded, immutable audit event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub level: AuditLevel,
    pub category: AuditCategory,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub details: serde_json::Value,
    pub risk_level: RiskLevel,
    /// Event that caused a detector to emit this one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_event_id: Option<Uuid>,
}

/// Event as submitted by callers; id and timestamp are assigned when missing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAuditEvent {
    pub id: Option<Uuid>,
    pub timestamp: Option<DateTime<Utc>>,
    pub level: AuditLevel,
    pub category: AuditCategory,
    pub action: String,
    pub actor_id: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub path: Option<String>,
    pub method: Option<String>,
    pub status_code: Option<u16>,
    pub details: serde_json::Value,
    pub related_event_id: Option<Uuid>,
}

impl NewAuditEvent {
    pub fn new(level: AuditLevel, category: AuditCategory, action: impl Into<String>) -> Self {
        Self {
            id: None,
            timestamp: None,
            level,
            category,
            action: action.into(),
            actor_id: None,
            ip: None,
            user_agent: None,
            path: None,
            method: None,
            status_code: None,
            details: serde_json::Value::Null,
            related_event_id: None,
        }
    }

    pub fn actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn request(mut self, method: impl Into<String>, path: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self.path = Some(path.into());
        self
    }

    pub fn status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn related_to(mut self, event_id: Uuid) -> Self {
        self.related_event_id = Some(event_id);
        self
    }

    /// Carry over the request context of another event
    pub fn context_from(mut self, event: &AuditEvent) -> Self {
        self.actor_id = event.actor_id.clone();
        self.ip = event.ip.clone();
        self.user_agent = event.user_agent.clone();
        self.path = event.path.clone();
        self.method = event.method.clone();
        self.related_event_id = Some(event.id);
        self
    }
}

/// Query filters for `AuditLog::get_events`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditFilter {
    pub level: Option<AuditLevel>,
    pub category: Option<AuditCategory>,
    pub actor_id: Option<String>,
    pub ip: Option<String>,
    pub risk_level: Option<RiskLevel>,
    pub action: Option<String>,
    pub limit: Option<usize>,
}

impl AuditFilter {
    pub fn matches(&self, event: &AuditEvent) -> bool {
        self.level.map_or(true, |l| event.level == l)
            && self.category.map_or(true, |c| event.category == c)
            && self
                .actor_id
                .as_ref()
                .map_or(true, |a| event.actor_id.as_ref() == Some(a))
            && self
                .ip
                .as_ref()
                .map_or(true, |ip| event.ip.as_ref() == Some(ip))
            && self.risk_level.map_or(true, |r| event.risk_level == r)
            && self.action.as_ref().map_or(true, |a| &event.action == a)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpCount {
    pub ip: String,
    pub count: u64,
}

/// Aggregation over the in-memory event ring
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditStats {
    pub total: u64,
    pub by_level: HashMap<AuditLevel, u64>,
    pub by_category: HashMap<AuditCategory, u64>,
    pub by_risk: HashMap<RiskLevel, u64>,
    pub top_ips: Vec<IpCount>,
    /// Most recent critical or high-risk events, newest first
    pub recent_critical: Vec<AuditEvent>,
}
