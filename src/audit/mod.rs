//! # Security Audit
//!
//! Append-only event recording with additive risk scoring and pattern
//! detectors (suspicious content, brute force, unauthorized access).

pub mod detectors;
pub mod log;
pub mod risk;
pub mod sink;
pub mod types;

pub use log::AuditLog;
pub use types::{
    AuditCategory, AuditEvent, AuditFilter, AuditLevel, AuditStats, NewAuditEvent, RiskLevel,
};
