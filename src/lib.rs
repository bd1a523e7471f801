#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Vigil Core
//!
//! Operational resilience core for a single long-running service process.
//!
//! ## Overview
//!
//! - **Health monitoring**: a periodic checker combines runtime metrics and
//!   dependency probes into a cached snapshot and evaluates alert thresholds
//! - **Automatic recovery**: bounded-retry strategies per failure kind, at most
//!   one recovery in flight
//! - **Security audit**: append-only events with additive risk scoring and
//!   pattern detectors, mirrored to a rotated JSON-lines file
//! - **Request monitoring and admission**: per-request counters and timers,
//!   load shedding driven by the cached snapshot
//!
//! ## Module Organization
//!
//! - [`health`] - snapshot, probes, alerts and the health checker
//! - [`recovery`] - strategy registry and orchestrator
//! - [`audit`] - audit log, risk scoring, detectors and durable sink
//! - [`monitor`] - request instrumentation
//! - [`web`] - axum routes, handlers and middleware
//! - [`bootstrap`] - explicit construction and lifecycle
//! - [`config`] - configuration loading and validation
//! - [`testing`] - controllable collaborators for tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vigil_core::{ConfigManager, ResilienceCore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let core = ResilienceCore::bootstrap(ConfigManager::load()?);
//! core.start().await;
//! let metrics = core.checker().get_metrics().await;
//! println!("status: {}", metrics.snapshot.status.as_str());
//! core.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod bootstrap;
pub mod config;
pub mod constants;
pub mod error;
pub mod health;
pub mod logging;
pub mod monitor;
pub mod recovery;
pub mod testing;
pub mod utils;
pub mod web;

pub use audit::{AuditEvent, AuditLog, NewAuditEvent, RiskLevel};
pub use bootstrap::{Collaborators, ResilienceCore};
pub use config::{ConfigManager, VigilConfig};
pub use error::{VigilError, VigilResult};
pub use health::{HealthChecker, HealthStatus, Snapshot};
pub use monitor::RequestMonitor;
pub use recovery::{FailureKind, RecoveryOrchestrator};
