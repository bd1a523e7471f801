//! # Automatic Recovery
//!
//! Bounded-retry mitigation of failure categories with strict mutual exclusion:
//! at most one recovery runs at a time, concurrent requests are rejected.

pub mod orchestrator;
pub mod strategies;
pub mod throttle;
pub mod types;

pub use orchestrator::{RecoveryDependencies, RecoveryOrchestrator};
pub use strategies::RecoveryStrategy;
pub use throttle::{BackgroundThrottle, ReclaimableCache};
pub use types::{FailureKind, RecoveryAttempt, RecoveryPolicy, RecoveryStats, StrategyOutcome};
