//! # Web API Handlers
//!
//! - [`health`] - health, liveness and metrics endpoints
//! - [`admin`] - privileged operator endpoints

pub mod admin;
pub mod health;
