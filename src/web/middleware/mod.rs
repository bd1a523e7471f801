//! # Web API Middleware
//!
//! Request id, request monitoring, admission gate and admin authentication.
//! Layer order is assembled in [`crate::web::create_app`].

pub mod admission;
pub mod auth;
pub mod request_id;
pub mod request_monitor;
