//! fintrack - resilient authenticated API access
//!
//! Session-aware HTTP client for the fintrack personal finance API:
//! single-flight session refresh with request queueing on 401, and a
//! deduplicating read-through cache for the previous month's balance.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod session;
pub mod ui;

pub use error::{FintrackError, FintrackResult};
