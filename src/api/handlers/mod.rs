//! API request handlers.

/// Health check handler.
pub mod health;
/// Trace creation, execution and lookup handlers.
pub mod traces;
