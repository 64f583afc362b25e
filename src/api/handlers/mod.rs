//! API request handlers.

/// Agent roster listing.
pub mod agents;
/// Liveness check.
pub mod health;
/// Query execution with streamed progress.
pub mod query;
