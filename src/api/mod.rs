//! HTTP API handlers and routes
//!
//! Built on Axum. No endpoint requires authentication.
//!
//! # API Endpoints
//!
//! - `POST /api/query` - Run a query; responds with `text/event-stream`
//! - `POST /api/chat` - Alias of `/api/query`
//! - `GET /api/agents` - Configured agent roster and tools
//! - `GET /health`, `GET /api/health` - Liveness check
//! - `GET /api/openapi.json` - OpenAPI document
//!
//! # Event stream
//!
//! Every SSE message is one JSON progress event:
//! ```text
//! data: {"type":"phase_update","agent":"coordinator","content":"Launching 4 agents in parallel","timestamp":"..."}
//! ```
//! The stream ends after a `final_report` event or a fatal `error` event.

/// Request handlers.
pub mod handlers;
/// Router configuration and OpenAPI document.
pub mod routes;
