//! HTTP API Handlers and Routes
//!
//! A thin axum layer over the trace store and orchestrator.
//!
//! # API Endpoints
//!
//! ## Traces (`/api/v1`)
//! - `POST /api/v1/trace` - Create a pending trace
//! - `POST /api/v1/trace/batch` - Create several pending traces
//! - `POST /api/v1/trace/{id}/execute` - Run the four evidence stages
//! - `GET /api/v1/trace/{id}` - Trace record
//! - `GET /api/v1/trace/{id}/summary` - Aggregated summary
//! - `GET /api/v1/trace/{id}/stages` - Per-stage results
//! - `DELETE /api/v1/trace/{id}` - Delete a trace
//! - `GET /api/v1/traces?limit&offset` - List traces, newest first
//! - `GET /api/v1/traces/stats` - Counts by status and verdict
//!
//! ## Health
//! - `GET /health` - Health check endpoint

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;
