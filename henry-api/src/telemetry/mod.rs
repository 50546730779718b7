//! Henry Telemetry - Logging Infrastructure
//!
//! Structured logging through `tracing`. Request logging is handled by
//! `tower_http::trace::TraceLayer` in the router.

pub mod tracer;

pub use tracer::{init_tracing, LogFormat, TelemetryConfig};
