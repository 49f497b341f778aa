//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters and gauges on an injected registry)
//!
//! Consumers:
//!     → stdout log collection
//!     → GET /metrics (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;

pub use metrics::GatewayMetrics;
