//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events → stdout + dated log file)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Operators (stdout, log directory)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured logging with request and connection IDs as fields
//! - The log file is a resource like any other: acquired first, released last
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

pub use logging::{LogSink, LogSinkError};
