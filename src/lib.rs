//! Record service library: a single-endpoint HTTP service with ordered startup
//! and a bounded two-phase shutdown.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod store;

pub use config::schema::ServiceConfig;
pub use http::ServiceRuntime;
pub use lifecycle::{Supervisor, TerminationSignal};
