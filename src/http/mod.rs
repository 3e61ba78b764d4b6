//! HTTP serving subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted TCP connection
//!     → server.rs (hyper connection task, drain gate, middleware)
//!     → request.rs (request ID)
//!     → handlers.rs (record creation against the shared store)
//!     → response.rs (error mapping)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use handlers::AppState;
pub use request::{RequestId, RequestIdExt, RequestIdLayer, X_REQUEST_ID};
pub use server::{RuntimeError, RuntimeHandle, RuntimeState, ServiceRuntime};
