//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, connection limits)
//!     → connection.rs (identity, live count)
//!     → Hand off to the service runtime (http::server)
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - The listening socket is shared behind an Arc and closes with its last owner

pub mod connection;
pub mod listener;

pub use listener::{Listener, ListenerError};
