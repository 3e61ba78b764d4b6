//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Open log sink → Build runtime → Bind socket → Connect store
//!
//! Serving (supervisor.rs):
//!     Spawn runtime → Wait for termination signal or runtime failure
//!
//! Shutdown (shutdown.rs):
//!     Graceful stop (bounded by grace period) → Forced stop if needed
//!     → Release socket, store, log sink (resources.rs)
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger shutdown (once)
//! ```
//!
//! # Design Decisions
//! - Ordered startup, fail fast on the first error
//! - Release never starts before the runtime stopped
//! - The log sink is acquired first and released last

pub mod resources;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod supervisor;

pub use shutdown::{ShutdownCoordinator, ShutdownReport, ShutdownState, StopPath};
pub use signals::TerminationSignal;
pub use startup::{acquire, AcquireError, AcquireStep, ServiceProcess};
pub use supervisor::{Supervisor, SupervisorError};
