//! Lifecycle management for long-running client tasks.
//!
//! # Data Flow
//! ```text
//! Ctrl-C / SIGTERM (signals.rs)
//!     → Shutdown::trigger (shutdown.rs)
//!     → every subscribed task (e.g. the notification poller) leaves its loop
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
