//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! ApiClient::request
//!     → tracing events (dispatch, response, failure) with request IDs
//!     → metrics.rs (request counter + latency histogram)
//!
//! Binaries:
//!     → logging.rs (subscriber with env filter)
//! ```
//!
//! # Design Decisions
//! - Structured fields, never preformatted messages, for request data
//! - Metrics go through the `metrics` facade; without an installed
//!   recorder they cost nothing

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
