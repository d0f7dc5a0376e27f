//! Resilience helpers around the request pipeline.
//!
//! # Data Flow
//! ```text
//! Caller opts in:
//!     → retries.rs (retry_request: re-invoke on failure, exponential backoff)
//!         → backoff.rs (delay before attempt n+1)
//!     → timeouts.rs (with_timeout: race against a deadline, drop on expiry)
//! ```
//!
//! # Design Decisions
//! - Nothing here runs implicitly; `ApiClient::request` never retries
//! - Timeout errors are distinct from network errors
//! - Dropping the timed-out future is what cancels the transport call

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use backoff::calculate_backoff;
pub use retries::{retry_request, RetryPolicy};
pub use timeouts::with_timeout;
