//! Named backend operations.
//!
//! # Data Flow
//! ```text
//! ApiClient::call("posts.publish", params, data)
//!     → EndpointRegistry::resolve (method + filled path + leftover query)
//!     → ApiClient::request
//! ```
//!
//! # Design Decisions
//! - One table of (method, path template) pairs instead of one method per endpoint
//! - Config entries override or extend the built-in table

pub mod registry;

pub use registry::{Endpoint, EndpointRegistry, ResolvedEndpoint};
