//! Client-side request pipeline for the social media dashboard backend.
//!
//! `ApiClient` is the single gateway for backend calls: it merges default
//! headers, runs interceptors, dispatches through a `Transport`, decodes
//! and classifies responses, and notifies the user about failures.

pub mod config;
pub mod endpoints;
pub mod http;
pub mod lifecycle;
pub mod notifications;
pub mod notify;
pub mod observability;
pub mod resilience;
pub mod storage;

pub use config::schema::DashboardConfig;
pub use http::{ApiClient, ApiError, ApiResult};
pub use lifecycle::Shutdown;
