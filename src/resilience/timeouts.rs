//! Deadline enforcement.

use std::future::Future;
use std::time::Duration;

use crate::http::error::{ApiError, ApiResult};

/// Race `fut` against a `timeout` deadline.
///
/// On expiry `fut` is dropped, which cancels whatever it was awaiting, and
/// `ApiError::Timeout` is returned. The timer is dropped on either outcome.
pub async fn with_timeout<T, F>(timeout: Duration, fut: F) -> ApiResult<T>
where
    F: Future<Output = ApiResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "Request timed out");
            Err(ApiError::Timeout(timeout))
        }
    }
}
