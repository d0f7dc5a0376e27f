//! Ordered interceptor chains.
//!
//! # Data Flow
//! ```text
//! request chain:   config → [i0] → [i1] → ... → transport
//! response chain:  Ok(envelope) | Err(error) → [i0] → [i1] → ... → caller
//! ```
//!
//! # Design Decisions
//! - Chains are append-only; registration swaps in a new snapshot and a
//!   call in flight keeps the snapshot it started with
//! - A rejection handler returns a tagged `Recovery`: `Recovered` moves the
//!   chain back onto the success track, `Rethrow` keeps the failure
//! - A failing fulfillment handler is handed to its own entry's rejection
//!   handler; without one the failure short-circuits the rest of the chain

use std::future::Future;
use std::sync::Arc;

use arc_swap::ArcSwap;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use reqwest::header::HeaderValue;

use crate::http::error::{ApiError, ApiResult};
use crate::http::request::{RequestConfig, RequestId, X_REQUEST_ID};
use crate::http::response::ResponseEnvelope;

/// Outcome of a rejection handler.
#[derive(Debug)]
pub enum Recovery<T> {
    /// The failure was handled; continue with this value.
    Recovered(T),
    /// The failure stands (possibly replaced by another error).
    Rethrow(ApiError),
}

impl<T> Recovery<T> {
    pub fn into_result(self) -> ApiResult<T> {
        match self {
            Recovery::Recovered(value) => Ok(value),
            Recovery::Rethrow(err) => Err(err),
        }
    }
}

type FulfillFn<T> = Arc<dyn Fn(T) -> BoxFuture<'static, ApiResult<T>> + Send + Sync>;
type RejectFn<T> = Arc<dyn Fn(ApiError) -> BoxFuture<'static, Recovery<T>> + Send + Sync>;

/// A (fulfillment, rejection) handler pair. Either half may be absent.
pub struct Interceptor<T> {
    on_fulfilled: Option<FulfillFn<T>>,
    on_rejected: Option<RejectFn<T>>,
}

/// Interceptor over outgoing request configs.
pub type RequestInterceptor = Interceptor<RequestConfig>;

/// Interceptor over response envelopes and failures.
pub type ResponseInterceptor = Interceptor<ResponseEnvelope>;

impl<T: Send + 'static> Interceptor<T> {
    pub fn new() -> Self {
        Self {
            on_fulfilled: None,
            on_rejected: None,
        }
    }

    /// Set the fulfillment handler.
    pub fn on_fulfilled<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        self.on_fulfilled = Some(Arc::new(move |value| f(value).boxed()));
        self
    }

    /// Set the rejection handler.
    pub fn on_rejected<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(ApiError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Recovery<T>> + Send + 'static,
    {
        self.on_rejected = Some(Arc::new(move |err| f(err).boxed()));
        self
    }

    /// Synchronous fulfillment handler.
    pub fn map<F>(self, f: F) -> Self
    where
        F: Fn(T) -> ApiResult<T> + Send + Sync + 'static,
    {
        self.on_fulfilled(move |value| std::future::ready(f(value)))
    }

    /// Rejection handler that only observes the failure and rethrows it.
    pub fn observe_errors<F>(self, f: F) -> Self
    where
        F: Fn(&ApiError) + Send + Sync + 'static,
    {
        self.on_rejected(move |err| {
            f(&err);
            std::future::ready(Recovery::Rethrow(err))
        })
    }

    async fn reject(&self, err: ApiError) -> ApiResult<T> {
        match &self.on_rejected {
            Some(handler) => handler(err).await.into_result(),
            None => Err(err),
        }
    }
}

impl<T: Send + 'static> Default for Interceptor<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Interceptor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("on_fulfilled", &self.on_fulfilled.is_some())
            .field("on_rejected", &self.on_rejected.is_some())
            .finish()
    }
}

/// An append-only, ordered sequence of interceptors.
pub struct InterceptorChain<T> {
    entries: ArcSwap<Vec<Arc<Interceptor<T>>>>,
}

impl<T: Send + 'static> InterceptorChain<T> {
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Append an interceptor. It applies after every earlier registration.
    pub fn push(&self, interceptor: Interceptor<T>) {
        let entry = Arc::new(interceptor);
        self.entries.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(entry.clone());
            next
        });
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run the chain over `initial`.
    ///
    /// Successes go through fulfillment handlers, failures through
    /// rejection handlers, in registration order.
    pub async fn apply(&self, initial: ApiResult<T>) -> ApiResult<T> {
        let snapshot = self.entries.load_full();
        let mut state = initial;

        for entry in snapshot.iter() {
            state = match state {
                Ok(value) => match &entry.on_fulfilled {
                    Some(handler) => match handler(value).await {
                        Ok(next) => Ok(next),
                        Err(err) if entry.on_rejected.is_some() => entry.reject(err).await,
                        Err(err) => return Err(err),
                    },
                    None => Ok(value),
                },
                Err(err) => entry.reject(err).await,
            };
        }

        state
    }
}

impl<T: Send + 'static> Default for InterceptorChain<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Request interceptor that stamps an `X-Request-ID` on requests lacking one.
pub fn request_id_interceptor() -> RequestInterceptor {
    Interceptor::new().map(|mut config: RequestConfig| {
        if !config.headers.contains_key(X_REQUEST_ID) {
            let id = RequestId::generate();
            let value = HeaderValue::from_str(&id.0)
                .map_err(|e| ApiError::Interceptor(e.to_string()))?;
            config.headers.insert(X_REQUEST_ID, value);
        }
        Ok(config)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn chain_of(tags: &[&'static str], log: Arc<Mutex<Vec<&'static str>>>) -> InterceptorChain<Vec<&'static str>> {
        let chain = InterceptorChain::new();
        for tag in tags {
            let log = log.clone();
            let tag = *tag;
            chain.push(Interceptor::new().on_fulfilled(move |mut seen: Vec<&'static str>| {
                log.lock().unwrap().push(tag);
                seen.push(tag);
                async move { Ok(seen) }
            }));
        }
        chain
    }

    #[tokio::test]
    async fn test_each_output_feeds_next_input() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = chain_of(&["a", "b", "c"], log.clone());

        let out = chain.apply(Ok(Vec::new())).await.unwrap();
        assert_eq!(out, vec!["a", "b", "c"]);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_failure_without_handler_short_circuits() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = chain_of(&["a"], log.clone());
        chain.push(Interceptor::new().map(|_: Vec<&'static str>| Err(ApiError::Interceptor("boom".into()))));
        let rest = log.clone();
        chain.push(
            Interceptor::new()
                .map(move |v: Vec<&'static str>| {
                    rest.lock().unwrap().push("after");
                    Ok(v)
                })
                .observe_errors({
                    let log = log.clone();
                    move |_| log.lock().unwrap().push("observed")
                }),
        );

        let err = chain.apply(Ok(Vec::new())).await.unwrap_err();
        assert!(matches!(err, ApiError::Interceptor(ref m) if m == "boom"));
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_own_rejection_handler_recovers() {
        let chain: InterceptorChain<u32> = InterceptorChain::new();
        chain.push(
            Interceptor::new()
                .map(|_: u32| Err(ApiError::Interceptor("bad".into())))
                .on_rejected(|_| async { Recovery::Recovered(10) }),
        );
        chain.push(Interceptor::new().map(|v: u32| Ok(v + 1)));

        assert_eq!(chain.apply(Ok(0)).await.unwrap(), 11);
    }

    #[tokio::test]
    async fn test_rethrow_reaches_later_rejection_handlers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chain: InterceptorChain<u32> = InterceptorChain::new();
        for tag in ["first", "second"] {
            let seen = seen.clone();
            chain.push(Interceptor::new().observe_errors(move |err| {
                seen.lock().unwrap().push(format!("{}:{}", tag, err.kind()));
            }));
        }

        let err = chain.apply(Err(ApiError::Cancelled)).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(*seen.lock().unwrap(), vec!["first:cancelled", "second:cancelled"]);
    }

    #[tokio::test]
    async fn test_recovered_failure_returns_to_success_track() {
        let chain: InterceptorChain<u32> = InterceptorChain::new();
        chain.push(Interceptor::new().on_rejected(|_| async { Recovery::Recovered(5) }));
        chain.push(Interceptor::new().map(|v: u32| Ok(v * 2)));

        assert_eq!(chain.apply(Err(ApiError::Cancelled)).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_snapshot_is_append_only() {
        let chain: InterceptorChain<u32> = InterceptorChain::new();
        assert!(chain.is_empty());
        chain.push(Interceptor::new().map(|v: u32| Ok(v + 1)));
        chain.push(Interceptor::new().map(|v: u32| Ok(v * 10)));
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.apply(Ok(1)).await.unwrap(), 20);
    }

    #[tokio::test]
    async fn test_request_id_stamped_once() {
        let chain = InterceptorChain::new();
        chain.push(request_id_interceptor());
        let config = RequestConfig::merge(
            "/x".into(),
            &crate::http::request::default_headers(),
            Default::default(),
        );

        let config = chain.apply(Ok(config)).await.unwrap();
        let first = config.request_id().unwrap().to_string();
        assert_eq!(first.len(), 36);

        let config = chain.apply(Ok(config)).await.unwrap();
        assert_eq!(config.request_id().unwrap(), first);
    }
}
