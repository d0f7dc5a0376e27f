//! Operation name → (method, path template) table.

use std::collections::BTreeMap;
use std::str::FromStr;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::config::EndpointConfig;
use crate::http::error::{ApiError, ApiResult};
use crate::http::request::{Method, Query};

/// Bytes escaped when a value fills a path placeholder. `/` is included so a
/// value can never add a segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// A backend operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub method: Method,
    /// Path with `{name}` placeholders.
    pub path: String,
}

impl Endpoint {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }
}

/// An endpoint with its placeholders filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    pub method: Method,
    pub path: String,
    /// Parameters not consumed by the path template.
    pub query: Query,
}

/// Registry of named operations.
#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
    endpoints: BTreeMap<String, Endpoint>,
}

const DEFAULT_ENDPOINTS: &[(&str, &str, &str)] = &[
    ("dashboard.stats", "GET", "/api/dashboard/stats"),
    ("dashboard.activity", "GET", "/api/dashboard/activity"),
    ("accounts.list", "GET", "/api/accounts"),
    ("accounts.create", "POST", "/api/accounts"),
    ("accounts.get", "GET", "/api/accounts/{id}"),
    ("accounts.update", "PUT", "/api/accounts/{id}"),
    ("accounts.delete", "DELETE", "/api/accounts/{id}"),
    ("accounts.test", "POST", "/api/accounts/{id}/test"),
    ("accounts.reauth", "POST", "/api/accounts/{id}/reauth"),
    ("guest_sites.list", "GET", "/api/guest-sites"),
    ("guest_sites.create", "POST", "/api/guest-sites"),
    ("guest_sites.get", "GET", "/api/guest-sites/{id}"),
    ("guest_sites.update", "PUT", "/api/guest-sites/{id}"),
    ("guest_sites.delete", "DELETE", "/api/guest-sites/{id}"),
    ("guest_sites.test", "POST", "/api/guest-sites/test"),
    ("guest_sites.bulk_test", "POST", "/api/guest-sites/bulk-test"),
    ("posts.list", "GET", "/api/posts"),
    ("posts.create", "POST", "/api/posts"),
    ("posts.get", "GET", "/api/posts/{id}"),
    ("posts.update", "PUT", "/api/posts/{id}"),
    ("posts.delete", "DELETE", "/api/posts/{id}"),
    ("posts.publish", "POST", "/api/posts/{id}/publish"),
    ("posts.schedule", "POST", "/api/posts/{id}/schedule"),
    ("content.list", "GET", "/api/content"),
    ("content.create", "POST", "/api/content"),
    ("content.generate", "POST", "/api/content/generate"),
    ("content.improve", "POST", "/api/content/improve"),
    ("content.scrape", "POST", "/api/content/scrape"),
    ("automation.status", "GET", "/api/automation/status"),
    ("automation.start", "POST", "/api/automation/start"),
    ("automation.stop", "POST", "/api/automation/stop"),
    ("automation.schedules", "GET", "/api/automation/schedules"),
    ("automation.logs", "GET", "/api/automation/logs"),
    ("notifications.list", "GET", "/api/notifications"),
    ("notifications.create", "POST", "/api/notifications"),
    ("notifications.mark_read", "POST", "/api/notifications/{id}/read"),
    ("notifications.mark_all_read", "POST", "/api/notifications/mark-all-read"),
    ("notifications.new", "GET", "/api/notifications/new"),
    ("settings.get", "GET", "/api/settings"),
    ("settings.update", "PUT", "/api/settings"),
    ("settings.export", "GET", "/api/settings/export"),
    ("settings.import", "POST", "/api/settings/import"),
];

impl EndpointRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The dashboard backend's operations.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for (name, method, path) in DEFAULT_ENDPOINTS {
            let method = Method::from_str(method).unwrap_or(Method::GET);
            registry.register(*name, Endpoint::new(method, *path));
        }
        registry
    }

    /// Defaults overlaid with configured entries.
    pub fn from_config<'a, I>(entries: I) -> ApiResult<Self>
    where
        I: IntoIterator<Item = (&'a String, &'a EndpointConfig)>,
    {
        let mut registry = Self::with_defaults();
        for (name, entry) in entries {
            let method = Method::from_str(&entry.method.to_ascii_uppercase()).map_err(|_| {
                ApiError::InvalidRequest(format!("endpoint '{}' has invalid method '{}'", name, entry.method))
            })?;
            registry.register(name.clone(), Endpoint::new(method, entry.path.clone()));
        }
        Ok(registry)
    }

    /// Add or replace an operation.
    pub fn register(&mut self, name: impl Into<String>, endpoint: Endpoint) {
        self.endpoints.insert(name.into(), endpoint);
    }

    pub fn get(&self, name: &str) -> Option<&Endpoint> {
        self.endpoints.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Fill the path template of `name` from `params`.
    ///
    /// Placeholder values are percent-encoded as a single path segment.
    /// Parameters the template does not use are returned as a query.
    pub fn resolve(&self, name: &str, params: &Query) -> ApiResult<ResolvedEndpoint> {
        let endpoint = self
            .get(name)
            .ok_or_else(|| ApiError::InvalidRequest(format!("unknown operation '{}'", name)))?;

        let mut path = String::with_capacity(endpoint.path.len());
        let mut used = Vec::new();
        let mut rest = endpoint.path.as_str();

        while let Some(open) = rest.find('{') {
            let close = rest[open..]
                .find('}')
                .map(|i| open + i)
                .ok_or_else(|| ApiError::InvalidRequest(format!("unterminated placeholder in '{}'", endpoint.path)))?;
            let key = &rest[open + 1..close];
            let value = params
                .pairs()
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v)
                .ok_or_else(|| ApiError::InvalidRequest(format!("operation '{}' needs parameter '{}'", name, key)))?;

            path.push_str(&rest[..open]);
            path.extend(utf8_percent_encode(value, PATH_SEGMENT));
            used.push(key.to_string());
            rest = &rest[close + 1..];
        }
        path.push_str(rest);

        let query = params
            .pairs()
            .iter()
            .filter(|(k, _)| !used.contains(k))
            .cloned()
            .collect();

        Ok(ResolvedEndpoint {
            method: endpoint.method.clone(),
            path,
            query,
        })
    }
}
