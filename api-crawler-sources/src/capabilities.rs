//! Capability contracts implemented by data-source adapters
//!
//! Adapters implement only the capabilities their upstream supports and
//! callers depend on the capability, never on the concrete adapter:
//!
//! - [`Initializable`] - validated construction from a [`SourceContext`]
//! - [`Searchable`] - `search(term, options)`
//! - [`RestfulClient`] - `get` / `post` returning a uniform [`HttpResponse`]
//! - [`BrowserDriven`] - `scroll_to` / `close` for rendered-page sources
//!
//! The operation traits are object safe, so heterogeneous adapters can be
//! driven through `Box<dyn Searchable>` and friends.
//!
//! An adapter that only searches cannot be used as a REST client:
//!
//! ```compile_fail
//! use api_crawler_common::Result;
//! use api_crawler_sources::{RestfulClient, SearchOptions, Searchable};
//! use async_trait::async_trait;
//! use serde_json::Value;
//!
//! struct OnlySearch;
//!
//! #[async_trait]
//! impl Searchable for OnlySearch {
//!     async fn search(&self, _term: &str, _options: &SearchOptions) -> Result<Value> {
//!         Ok(Value::Null)
//!     }
//! }
//!
//! fn needs_rest(_client: &dyn RestfulClient) {}
//!
//! needs_rest(&OnlySearch);
//! ```

use crate::context::SourceContext;
use crate::http::{HttpResponse, RequestOptions};
use api_crawler_common::{log_by_severity, CrawlerError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::str::FromStr;

/// Validated construction of an adapter
///
/// Construction checks the credentials the adapter needs. Under the strict
/// credential policy a missing key fails here; under the lenient policy the
/// adapter is built and the first operation needing the key fails instead.
#[async_trait]
pub trait Initializable: Sized {
    /// Component name used for the adapter's call log keys
    const COMPONENT: &'static str;

    async fn initialize(ctx: &SourceContext) -> Result<Self>;
}

/// Keyword search against a source
///
/// The result shape is specific to each source.
#[async_trait]
pub trait Searchable: Send + Sync {
    async fn search(&self, term: &str, options: &SearchOptions) -> Result<Value>;
}

/// Plain REST access relative to the source's base URL
#[async_trait]
pub trait RestfulClient: Send + Sync {
    async fn get(&self, endpoint: &str, options: RequestOptions) -> Result<HttpResponse>;

    async fn post(
        &self,
        endpoint: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<HttpResponse>;
}

/// Interaction with a rendered page
#[async_trait]
pub trait BrowserDriven: Send + Sync {
    /// Scroll the first element matching `locator` into view
    async fn scroll_to(&self, locator: &str, kind: LocatorKind) -> Result<()>;

    /// Release the browser session. Safe to call repeatedly and after failures.
    async fn close(&self) -> Result<()>;
}

/// Run `f` against a browser-driven adapter and close its session afterwards,
/// whether `f` succeeded or not
///
/// A close failure is only reported when `f` itself succeeded.
pub async fn with_session<'a, B, T, F, Fut>(driver: &'a B, f: F) -> Result<T>
where
    B: BrowserDriven + ?Sized,
    F: FnOnce(&'a B) -> Fut,
    Fut: Future<Output = Result<T>> + 'a,
{
    let outcome = f(driver).await;
    let closed = driver.close().await;

    match (outcome, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            log_by_severity("Session close after failure also failed", &close_err);
            Err(err)
        }
    }
}

/// How a locator string selects elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocatorKind {
    Css,
    Class,
    Xpath,
}

impl LocatorKind {
    pub const ALL: [LocatorKind; 3] = [LocatorKind::Css, LocatorKind::Class, LocatorKind::Xpath];

    pub fn as_str(&self) -> &'static str {
        match self {
            LocatorKind::Css => "css",
            LocatorKind::Class => "class",
            LocatorKind::Xpath => "xpath",
        }
    }
}

impl fmt::Display for LocatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocatorKind {
    type Err = CrawlerError;

    fn from_str(s: &str) -> Result<Self> {
        LocatorKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CrawlerError::invalid_choice("type", s, &["css", "class", "xpath"]))
    }
}

/// A locator and the way it is interpreted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    pub kind: LocatorKind,
    pub path: String,
}

impl Locator {
    pub fn new(kind: LocatorKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    /// The locator as a CSS selector, `None` for XPath
    pub fn css_selector(&self) -> Option<String> {
        match self.kind {
            LocatorKind::Css => Some(self.path.clone()),
            LocatorKind::Class => Some(format!(".{}", self.path.trim())),
            LocatorKind::Xpath => None,
        }
    }
}

/// Options for [`Searchable::search`]
///
/// `limit` and `location` are understood by most sources; anything
/// source-specific goes in `params`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }

    pub fn get_u64(&self, name: &str) -> Option<u64> {
        self.params.get(name).and_then(Value::as_u64)
    }
}
