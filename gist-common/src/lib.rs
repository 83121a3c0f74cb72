//! Common types and utilities shared across pagegist crates.
//!
//! This crate defines the data model that flows between the page context, the
//! relay and the control surface, the shared error taxonomy, and the
//! observability helpers. It is intentionally lightweight so that every crate
//! can depend on it without pulling in the HTTP or actor stacks.
//!
//! # Overview
//!
//! - [`PageAddress`] and [`MarkupPayload`]: what gets extracted from a page
//! - [`SummaryResult`], [`CrawlResult`], [`RemoteResult`]: what the service returns
//! - [`Operation`], [`TriggerSource`], [`RequestState`]: the request lifecycle
//! - [`observability`]: Centralised tracing/logging initialisation
//! - [`GistError`] and [`Result`]: Shared error handling
//!
//! # Examples
//!
//! ```rust
//! use gist_common::{Operation, PageAddress, SummaryResult};
//!
//! let addr = PageAddress::from("https://x.test/a?page=2");
//! assert_eq!(addr.as_str(), "https://x.test/a?page=2");
//! assert_eq!(Operation::Crawl.path(), "crawl");
//!
//! let minimal: SummaryResult = serde_json::from_str(r#"{"summary":"Hi."}"#).unwrap();
//! assert!(minimal.keywords.is_empty() && minimal.top_links.is_empty());
//! ```
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod observability;

/// Full address of the page being summarized.
///
/// Used verbatim as the cache key; no normalization is applied, so
/// `https://a.test/?x=1` and `https://a.test/?x=2` are distinct pages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageAddress(String);

impl PageAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PageAddress {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PageAddress {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for PageAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw markup read out of a page. Created per request, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupPayload(String);

impl MarkupPayload {
    pub fn new(html: impl Into<String>) -> Self {
        Self(html.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whitespace-only markup counts as empty.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Result of the `summarize` operation.
///
/// A minimal responder only returns `summary`; the lists then decode as empty.
/// This is also the stored shape of a cache entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub summary: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub top_links: Vec<String>,
}

/// What the result cache holds for a page.
pub type CacheEntry = SummaryResult;

/// Result of the `crawl` operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlResult {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub top_links: Vec<String>,
}

/// Typed answer of the remote service for either operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteResult {
    Summary(SummaryResult),
    Crawl(CrawlResult),
}

impl RemoteResult {
    pub fn operation(&self) -> Operation {
        match self {
            RemoteResult::Summary(_) => Operation::Summarize,
            RemoteResult::Crawl(_) => Operation::Crawl,
        }
    }
}

/// The two kinds of work the remote service performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Summarize,
    Crawl,
}

impl Operation {
    pub const ALL: [Operation; 2] = [Operation::Summarize, Operation::Crawl];

    /// Endpoint path relative to the service base URL.
    pub fn path(&self) -> &'static str {
        match self {
            Operation::Summarize => "summarize",
            Operation::Crawl => "crawl",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Which path carries the remote call for a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerSource {
    /// The control surface calls the service itself.
    #[default]
    Direct,
    /// The markup is handed to the privileged relay which calls the service.
    Relay,
}

/// Lifecycle of one operation within a control-surface session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

/// Error types used across pagegist.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GistError {
    /// The page context did not yield any markup.
    #[error("extraction unavailable: {0}")]
    ExtractionUnavailable(String),

    /// The network exchange with the service could not complete.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// The service answered with an error status or an unreadable body.
    #[error("remote failure: {0}")]
    RemoteFailure(String),

    /// The result cache backend failed.
    #[error("cache error: {0}")]
    Cache(String),

    /// Configuration was incomplete or invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl GistError {
    /// Text shown on the control surface in place of the loading indicator.
    pub fn user_message(&self) -> &'static str {
        match self {
            GistError::ExtractionUnavailable(_) => "Error: Could not read this page's content.",
            GistError::TransportFailure(_) | GistError::RemoteFailure(_) => {
                "Error: Could not connect to the summarization server."
            }
            GistError::Cache(_) => "Error: The result cache is unavailable.",
            GistError::Config(_) => "Error: pagegist is not configured correctly.",
        }
    }
}

/// Convenient alias for results that use [`GistError`].
pub type Result<T> = std::result::Result<T, GistError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_decodes_full_service_body() {
        let body = r#"{"summary":"Hi.","keywords":["hi"],"top_links":["https://x.test/b"]}"#;
        let got: SummaryResult = serde_json::from_str(body).unwrap();
        assert_eq!(got.summary, "Hi.");
        assert_eq!(got.keywords, vec!["hi"]);
        assert_eq!(got.top_links, vec!["https://x.test/b"]);
    }

    #[test]
    fn crawl_body_requires_nothing_but_tolerates_missing_lists() {
        let got: CrawlResult = serde_json::from_str("{}").unwrap();
        assert_eq!(got, CrawlResult::default());
    }

    #[test]
    fn page_address_is_not_normalized() {
        let a = PageAddress::from("https://x.test/a?q=1");
        let b = PageAddress::from("https://x.test/a?q=2");
        assert_ne!(a, b);
        assert_eq!(serde_json::to_string(&a).unwrap(), r#""https://x.test/a?q=1""#);
    }

    #[test]
    fn whitespace_markup_is_empty() {
        assert!(MarkupPayload::new("  \n\t").is_empty());
        assert!(!MarkupPayload::new("<html></html>").is_empty());
    }

    #[test]
    fn network_and_status_failures_share_user_text() {
        let t = GistError::TransportFailure("refused".into());
        let r = GistError::RemoteFailure("500".into());
        assert_eq!(t.user_message(), r.user_message());
        assert_ne!(
            GistError::ExtractionUnavailable("none".into()).user_message(),
            t.user_message()
        );
    }
}
