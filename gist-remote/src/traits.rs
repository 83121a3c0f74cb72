use async_trait::async_trait;
use gist_common::{
    CrawlResult, GistError, MarkupPayload, Operation, PageAddress, RemoteResult, Result,
    SummaryResult,
};

/// Remote summarization/crawling service as seen by the orchestrator.
///
/// Every call completes or fails exactly once and performs at most one
/// outbound exchange. Implementations never cache.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Submit page markup for `op`.
    ///
    /// Fails with `ExtractionUnavailable` for empty markup,
    /// `TransportFailure` when the exchange cannot complete and
    /// `RemoteFailure` for error statuses or unreadable bodies.
    async fn submit(
        &self,
        op: Operation,
        markup: &MarkupPayload,
        address: &PageAddress,
    ) -> Result<RemoteResult>;

    /// Endpoint this client talks to, for diagnostics.
    fn endpoint(&self) -> &str;

    async fn summarize(
        &self,
        markup: &MarkupPayload,
        address: &PageAddress,
    ) -> Result<SummaryResult> {
        match self.submit(Operation::Summarize, markup, address).await? {
            RemoteResult::Summary(s) => Ok(s),
            RemoteResult::Crawl(_) => Err(GistError::RemoteFailure(
                "crawl result returned for summarize".to_string(),
            )),
        }
    }

    async fn crawl(&self, markup: &MarkupPayload, address: &PageAddress) -> Result<CrawlResult> {
        match self.submit(Operation::Crawl, markup, address).await? {
            RemoteResult::Crawl(c) => Ok(c),
            RemoteResult::Summary(_) => Err(GistError::RemoteFailure(
                "summary result returned for crawl".to_string(),
            )),
        }
    }
}
