use crate::traits::RemoteClient;
use async_trait::async_trait;
use gist_common::{
    CrawlResult, GistError, MarkupPayload, Operation, PageAddress, RemoteResult, Result,
    SummaryResult,
};
use gist_http::{HttpClient, HttpError, RequestOpts};
use serde::Serialize;
use std::time::Duration;

/// Body of both `POST /summarize` and `POST /crawl`.
#[derive(Debug, Serialize)]
pub struct PageRequest<'a> {
    pub html: &'a str,
    pub url: &'a str,
}

/// HTTP client for the summarization service.
pub struct ServiceClient {
    client: HttpClient,
    endpoint: String,
}

impl ServiceClient {
    pub fn new(endpoint: &str) -> Result<Self> {
        let client = HttpClient::new(endpoint)
            .map_err(|e| GistError::Config(format!("invalid service endpoint: {e}")))?;
        Ok(Self {
            endpoint: client.base().to_string(),
            client,
        })
    }

    /// Override the transport's default total timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = self.client.with_timeout(timeout);
        self
    }
}

#[async_trait]
impl RemoteClient for ServiceClient {
    async fn submit(
        &self,
        op: Operation,
        markup: &MarkupPayload,
        address: &PageAddress,
    ) -> Result<RemoteResult> {
        if markup.is_empty() {
            return Err(GistError::ExtractionUnavailable(format!(
                "empty markup for {address}"
            )));
        }

        let req = PageRequest {
            html: markup.as_str(),
            url: address.as_str(),
        };
        tracing::debug!(
            %op,
            %address,
            markup_len = markup.len(),
            endpoint = %self.endpoint,
            "remote.submit"
        );

        let result = match op {
            Operation::Summarize => self
                .client
                .post_json::<_, SummaryResult>(op.path(), &req, RequestOpts::default())
                .await
                .map(RemoteResult::Summary),
            Operation::Crawl => self
                .client
                .post_json::<_, CrawlResult>(op.path(), &req, RequestOpts::default())
                .await
                .map(RemoteResult::Crawl),
        };

        result.map_err(|e| {
            let status = e.status().map(|s| s.as_u16());
            let err = http_to_gist(e);
            tracing::warn!(%op, %address, ?status, error = %err, "remote.submit.failed");
            err
        })
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn http_to_gist(e: HttpError) -> GistError {
    if e.is_transport() {
        GistError::TransportFailure(e.to_string())
    } else {
        GistError::RemoteFailure(e.to_string())
    }
}
