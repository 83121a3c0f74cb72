//! The control surface: the orchestrator the user talks to.
//!
//! A trigger looks the active page up in the result cache and, on a miss,
//! runs extraction followed by the remote call in a spawned task. That task
//! (or the relay, on the relayed path) reports back with
//! [`SurfaceMsg::Completed`], which is the only place the cache is written and
//! the only way an operation leaves `Loading`.
//!
//! Each operation allows one request in flight. A trigger that arrives while
//! its operation is loading is dropped.
use crate::actor::{Actor, Addr, AskError, Context};
use crate::cache::ResultCache;
use crate::page::{request_markup, PageActor, PageMsg};
use crate::relay::{RelayActor, RelayMsg};
use anyhow::Result;
use async_trait::async_trait;
use gist_common::{
    GistError, Operation, PageAddress, RemoteResult, RequestState, TriggerSource,
};
use gist_remote::RemoteClient;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Per-operation slice of the view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationView {
    pub state: RequestState,
    /// Loading indicator.
    pub busy: bool,
    /// User-facing error text, set only in `Error`.
    pub error: Option<String>,
}

/// Everything the control surface shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurfaceView {
    pub address: Option<PageAddress>,
    pub summary: OperationView,
    pub crawl: OperationView,
    pub summary_text: String,
    pub keywords: Vec<String>,
    pub top_links: Vec<String>,
}

impl SurfaceView {
    pub fn op(&self, op: Operation) -> &OperationView {
        match op {
            Operation::Summarize => &self.summary,
            Operation::Crawl => &self.crawl,
        }
    }

    fn op_mut(&mut self, op: Operation) -> &mut OperationView {
        match op {
            Operation::Summarize => &mut self.summary,
            Operation::Crawl => &mut self.crawl,
        }
    }

    pub fn is_loading(&self, op: Operation) -> bool {
        self.op(op).state == RequestState::Loading
    }

    /// `idle | success | error -> loading`.
    pub fn begin(&mut self, op: Operation) {
        *self.op_mut(op) = OperationView {
            state: RequestState::Loading,
            busy: true,
            error: None,
        };
    }

    /// `loading -> success`, replacing whatever the result covers.
    pub fn succeed(&mut self, result: RemoteResult) {
        let op = result.operation();
        match result {
            RemoteResult::Summary(s) => {
                self.summary_text = s.summary;
                self.keywords = s.keywords;
                self.top_links = s.top_links;
            }
            RemoteResult::Crawl(c) => {
                self.keywords = c.keywords;
                self.top_links = c.top_links;
            }
        }
        *self.op_mut(op) = OperationView {
            state: RequestState::Success,
            busy: false,
            error: None,
        };
    }

    /// `loading -> error`. The lists are always blanked; a failed summary also
    /// loses its text.
    pub fn fail(&mut self, op: Operation, err: &GistError) {
        if op == Operation::Summarize {
            self.summary_text.clear();
        }
        self.keywords.clear();
        self.top_links.clear();
        *self.op_mut(op) = OperationView {
            state: RequestState::Error,
            busy: false,
            error: Some(err.user_message().to_string()),
        };
    }
}

/// Receives every view change; rendering itself is up to the implementor.
pub trait RenderSink: Send + Sync {
    fn render(&self, view: &SurfaceView);
}

pub enum SurfaceMsg {
    /// The user asked for `op` on the active page.
    Trigger { op: Operation, source: TriggerSource },
    /// Outcome of a pipeline, from the direct task or the relay.
    Completed {
        op: Operation,
        address: PageAddress,
        outcome: gist_common::Result<RemoteResult>,
    },
    /// Resolve once `op` is not loading.
    Watch {
        op: Operation,
        reply: oneshot::Sender<SurfaceView>,
    },
    Snapshot {
        reply: oneshot::Sender<SurfaceView>,
    },
    ClearCache {
        reply: oneshot::Sender<gist_common::Result<u64>>,
    },
}

pub struct SurfaceActor {
    page: Addr<PageActor>,
    relay: Option<Addr<RelayActor>>,
    remote: Arc<dyn RemoteClient>,
    cache: Arc<dyn ResultCache>,
    sink: Arc<dyn RenderSink>,
    extraction_timeout: Duration,
    view: SurfaceView,
    watchers: HashMap<Operation, Vec<oneshot::Sender<SurfaceView>>>,
}

impl SurfaceActor {
    pub fn new(
        page: Addr<PageActor>,
        remote: Arc<dyn RemoteClient>,
        cache: Arc<dyn ResultCache>,
        sink: Arc<dyn RenderSink>,
    ) -> Self {
        Self {
            page,
            relay: None,
            remote,
            cache,
            sink,
            extraction_timeout: Duration::from_millis(2000),
            view: SurfaceView::default(),
            watchers: HashMap::new(),
        }
    }

    pub fn with_relay(mut self, relay: Addr<RelayActor>) -> Self {
        self.relay = Some(relay);
        self
    }

    pub fn with_extraction_timeout(mut self, timeout: Duration) -> Self {
        self.extraction_timeout = timeout;
        self
    }

    fn render(&self) {
        self.sink.render(&self.view);
    }

    fn notify(&mut self, op: Operation) {
        if let Some(waiting) = self.watchers.remove(&op) {
            for tx in waiting {
                let _ = tx.send(self.view.clone());
            }
        }
    }

    fn finish(&mut self, op: Operation, outcome: gist_common::Result<RemoteResult>) {
        match outcome {
            Ok(result) => self.view.succeed(result),
            Err(e) => {
                warn!(%op, error = %e, "surface.request.failed");
                self.view.fail(op, &e);
            }
        }
        self.render();
        self.notify(op);
    }

    async fn trigger(&mut self, op: Operation, source: TriggerSource, ctx: &Context<Self>) {
        if self.view.is_loading(op) {
            info!(%op, "surface.trigger.ignored");
            return;
        }
        self.view.begin(op);
        self.render();

        let asked = tokio::time::timeout(
            self.extraction_timeout,
            self.page.ask(|reply| PageMsg::ActiveAddress { reply }),
        )
        .await;
        let Ok(Ok(Some(address))) = asked else {
            self.view.address = None;
            let e = GistError::ExtractionUnavailable("no active page".into());
            self.finish(op, Err(e));
            return;
        };
        self.view.address = Some(address.clone());
        info!(%op, %address, ?source, "surface.trigger");

        if op == Operation::Summarize {
            match self.cache.lookup(&address).await {
                Ok(Some(entry)) => {
                    debug!(%address, "surface.cache.hit");
                    self.finish(op, Ok(RemoteResult::Summary(entry)));
                    return;
                }
                Ok(None) => debug!(%address, "surface.cache.miss"),
                Err(e) => warn!(%address, error = %e, "surface.cache.lookup_failed"),
            }
        }

        let Some(me) = ctx.addr() else {
            warn!(%op, "surface.trigger.detached");
            let e = GistError::TransportFailure("control surface is shutting down".into());
            self.finish(op, Err(e));
            return;
        };
        let relay = match source {
            TriggerSource::Relay if self.relay.is_none() => {
                warn!(%op, "surface.relay.missing");
                None
            }
            TriggerSource::Relay => self.relay.clone(),
            TriggerSource::Direct => None,
        };
        tokio::spawn(run_pipeline(Pipeline {
            op,
            address,
            page: self.page.clone(),
            extraction_timeout: self.extraction_timeout,
            remote: self.remote.clone(),
            relay,
            me,
        }));
    }

    async fn completed(
        &mut self,
        op: Operation,
        address: PageAddress,
        outcome: gist_common::Result<RemoteResult>,
    ) {
        if !self.view.is_loading(op) {
            debug!(%op, %address, "surface.completed.stale");
            return;
        }
        let outcome = outcome.and_then(|r| {
            if r.operation() == op {
                Ok(r)
            } else {
                Err(GistError::RemoteFailure(format!(
                    "{} result for {op}",
                    r.operation()
                )))
            }
        });
        if let Ok(RemoteResult::Summary(summary)) = &outcome {
            if let Err(e) = self.cache.store(&address, summary).await {
                warn!(%address, error = %e, "surface.cache.store_failed");
            }
        }
        self.finish(op, outcome);
    }
}

struct Pipeline {
    op: Operation,
    address: PageAddress,
    page: Addr<PageActor>,
    extraction_timeout: Duration,
    remote: Arc<dyn RemoteClient>,
    relay: Option<Addr<RelayActor>>,
    me: Addr<SurfaceActor>,
}

/// Extraction, then the remote call (here or in the relay). Always ends in
/// exactly one `Completed` for the surface.
async fn run_pipeline(p: Pipeline) {
    let Pipeline {
        op,
        address,
        page,
        extraction_timeout,
        remote,
        relay,
        me,
    } = p;

    let markup = match request_markup(&page, &address, extraction_timeout).await {
        Ok(m) => m,
        Err(e) => {
            report(&me, op, address, Err(e)).await;
            return;
        }
    };

    match relay {
        Some(relay) => {
            let msg = RelayMsg::FetchHtml {
                op,
                address,
                markup,
                reply_to: me,
            };
            if let Err(RelayMsg::FetchHtml {
                address, reply_to, ..
            }) = relay.send(msg).await
            {
                let e = GistError::TransportFailure("relay is not running".into());
                report(&reply_to, op, address, Err(e)).await;
            }
        }
        None => {
            let outcome = remote.submit(op, &markup, &address).await;
            report(&me, op, address, outcome).await;
        }
    }
}

async fn report(
    me: &Addr<SurfaceActor>,
    op: Operation,
    address: PageAddress,
    outcome: gist_common::Result<RemoteResult>,
) {
    let msg = SurfaceMsg::Completed {
        op,
        address,
        outcome,
    };
    if me.send(msg).await.is_err() {
        debug!(%op, "surface.completed.dropped");
    }
}

#[async_trait]
impl Actor for SurfaceActor {
    type Msg = SurfaceMsg;

    async fn handle(&mut self, msg: Self::Msg, ctx: &mut Context<Self>) -> Result<()> {
        match msg {
            SurfaceMsg::Trigger { op, source } => self.trigger(op, source, ctx).await,
            SurfaceMsg::Completed {
                op,
                address,
                outcome,
            } => self.completed(op, address, outcome).await,
            SurfaceMsg::Watch { op, reply } => {
                if self.view.is_loading(op) {
                    let entry = self.watchers.entry(op).or_default();
                    entry.retain(|tx| !tx.is_closed());
                    entry.push(reply);
                } else {
                    let _ = reply.send(self.view.clone());
                }
            }
            SurfaceMsg::Snapshot { reply } => {
                let _ = reply.send(self.view.clone());
            }
            SurfaceMsg::ClearCache { reply } => {
                let res = self
                    .cache
                    .clear()
                    .await
                    .map_err(|e| GistError::Cache(e.to_string()));
                info!(cleared = ?res.as_ref().ok(), "surface.cache.clear");
                let _ = reply.send(res);
            }
        }
        Ok(())
    }
}

/// Trigger `op` and wait until it settles, returning the resulting view.
pub async fn run_operation(
    surface: &Addr<SurfaceActor>,
    op: Operation,
    source: TriggerSource,
) -> std::result::Result<SurfaceView, AskError> {
    surface
        .send(SurfaceMsg::Trigger { op, source })
        .await
        .map_err(|_| AskError::Closed)?;
    surface.ask(|reply| SurfaceMsg::Watch { op, reply }).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use gist_common::{CrawlResult, SummaryResult};

    fn summary() -> RemoteResult {
        RemoteResult::Summary(SummaryResult {
            summary: "Hi.".into(),
            keywords: vec!["hi".into()],
            top_links: vec!["https://x.test/b".into()],
        })
    }

    #[test]
    fn begin_shows_busy_and_clears_error() {
        let mut v = SurfaceView::default();
        v.begin(Operation::Summarize);
        v.fail(Operation::Summarize, &GistError::RemoteFailure("500".into()));
        v.begin(Operation::Summarize);
        assert_eq!(v.summary.state, RequestState::Loading);
        assert!(v.summary.busy);
        assert!(v.summary.error.is_none());
        assert_eq!(v.crawl, OperationView::default());
    }

    #[test]
    fn each_failure_kind_blanks_the_lists() {
        let errors = [
            GistError::ExtractionUnavailable("none".into()),
            GistError::TransportFailure("refused".into()),
            GistError::RemoteFailure("500".into()),
        ];
        for err in errors {
            let mut v = SurfaceView::default();
            v.begin(Operation::Summarize);
            v.succeed(summary());
            v.begin(Operation::Summarize);
            v.fail(Operation::Summarize, &err);
            assert_eq!(v.summary.state, RequestState::Error);
            assert!(!v.summary.busy);
            assert_eq!(v.summary.error.as_deref(), Some(err.user_message()));
            assert!(v.summary_text.is_empty());
            assert!(v.keywords.is_empty() && v.top_links.is_empty());
        }
    }

    #[test]
    fn crawl_failure_keeps_summary_text() {
        let mut v = SurfaceView::default();
        v.begin(Operation::Summarize);
        v.succeed(summary());
        v.begin(Operation::Crawl);
        v.fail(Operation::Crawl, &GistError::TransportFailure("x".into()));
        assert_eq!(v.summary_text, "Hi.");
        assert_eq!(v.summary.state, RequestState::Success);
        assert!(v.keywords.is_empty());
    }

    #[test]
    fn crawl_success_replaces_lists_only() {
        let mut v = SurfaceView::default();
        v.begin(Operation::Summarize);
        v.succeed(summary());
        v.begin(Operation::Crawl);
        v.succeed(RemoteResult::Crawl(CrawlResult {
            keywords: vec!["a".into(), "b".into()],
            top_links: vec![],
        }));
        assert_eq!(v.crawl.state, RequestState::Success);
        assert_eq!(v.summary_text, "Hi.");
        assert_eq!(v.keywords, vec!["a", "b"]);
        assert!(v.top_links.is_empty());
    }
}
