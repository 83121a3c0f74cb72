//! The page context: knows which page is active and hands out its markup.
use crate::actor::{Actor, Addr, Context};
use anyhow::{bail, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use gist_common::{GistError, MarkupPayload, PageAddress};
use gist_http::{HttpClient, RequestOpts};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Where a page's raw markup comes from.
#[async_trait]
pub trait MarkupSource: Send + Sync {
    async fn markup(&self, address: &PageAddress) -> Result<String>;
}

/// Markup registered ahead of time, e.g. from local files.
#[derive(Default)]
pub struct StaticPages {
    pages: DashMap<PageAddress, String>,
    fallback: Option<Arc<dyn MarkupSource>>,
}

impl StaticPages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consult `fallback` for addresses that were never inserted.
    pub fn with_fallback(fallback: Arc<dyn MarkupSource>) -> Self {
        Self {
            pages: DashMap::new(),
            fallback: Some(fallback),
        }
    }

    pub fn insert(&self, address: PageAddress, html: impl Into<String>) {
        self.pages.insert(address, html.into());
    }
}

#[async_trait]
impl MarkupSource for StaticPages {
    async fn markup(&self, address: &PageAddress) -> Result<String> {
        if let Some(html) = self.pages.get(address) {
            return Ok(html.value().clone());
        }
        match &self.fallback {
            Some(f) => f.markup(address).await,
            None => bail!("no markup registered for {address}"),
        }
    }
}

/// Reads markup by issuing a GET for the page address itself.
pub struct FetchPages {
    client: HttpClient,
}

impl FetchPages {
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        // Every request is absolute; the base only satisfies the client.
        let mut client = HttpClient::new("http://localhost/")?;
        if let Some(t) = timeout {
            client = client.with_timeout(t);
        }
        Ok(Self { client })
    }
}

#[async_trait]
impl MarkupSource for FetchPages {
    async fn markup(&self, address: &PageAddress) -> Result<String> {
        let opts = RequestOpts {
            allow_absolute: true,
            ..RequestOpts::default()
        };
        Ok(self.client.get_text(address.as_str(), opts).await?)
    }
}

pub enum PageMsg {
    /// The user moved to another page.
    Navigate { address: PageAddress },
    ActiveAddress {
        reply: oneshot::Sender<Option<PageAddress>>,
    },
    /// `None` when `address` is no longer the active page or it has nothing
    /// to offer.
    GetHtml {
        address: PageAddress,
        reply: oneshot::Sender<Option<MarkupPayload>>,
    },
}

pub struct PageActor {
    active: Option<PageAddress>,
    source: Arc<dyn MarkupSource>,
}

impl PageActor {
    pub fn new(source: Arc<dyn MarkupSource>) -> Self {
        Self {
            active: None,
            source,
        }
    }

    pub fn with_active(mut self, address: PageAddress) -> Self {
        self.active = Some(address);
        self
    }
}

#[async_trait]
impl Actor for PageActor {
    type Msg = PageMsg;

    async fn handle(&mut self, msg: Self::Msg, _ctx: &mut Context<Self>) -> Result<()> {
        match msg {
            PageMsg::Navigate { address } => {
                info!(%address, "page.navigate");
                self.active = Some(address);
            }
            PageMsg::ActiveAddress { reply } => {
                let _ = reply.send(self.active.clone());
            }
            PageMsg::GetHtml { address, reply } => {
                if self.active.as_ref() != Some(&address) {
                    debug!(%address, active = ?self.active, "page.get_html.stale");
                    let _ = reply.send(None);
                    return Ok(());
                }
                let source = self.source.clone();
                tokio::spawn(async move {
                    let payload = match source.markup(&address).await {
                        Ok(html) => Some(MarkupPayload::new(html)).filter(|m| !m.is_empty()),
                        Err(e) => {
                            warn!(%address, error = %e, "page.get_html.failed");
                            None
                        }
                    };
                    debug!(%address, found = payload.is_some(), "page.get_html");
                    if reply.send(payload).is_err() {
                        debug!("page.get_html.reply_dropped");
                    }
                });
            }
        }
        Ok(())
    }
}

/// One `getHTML` round trip for `address`. A missing listener, a dropped
/// reply, a timeout, a page that moved on and empty markup all come back as
/// `ExtractionUnavailable`.
pub async fn request_markup(
    page: &Addr<PageActor>,
    address: &PageAddress,
    timeout: Duration,
) -> gist_common::Result<MarkupPayload> {
    let ask = page.ask(|reply| PageMsg::GetHtml {
        address: address.clone(),
        reply,
    });
    let asked = tokio::time::timeout(timeout, ask).await;
    match asked {
        Ok(Ok(Some(markup))) if !markup.is_empty() => Ok(markup),
        Ok(Ok(_)) => Err(GistError::ExtractionUnavailable("page returned no markup".into())),
        Ok(Err(e)) => Err(GistError::ExtractionUnavailable(format!("page context: {e}"))),
        Err(_) => Err(GistError::ExtractionUnavailable(format!(
            "no answer within {}ms",
            timeout.as_millis()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::spawn_actor;

    struct Never;

    #[async_trait]
    impl MarkupSource for Never {
        async fn markup(&self, _address: &PageAddress) -> Result<String> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn static_pages_prefer_registered_markup() {
        let fallback = Arc::new(StaticPages::new());
        fallback.insert(PageAddress::from("https://x.test/b"), "<p>b</p>");
        let pages = StaticPages::with_fallback(fallback);
        pages.insert(PageAddress::from("https://x.test/a"), "<p>a</p>");

        assert_eq!(pages.markup(&"https://x.test/a".into()).await.unwrap(), "<p>a</p>");
        assert_eq!(pages.markup(&"https://x.test/b".into()).await.unwrap(), "<p>b</p>");
        assert!(pages.markup(&"https://x.test/c".into()).await.is_err());
    }

    #[tokio::test]
    async fn get_html_follows_navigation() {
        let pages = Arc::new(StaticPages::new());
        pages.insert(PageAddress::from("https://x.test/a"), "<html>hi</html>");
        let h = spawn_actor(PageActor::new(pages), 8);

        let a = PageAddress::from("https://x.test/a");
        let err = request_markup(&h.addr, &a, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, GistError::ExtractionUnavailable(_)));

        h.addr
            .send(PageMsg::Navigate {
                address: "https://x.test/a".into(),
            })
            .await
            .ok();
        let markup = request_markup(&h.addr, &a, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(markup.as_str(), "<html>hi</html>");

        let active = h.addr.ask(|reply| PageMsg::ActiveAddress { reply }).await.unwrap();
        assert_eq!(active, Some(PageAddress::from("https://x.test/a")));
    }

    #[tokio::test]
    async fn blank_markup_is_unavailable() {
        let pages = Arc::new(StaticPages::new());
        pages.insert(PageAddress::from("https://x.test/a"), "   \n");
        let h = spawn_actor(
            PageActor::new(pages).with_active("https://x.test/a".into()),
            8,
        );
        let err = request_markup(&h.addr, &"https://x.test/a".into(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, GistError::ExtractionUnavailable(_)));
    }

    #[tokio::test]
    async fn markup_for_a_page_left_behind_is_unavailable() {
        let pages = Arc::new(StaticPages::new());
        pages.insert(PageAddress::from("https://x.test/a"), "<a>");
        pages.insert(PageAddress::from("https://x.test/b"), "<b>");
        let h = spawn_actor(
            PageActor::new(pages).with_active("https://x.test/a".into()),
            8,
        );
        h.addr
            .send(PageMsg::Navigate {
                address: "https://x.test/b".into(),
            })
            .await
            .ok();

        let err = request_markup(&h.addr, &"https://x.test/a".into(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, GistError::ExtractionUnavailable(_)));
        let b = request_markup(&h.addr, &"https://x.test/b".into(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(b.as_str(), "<b>");
    }

    #[tokio::test]
    async fn slow_page_times_out() {
        let h = spawn_actor(
            PageActor::new(Arc::new(Never)).with_active("https://x.test/a".into()),
            8,
        );
        let err = request_markup(&h.addr, &"https://x.test/a".into(), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("50ms"));
    }
}
