use anyhow::{Context as _, Result};
use gist_actors::{
    FetchPages, MemoryCache, PageActor, RelayActor, RenderSink, ResultCache, SqliteCache,
    StaticPages, SurfaceActor, actor::Addr, builder::Builder, system::ShutdownHandle,
};
use gist_config::{CacheBackend, GistConfig};
use gist_remote::{RemoteClient, ServiceClient};
use std::sync::Arc;

pub const PAGE: &str = "page:main";
pub const RELAY: &str = "relay:main";
pub const SURFACE: &str = "surface:main";

pub struct Tether {
    builder: Builder,
}

impl Default for Tether {
    fn default() -> Self {
        Self::new()
    }
}

impl Tether {
    pub fn new() -> Self {
        Self {
            builder: Builder::new(),
        }
    }
    pub fn builder_mut(&mut self) -> &mut Builder {
        &mut self.builder
    }
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.builder.shutdown_handle()
    }
    /// Resolves after CTRL-C or a shutdown signal, once every context has stopped.
    pub fn run(self) -> impl Future<Output = Result<()>> + Send {
        self.builder.run_until_ctrl_c()
    }
}

/// Handles the console needs after wiring.
#[derive(Clone)]
pub struct Wired {
    pub surface: Addr<SurfaceActor>,
    pub page: Addr<PageActor>,
    /// Markup registered from local files; anything else is fetched.
    pub pages: Arc<StaticPages>,
}

async fn make_cache(cfg: &GistConfig) -> Result<Arc<dyn ResultCache>> {
    match cfg.cache.backend {
        CacheBackend::Memory => Ok(Arc::new(MemoryCache::new())),
        CacheBackend::Sqlite => {
            let path = cfg.cache.resolved_path();
            let cache = SqliteCache::open(&path)
                .await
                .with_context(|| format!("opening cache at {}", path.display()))?;
            Ok(Arc::new(cache))
        }
    }
}

fn make_remote(cfg: &GistConfig) -> Result<Arc<dyn RemoteClient>> {
    let mut client = ServiceClient::new(&cfg.service.endpoint)?;
    if let Some(t) = cfg.service.timeout() {
        client = client.with_timeout(t);
    }
    Ok(Arc::new(client))
}

pub async fn build_from_config(
    t: &mut Tether,
    cfg: &GistConfig,
    sink: Arc<dyn RenderSink>,
) -> Result<Wired> {
    let remote = make_remote(cfg)?;
    let cache = make_cache(cfg).await?;
    let fetch = FetchPages::new(cfg.service.timeout())?;
    let pages = Arc::new(StaticPages::with_fallback(Arc::new(fetch)));
    let mailbox = cfg.surface.mailbox;

    let b = t.builder_mut();

    // Reserve first so every address exists before any context runs.
    let r_page = b.reserve::<PageActor>(PAGE, mailbox);
    let r_relay = b.reserve::<RelayActor>(RELAY, mailbox);
    let r_surface = b.reserve::<SurfaceActor>(SURFACE, mailbox);
    let page = r_page.addr();
    let relay = r_relay.addr();
    let surface = r_surface.addr();

    b.start_reserved(r_page, PageActor::new(pages.clone()));
    b.start_reserved(r_relay, RelayActor::new(remote.clone()));
    b.start_reserved(
        r_surface,
        SurfaceActor::new(page.clone(), remote.clone(), cache, sink)
            .with_relay(relay)
            .with_extraction_timeout(cfg.surface.extraction_timeout()),
    );

    tracing::info!(
        endpoint = %remote.endpoint(),
        cache = ?cfg.cache.backend,
        mailbox,
        "tether.wired"
    );

    Ok(Wired {
        surface,
        page,
        pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gist_actors::{SurfaceMsg, SurfaceView};
    use gist_config::GistConfigLoader;

    struct Quiet;
    impl RenderSink for Quiet {
        fn render(&self, _view: &SurfaceView) {}
    }

    #[tokio::test]
    async fn wires_all_three_contexts() {
        let cfg = GistConfigLoader::new()
            .with_yaml_str("surface:\n  mailbox: 4")
            .load()
            .unwrap();
        let mut t = Tether::new();
        let wired = build_from_config(&mut t, &cfg, Arc::new(Quiet)).await.unwrap();

        assert!(t.builder_mut().addr::<PageActor>(PAGE).is_some());
        assert!(t.builder_mut().addr::<RelayActor>(RELAY).is_some());
        assert_eq!(wired.surface.capacity(), 4);

        let view = wired
            .surface
            .ask(|reply| SurfaceMsg::Snapshot { reply })
            .await
            .unwrap();
        assert_eq!(view, SurfaceView::default());

        drop(wired);
        let shutdown = t.shutdown_handle();
        let run = t.run();
        shutdown.signal();
        run.await.unwrap();
    }

    #[tokio::test]
    async fn sqlite_backend_creates_its_file() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("cache.db");
        let yaml = format!("cache:\n  backend: sqlite\n  path: \"{}\"", db.display());
        let cfg = GistConfigLoader::new().with_yaml_str(&yaml).load().unwrap();

        let mut t = Tether::new();
        build_from_config(&mut t, &cfg, Arc::new(Quiet)).await.unwrap();
        assert!(db.exists());
    }
}
