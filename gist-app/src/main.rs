use anyhow::{Context as _, Result};
use clap::Parser;
use console::{ConsoleRenderer, run_console, spawn_stdin_reader};
use gist_actors::PageMsg;
use gist_common::observability::{LogConfig, init_logging};
use gist_config::{GistConfig, GistConfigLoader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tether::{Tether, Wired, build_from_config};
mod command;
mod console;
mod tether;

/// Summarize the page you are looking at.
#[derive(Debug, Parser)]
#[command(name = "pagegist", version)]
struct Args {
    /// YAML config file; defaults to ./pagegist.yaml when present.
    #[arg(long, env = "PAGEGIST_CONFIG")]
    config: Option<PathBuf>,
    /// Summarization service base URL (overrides config).
    #[arg(long)]
    endpoint: Option<String>,
    /// Page to make active on start.
    #[arg(long)]
    open: Option<String>,
    /// Local markup for the `--open` page instead of fetching it.
    #[arg(long, requires = "open")]
    html: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<GistConfig> {
    let loader = match &args.config {
        Some(path) => GistConfigLoader::new().with_file(path),
        None => GistConfigLoader::new().with_optional_file("pagegist.yaml"),
    };
    let mut cfg = loader.load().context("loading configuration")?;
    if let Some(endpoint) = &args.endpoint {
        cfg.service.endpoint = endpoint.clone();
    }
    Ok(cfg)
}

fn log_config(cfg: &GistConfig) -> Result<LogConfig> {
    Ok(LogConfig {
        log_dir: cfg.logging.dir.as_ref().map(PathBuf::from),
        emit_stderr: cfg.logging.stderr,
        format: cfg.logging.format.parse().map_err(anyhow::Error::msg)?,
        default_filter: cfg.logging.filter.clone(),
        ..LogConfig::default()
    })
}

/// Make `url` the active page, registering local markup for it first.
async fn open_initial(wired: &Wired, url: &str, html: Option<&Path>) -> Result<()> {
    if let Some(file) = html {
        let markup = std::fs::read_to_string(file)
            .with_context(|| format!("cannot read {}", file.display()))?;
        wired.pages.insert(url.into(), markup);
    }
    wired
        .page
        .send(PageMsg::Navigate {
            address: url.into(),
        })
        .await
        .map_err(|_| anyhow::anyhow!("page context is not running"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1) Config (env wins), 2) logging from config, 3) wiring.
    let cfg = load_config(&args)?;
    let log_path = init_logging(log_config(&cfg)?)?;
    tracing::info!(log = %log_path.display(), endpoint = %cfg.service.endpoint, "pagegist.start");

    let mut tether = Tether::new();
    let wired = build_from_config(&mut tether, &cfg, Arc::new(ConsoleRenderer)).await?;

    if let Some(url) = &args.open {
        open_initial(&wired, url, args.html.as_deref()).await?;
    }

    let shutdown = tether.shutdown_handle();
    let run = tether.run();
    let console = tokio::spawn(run_console(spawn_stdin_reader(), wired, shutdown));

    run.await?;
    console.await??;
    tracing::info!("pagegist.stop");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_requires_open() {
        assert!(Args::try_parse_from(["pagegist", "--html", "a.html"]).is_err());
        let args =
            Args::try_parse_from(["pagegist", "--open", "https://x.test/a", "--html", "a.html"])
                .unwrap();
        assert_eq!(args.open.as_deref(), Some("https://x.test/a"));
    }

    #[test]
    fn endpoint_flag_overrides_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pagegist.yaml");
        std::fs::write(&path, "service:\n  endpoint: \"http://from-file:5000/\"\n").unwrap();
        let args = Args::try_parse_from([
            "pagegist",
            "--config",
            path.to_str().unwrap(),
            "--endpoint",
            "http://from-flag:7000/",
        ])
        .unwrap();
        let cfg = load_config(&args).unwrap();
        assert_eq!(cfg.service.endpoint, "http://from-flag:7000/");
    }

    #[tokio::test]
    async fn open_reports_a_stopped_page_context() {
        use gist_actors::actor::spawn_actor_reserved;
        use gist_actors::{MarkupSource, PageActor, StaticPages, SurfaceActor};

        let page = spawn_actor_reserved::<PageActor>("page", 1);
        let surface = spawn_actor_reserved::<SurfaceActor>("surface", 1);
        let wired = Wired {
            surface: surface.addr(),
            page: page.addr(),
            pages: Arc::new(StaticPages::new()),
        };
        drop(page);

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.html");
        std::fs::write(&file, "<p>a</p>").unwrap();
        let err = open_initial(&wired, "https://x.test/a", Some(&file))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "page context is not running");
        assert!(wired.pages.markup(&"https://x.test/a".into()).await.is_ok());
    }

    #[test]
    fn bad_log_format_is_rejected() {
        let mut cfg = GistConfig::default();
        cfg.logging.format = "xml".into();
        assert!(log_config(&cfg).is_err());
    }
}
