//! Line-oriented control surface on stdin/stdout.
use crate::command::{Command, HELP, parse_command};
use crate::tether::Wired;
use anyhow::{Context as _, Result};
use gist_actors::system::ShutdownHandle;
use gist_actors::{PageMsg, RenderSink, SurfaceMsg, SurfaceView};
use gist_common::{Operation, RequestState, TriggerSource};
use std::fmt::Write as _;
use std::io::BufRead;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Prints every view change.
pub struct ConsoleRenderer;

impl RenderSink for ConsoleRenderer {
    fn render(&self, view: &SurfaceView) {
        println!("{}", format_view(view));
    }
}

fn state_label(view: &SurfaceView, op: Operation) -> &'static str {
    match view.op(op).state {
        RequestState::Idle => "idle",
        RequestState::Loading => "loading...",
        RequestState::Success => "done",
        RequestState::Error => "error",
    }
}

pub fn format_view(view: &SurfaceView) -> String {
    let mut out = String::new();
    let page = view.address.as_ref().map(|a| a.as_str()).unwrap_or("-");
    let _ = writeln!(
        out,
        "[summarize: {}] [crawl: {}] {page}",
        state_label(view, Operation::Summarize),
        state_label(view, Operation::Crawl),
    );
    for op in Operation::ALL {
        if let Some(err) = &view.op(op).error {
            let _ = writeln!(out, "{err}");
        }
    }
    if !view.summary_text.is_empty() {
        let _ = writeln!(out, "Summary: {}", view.summary_text);
    }
    if !view.keywords.is_empty() {
        let _ = writeln!(out, "Keywords: {}", view.keywords.join(", "));
    }
    for (i, link) in view.top_links.iter().enumerate() {
        let _ = writeln!(out, "  {}. {link}", i + 1);
    }
    out.truncate(out.trim_end().len());
    out
}

/// Forward stdin lines from a plain thread so a pending read never holds the runtime open.
pub fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Dispatch commands until `/quit`, end of input, or a shutdown signal.
pub async fn run_console(
    mut lines: mpsc::Receiver<String>,
    wired: Wired,
    shutdown: ShutdownHandle,
) -> Result<()> {
    let mut shutdown_rx = shutdown.subscribe();
    println!("pagegist ready, /help for commands");
    loop {
        let line = tokio::select! {
            _ = shutdown_rx.recv() => break,
            line = lines.recv() => line,
        };
        let Some(line) = line else {
            debug!("console.eof");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        match dispatch(parse_command(&line), &wired).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => println!("{e:#}"),
        }
    }
    shutdown.signal();
    Ok(())
}

async fn dispatch(cmd: Command, wired: &Wired) -> Result<bool> {
    match cmd {
        Command::Open { url, file } => {
            if let Some(file) = file {
                let html = tokio::fs::read_to_string(&file)
                    .await
                    .with_context(|| format!("cannot read {}", file.display()))?;
                wired.pages.insert(url.as_str().into(), html);
            }
            info!(%url, "console.open");
            send(wired, PageMsg::Navigate { address: url.into() }).await?;
        }
        Command::Run(op, source) => trigger(wired, op, source).await?,
        Command::Start => {
            trigger(wired, Operation::Summarize, TriggerSource::Direct).await?;
            trigger(wired, Operation::Crawl, TriggerSource::Direct).await?;
        }
        Command::Show => {
            let view = wired
                .surface
                .ask(|reply| SurfaceMsg::Snapshot { reply })
                .await?;
            println!("{}", format_view(&view));
        }
        Command::Clear => {
            let cleared = wired
                .surface
                .ask(|reply| SurfaceMsg::ClearCache { reply })
                .await??;
            println!("cleared {cleared} cached page(s)");
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => return Ok(false),
        Command::Unknown(text) => println!("unknown command: {text} (try /help)"),
    }
    Ok(true)
}

async fn send(wired: &Wired, msg: PageMsg) -> Result<()> {
    wired
        .page
        .send(msg)
        .await
        .map_err(|_| anyhow::anyhow!("page context is not running"))
}

async fn trigger(wired: &Wired, op: Operation, source: TriggerSource) -> Result<()> {
    wired
        .surface
        .send(SurfaceMsg::Trigger { op, source })
        .await
        .map_err(|_| anyhow::anyhow!("control surface is not running"))
}
