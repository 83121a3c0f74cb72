//! Task tracking and cooperative shutdown for the pagegist contexts.
//!
//! Every actor task is held in one `JoinSet`; a broadcast channel tells all of
//! them to drain and exit. Errors from any task surface from
//! [`ActorSystem::graceful_shutdown`].
use anyhow::Result;
use tokio::{sync::broadcast, task::JoinSet};

/// Cloneable trigger for a global shutdown, handed to input loops.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: broadcast::Sender<()>,
}

impl ShutdownHandle {
    pub fn signal(&self) {
        let _ = self.tx.send(());
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }
}

pub struct ActorSystem {
    tasks: JoinSet<Result<()>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Default for ActorSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl ActorSystem {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(8);
        Self {
            tasks: JoinSet::new(),
            shutdown_tx,
        }
    }

    pub fn shutdown_notifier(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    pub fn track(&mut self, fut: impl std::future::Future<Output = Result<()>> + Send + 'static) {
        self.tasks.spawn(fut);
    }

    /// Signal every actor and wait for all of them; the first task error wins.
    pub async fn graceful_shutdown(mut self) -> Result<()> {
        let _ = self.shutdown_tx.send(());
        tracing::debug!(tasks = self.tasks.len(), "system.shutdown");
        let mut first_err = None;
        while let Some(res) = self.tasks.join_next().await {
            let outcome = res.map_err(anyhow::Error::from).and_then(|r| r);
            if let Err(e) = outcome {
                tracing::warn!(error = ?e, "system.task_failed");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shutdown_reaches_every_subscriber() {
        let mut sys = ActorSystem::new();
        for _ in 0..3 {
            let mut rx = sys.shutdown_notifier();
            sys.track(async move {
                rx.recv().await?;
                Ok(())
            });
        }
        sys.graceful_shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn task_errors_surface_on_shutdown() {
        let mut sys = ActorSystem::new();
        sys.track(async { anyhow::bail!("boom") });
        let err = sys.graceful_shutdown().await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
