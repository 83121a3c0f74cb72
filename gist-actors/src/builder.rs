use crate::actor::{
    spawn_actor_reserved, spawn_actor_with_shutdown, Actor, ActorHandle, Addr, Reserved,
};
use crate::system::{ActorSystem, ShutdownHandle};
use anyhow::Result;
use std::any::Any;
use std::collections::HashMap;

/// Wires the pagegist contexts together and owns their tasks.
///
/// Contexts that reference each other (the control surface and the relay)
/// are reserved first so both addresses exist before either task starts.
pub struct Builder {
    sys: ActorSystem,
    addrs: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        Self {
            sys: ActorSystem::new(),
            addrs: HashMap::new(),
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.sys.shutdown_handle()
    }

    /// Reserve an actor and publish its `Addr` under `name`.
    pub fn reserve<A>(&mut self, name: &str, mailbox: usize) -> Reserved<A>
    where
        A: Actor,
        Addr<A>: Send + Sync,
    {
        let r = spawn_actor_reserved::<A>(name.to_string(), mailbox);
        self.addrs.insert(name.to_string(), Box::new(r.addr()));
        r
    }

    /// Start a previously reserved actor and track its task.
    pub fn start_reserved<A: Actor>(&mut self, r: Reserved<A>, actor: A) -> &mut Self {
        let shutdown_rx = self.sys.shutdown_notifier();
        let name = r.name().to_string();
        let h = r.start_with_shutdown(actor, Some(shutdown_rx));
        tracing::debug!(actor = %name, "builder.started");
        self.track(h);
        self
    }

    /// Spawn an actor and publish its `Addr` under `name`.
    pub fn spawn<A, F>(&mut self, name: &str, mailbox: usize, new: F) -> &mut Self
    where
        A: Actor,
        F: FnOnce() -> A,
        Addr<A>: Send + Sync,
    {
        let shutdown_rx = self.sys.shutdown_notifier();
        let h: ActorHandle<A> = spawn_actor_with_shutdown(new(), mailbox, Some(shutdown_rx));
        self.addrs.insert(name.to_string(), Box::new(h.addr.clone()));
        tracing::debug!(actor = %name, "builder.spawned");
        self.track(h);
        self
    }

    /// Typed address lookup by name.
    pub fn addr<A: Actor>(&self, name: &str) -> Option<Addr<A>> {
        self.addrs
            .get(name)
            .and_then(|b| b.downcast_ref::<Addr<A>>().cloned())
    }

    fn track<A: Actor>(&mut self, h: ActorHandle<A>) {
        self.sys.track(async move {
            h.task.await??;
            Ok(())
        });
    }

    pub async fn graceful_shutdown(mut self) -> Result<()> {
        self.addrs.clear();
        self.sys.graceful_shutdown().await
    }

    /// Block until CTRL-C or a [`ShutdownHandle::signal`], then shut down.
    ///
    /// Subscribes before returning, so a signal sent right after this call is seen.
    pub fn run_until_ctrl_c(self) -> impl std::future::Future<Output = Result<()>> + Send {
        let mut shutdown_rx = self.sys.shutdown_notifier();
        async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("builder.ctrl_c");
                }
                _ = shutdown_rx.recv() => {}
            }
            self.graceful_shutdown().await
        }
    }
}
