//! The privileged relay: receives extracted markup from the control surface,
//! performs the remote call and answers with a `displaySummary`-style
//! [`SurfaceMsg::Completed`].
use crate::actor::{Actor, Addr, Context};
use crate::surface::{SurfaceActor, SurfaceMsg};
use anyhow::Result;
use async_trait::async_trait;
use gist_common::{MarkupPayload, Operation, PageAddress};
use gist_remote::RemoteClient;
use std::sync::Arc;
use tracing::{debug, info};

pub enum RelayMsg {
    FetchHtml {
        op: Operation,
        address: PageAddress,
        markup: MarkupPayload,
        reply_to: Addr<SurfaceActor>,
    },
}

pub struct RelayActor {
    remote: Arc<dyn RemoteClient>,
}

impl RelayActor {
    pub fn new(remote: Arc<dyn RemoteClient>) -> Self {
        Self { remote }
    }
}

#[async_trait]
impl Actor for RelayActor {
    type Msg = RelayMsg;

    async fn handle(&mut self, msg: Self::Msg, _ctx: &mut Context<Self>) -> Result<()> {
        match msg {
            RelayMsg::FetchHtml {
                op,
                address,
                markup,
                reply_to,
            } => {
                info!(%op, %address, endpoint = %self.remote.endpoint(), "relay.fetch_html");
                let remote = self.remote.clone();
                tokio::spawn(async move {
                    let outcome = remote.submit(op, &markup, &address).await;
                    debug!(%op, %address, ok = outcome.is_ok(), "relay.display_summary");
                    let reply = SurfaceMsg::Completed {
                        op,
                        address,
                        outcome,
                    };
                    if reply_to.send(reply).await.is_err() {
                        debug!("relay.display_summary.dropped");
                    }
                });
            }
        }
        Ok(())
    }
}
