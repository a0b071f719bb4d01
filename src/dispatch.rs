//! The single sequential consumer of inbound updates.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    commands::{Command, CommandInterpreter},
    config::Settings,
    hub::BroadcastSink,
    location::{LocationRouter, LocationUpdate},
    membership::{MembershipChange, MembershipWatcher},
    store::IdentityStore,
    transport::ChatTransport,
};

/// One category of work carried by a transport update.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Command { chat_id: i64, command: Command },
    Membership(MembershipChange),
    Location(LocationUpdate),
}

/// Everything one transport update asked for, in the order it was found.
pub type Batch = Vec<Inbound>;

pub struct Dispatcher {
    commands: CommandInterpreter,
    membership: MembershipWatcher,
    locations: LocationRouter,
    transport: Arc<dyn ChatTransport>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        transport: Arc<dyn ChatTransport>,
        sink: Arc<dyn BroadcastSink>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            commands: CommandInterpreter::new(store.clone(), settings.clone()),
            membership: MembershipWatcher::new(store.clone()),
            locations: LocationRouter::new(store, transport.clone(), sink, settings),
            transport,
        }
    }

    pub async fn handle(&self, inbound: Inbound) {
        match inbound {
            Inbound::Command { chat_id, command } => {
                let Some(reply) = self.commands.execute(chat_id, command).await else {
                    return;
                };
                if let Err(e) = self.transport.send_reply(chat_id, reply).await {
                    warn!(chat_id, "failed to send reply: {e}");
                }
            }
            Inbound::Membership(change) => self.membership.handle(change).await,
            Inbound::Location(update) => {
                self.locations.route(update).await;
            }
        }
    }

    /// Processes batches one at a time until `cancel` fires, then drains
    /// whatever was already accepted.
    pub async fn run(&self, mut rx: mpsc::Receiver<Batch>, cancel: CancellationToken) {
        info!("dispatch loop started");
        loop {
            let batch = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                batch = rx.recv() => batch,
            };
            let Some(batch) = batch else {
                break;
            };
            self.handle_batch(batch).await;
        }

        rx.close();
        let mut drained = 0usize;
        while let Some(batch) = rx.recv().await {
            self.handle_batch(batch).await;
            drained += 1;
        }
        info!(drained, "dispatch loop stopped");
    }

    async fn handle_batch(&self, batch: Batch) {
        debug!(events = batch.len(), "processing update");
        for inbound in batch {
            self.handle(inbound).await;
        }
    }
}
