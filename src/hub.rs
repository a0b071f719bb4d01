//! In-process publish/subscribe hub behind the `/sub/<secret>` streams.
//!
//! One `broadcast` channel per subscription path, created when the first
//! viewer connects and pruned once nobody listens. Nothing is retained for
//! viewers that connect later.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, trace};

/// Prefix shared by every subscription path.
pub const SUB_PREFIX: &str = "/sub/";

/// Path a subscription's events are published on.
pub fn channel_path(secret: &str) -> String {
    format!("{SUB_PREFIX}{secret}")
}

/// Receives serialized location events for a subscription path.
pub trait BroadcastSink: Send + Sync {
    /// Returns how many subscribers the payload was handed to.
    fn publish(&self, path: &str, payload: String) -> usize;
}

#[derive(Debug, PartialEq, Eq)]
pub struct HubFull {
    pub limit: usize,
}

pub struct SseHub {
    channels: RwLock<HashMap<String, broadcast::Sender<String>>>,
    capacity: usize,
    /// Maximum subscribers per path, `0` for no cap.
    limit: usize,
}

impl SseHub {
    pub fn new(capacity: usize, limit: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            limit,
        }
    }

    pub fn subscribe(self: &Arc<Self>, path: &str) -> Result<Listener, HubFull> {
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);

        let rx = match channels.get(path) {
            Some(tx) if self.limit > 0 && tx.receiver_count() >= self.limit => {
                return Err(HubFull { limit: self.limit });
            }
            Some(tx) => tx.subscribe(),
            None => {
                let (tx, rx) = broadcast::channel(self.capacity);
                channels.insert(path.to_owned(), tx);
                debug!(channels = channels.len(), "opened subscription channel");
                rx
            }
        };

        Ok(Listener {
            rx: Some(rx),
            path: path.to_owned(),
            hub: Arc::clone(self),
        })
    }

    pub fn subscribers(&self, path: &str) -> usize {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Drops every channel; open streams see the end of their channel.
    pub fn close(&self) {
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        debug!(channels = channels.len(), "closing subscription channels");
        channels.clear();
    }

    fn prune(&self, path: &str) {
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        if channels.get(path).is_some_and(|tx| tx.receiver_count() == 0) {
            channels.remove(path);
        }
    }
}

/// One viewer's end of a subscription channel. Dropping the last listener of
/// a path removes its channel from the hub.
pub struct Listener {
    rx: Option<broadcast::Receiver<String>>,
    path: String,
    hub: Arc<SseHub>,
}

impl Listener {
    pub async fn recv(&mut self) -> Result<String, RecvError> {
        match self.rx.as_mut() {
            Some(rx) => rx.recv().await,
            None => Err(RecvError::Closed),
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        // The receiver must be gone before the count is checked.
        drop(self.rx.take());
        self.hub.prune(&self.path);
    }
}

impl BroadcastSink for SseHub {
    fn publish(&self, path: &str, payload: String) -> usize {
        let sent = {
            let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
            channels.get(path).map(|tx| tx.send(payload))
        };

        match sent {
            Some(Ok(delivered)) => delivered,
            Some(Err(_)) => {
                self.prune(path);
                0
            }
            None => {
                trace!("no subscribers on path");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hub(limit: usize) -> Arc<SseHub> {
        Arc::new(SseHub::new(8, limit))
    }

    fn channel_count(hub: &SseHub) -> usize {
        hub.channels.read().unwrap().len()
    }

    #[test]
    fn channel_path_uses_sub_prefix() {
        assert_eq!(channel_path("abc"), "/sub/abc");
    }

    #[test]
    fn publish_without_subscribers_delivers_nothing() {
        let hub = hub(0);
        assert_eq!(hub.publish("/sub/x", "hi".to_owned()), 0);
        assert_eq!(channel_count(&hub), 0);
    }

    #[tokio::test]
    async fn every_subscriber_of_a_path_gets_the_event() {
        let hub = hub(0);
        let mut a = hub.subscribe("/sub/x").unwrap();
        let mut b = hub.subscribe("/sub/x").unwrap();
        let _other = hub.subscribe("/sub/y").unwrap();

        assert_eq!(hub.publish("/sub/x", "hi".to_owned()), 2);
        assert_eq!(a.recv().await.unwrap(), "hi");
        assert_eq!(b.recv().await.unwrap(), "hi");
        assert_eq!(hub.publish("/sub/y", "yo".to_owned()), 1);
    }

    #[test]
    fn channel_is_removed_with_its_last_listener() {
        let hub = hub(0);
        let a = hub.subscribe("/sub/x").unwrap();
        let b = hub.subscribe("/sub/x").unwrap();

        drop(a);
        assert_eq!(hub.subscribers("/sub/x"), 1);
        assert_eq!(channel_count(&hub), 1);

        drop(b);
        assert_eq!(channel_count(&hub), 0);
    }

    #[test]
    fn abandoned_paths_do_not_accumulate() {
        let hub = hub(0);
        for n in 0..1000 {
            drop(hub.subscribe(&format!("/sub/guess{n}")).unwrap());
        }
        assert_eq!(channel_count(&hub), 0);
    }

    #[test]
    fn limit_caps_concurrent_subscribers() {
        let hub = hub(2);
        let _a = hub.subscribe("/sub/x").unwrap();
        let b = hub.subscribe("/sub/x").unwrap();

        assert_eq!(hub.subscribe("/sub/x").err(), Some(HubFull { limit: 2 }));
        assert!(hub.subscribe("/sub/y").is_ok());

        drop(b);
        assert!(hub.subscribe("/sub/x").is_ok());
    }

    #[tokio::test]
    async fn close_ends_open_streams() {
        let hub = hub(0);
        let mut listener = hub.subscribe("/sub/x").unwrap();

        hub.close();
        assert!(matches!(listener.recv().await, Err(RecvError::Closed)));
        assert_eq!(hub.subscribers("/sub/x"), 0);
    }
}
