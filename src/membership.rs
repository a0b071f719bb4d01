//! Revokes a chat's state once the bot is removed from it or blocked.

use std::sync::Arc;

use tracing::{info, warn};

use crate::store::IdentityStore;

/// The bot's own membership in a chat changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MembershipChange {
    pub chat_id: i64,
    /// One-to-one chat, whose id is also the user's id.
    pub private: bool,
    /// The new status is a terminal one (left, kicked or blocked).
    pub removed: bool,
}

pub struct MembershipWatcher {
    store: Arc<dyn IdentityStore>,
}

impl MembershipWatcher {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, change: MembershipChange) {
        if !change.removed {
            return;
        }
        let chat_id = change.chat_id;

        if let Err(e) = self.store.delete_subscription(chat_id).await {
            warn!(chat_id, "failed to revoke subscription: {e}");
        }
        if change.private {
            if let Err(e) = self.store.delete_profile(chat_id).await {
                warn!(chat_id, "failed to forget profile: {e}");
            }
        }
        info!(chat_id, private = change.private, "removed from chat");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    async fn seeded() -> (MembershipWatcher, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        store.upsert_subscription(77, "s").await.unwrap();
        store.upsert_profile(77, vec![1]).await.unwrap();
        (MembershipWatcher::new(store.clone()), store)
    }

    #[tokio::test]
    async fn private_removal_forgets_subscription_and_profile() {
        let (watcher, store) = seeded().await;

        let change = MembershipChange {
            chat_id: 77,
            private: true,
            removed: true,
        };
        watcher.handle(change).await;
        watcher.handle(change).await;

        assert_eq!(store.secret(77).await.unwrap(), None);
        assert_eq!(store.profile_by_id(77).await.unwrap(), None);
    }

    #[tokio::test]
    async fn group_removal_keeps_profile() {
        let (watcher, store) = seeded().await;

        watcher
            .handle(MembershipChange {
                chat_id: 77,
                private: false,
                removed: true,
            })
            .await;

        assert_eq!(store.secret(77).await.unwrap(), None);
        assert!(store.profile_by_id(77).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn non_terminal_change_is_ignored() {
        let (watcher, store) = seeded().await;

        watcher
            .handle(MembershipChange {
                chat_id: 77,
                private: true,
                removed: false,
            })
            .await;

        assert_eq!(store.secret(77).await.unwrap().as_deref(), Some("s"));
    }
}
