//! Chat transport port and its Telegram adapter.

mod mapper;
mod telegram;

pub use mapper::map_update;
pub use telegram::TelegramTransport;

use crate::error::Result;

/// Text sent back to a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// `text` is MarkdownV2 rather than plain text.
    pub markdown: bool,
}

impl Reply {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markdown: false,
        }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markdown: true,
        }
    }
}

/// What the relay needs from the chat platform.
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_reply(&self, chat_id: i64, reply: Reply) -> Result<()>;

    /// Current profile picture of a user. Fails when the user has none.
    async fn fetch_profile_picture(&self, user_id: i64) -> Result<Vec<u8>>;

    async fn register_webhook(&self, url: &str, secret_token: &str) -> Result<()>;

    /// Advertises the supported commands in the chat client's menu.
    async fn register_commands(&self) -> Result<()>;

    async fn delete_webhook(&self) -> Result<()>;

    /// Username of the authorized bot account.
    async fn whoami(&self) -> Result<String>;
}
