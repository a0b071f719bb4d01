//! Bot API adapter for the chat transport port.

use teloxide::{
    net::Download,
    prelude::*,
    types::{AllowedUpdate, BotCommand, ChatId, ParseMode, UserId},
};
use tracing::{info, warn};

use crate::{
    commands::ADVERTISED,
    error::{Error, Result},
};

use super::{ChatTransport, Reply};

#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            bot: Bot::new(token),
        }
    }
}

fn telegram_user(user_id: i64) -> Result<UserId> {
    u64::try_from(user_id)
        .map(UserId)
        .map_err(|_| Error::Transport(format!("invalid user id {user_id}")))
}

#[async_trait::async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_reply(&self, chat_id: i64, reply: Reply) -> Result<()> {
        let request = self.bot.send_message(ChatId(chat_id), reply.text);
        if reply.markdown {
            request.parse_mode(ParseMode::MarkdownV2).await?;
        } else {
            request.await?;
        }
        Ok(())
    }

    async fn fetch_profile_picture(&self, user_id: i64) -> Result<Vec<u8>> {
        let photos = self
            .bot
            .get_user_profile_photos(telegram_user(user_id)?)
            .limit(1)
            .await?;

        let photo = photos
            .photos
            .first()
            .and_then(|sizes| sizes.first())
            .ok_or_else(|| Error::Transport(format!("user {user_id} has no profile photo")))?;

        let file = self.bot.get_file(photo.file.id.clone()).await?;
        let mut buf = Vec::new();
        self.bot.download_file(&file.path, &mut buf).await?;
        Ok(buf)
    }

    async fn register_webhook(&self, url: &str, secret_token: &str) -> Result<()> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| Error::Transport(format!("invalid webhook url: {e}")))?;

        self.bot
            .set_webhook(url)
            .secret_token(secret_token.to_owned())
            .allowed_updates(vec![
                AllowedUpdate::Message,
                AllowedUpdate::EditedMessage,
                AllowedUpdate::MyChatMember,
            ])
            .await?;

        let webhook = self.bot.get_webhook_info().await?;
        info!(pending = webhook.pending_update_count, "webhook registered");
        if let Some(message) = webhook.last_error_message {
            warn!("previous webhook delivery failed: {message}");
        }
        Ok(())
    }

    async fn register_commands(&self) -> Result<()> {
        let commands = ADVERTISED
            .iter()
            .map(|(command, description)| BotCommand::new(*command, *description))
            .collect::<Vec<_>>();
        self.bot.set_my_commands(commands).await?;
        Ok(())
    }

    async fn delete_webhook(&self) -> Result<()> {
        self.bot.delete_webhook().drop_pending_updates(true).await?;
        Ok(())
    }

    async fn whoami(&self) -> Result<String> {
        let me = self.bot.get_me().await?;
        Ok(me.username().to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_user_id_is_rejected() {
        assert_eq!(telegram_user(42).unwrap(), UserId(42));
        assert!(matches!(telegram_user(-1), Err(Error::Transport(_))));
    }
}
