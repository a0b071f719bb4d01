//! Group commands: `/help`, `/stream [secret]` and `/stop`.

use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use crate::{config::Settings, store::IdentityStore, transport::Reply};

pub const HELP_TEXT: &str = "I understand /stream [secret] and /stop";
pub const STOPPED_TEXT: &str = "Stop sharing locations";
const FAILED_TEXT: &str = "Something went wrong, please try again later";

/// Commands advertised in the client's command menu.
pub const ADVERTISED: [(&str, &str); 3] = [
    ("stream", "Start streaming location shared in the group"),
    ("stop", "Stop current location sharing from the group"),
    ("help", "Give some help, maybe"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    /// Raw argument text, not yet sanitized.
    Stream(String),
    Stop,
    Unknown(String),
}

impl Command {
    /// Parses a `/word[@bot] args` message. Returns `None` when `text` is not
    /// a command or is addressed to a bot other than `bot_name`.
    pub fn parse(text: &str, bot_name: &str) -> Option<Self> {
        let rest = text.strip_prefix('/')?;
        let (head, args) = match rest.find(char::is_whitespace) {
            Some(at) => (&rest[..at], &rest[at..]),
            None => (rest, ""),
        };

        let word = match head.split_once('@') {
            Some((word, target)) if target.eq_ignore_ascii_case(bot_name) => word,
            Some(_) => return None,
            None => head,
        };
        if word.is_empty() {
            return None;
        }

        Some(match word.to_lowercase().as_str() {
            "help" => Self::Help,
            "stream" => Self::Stream(args.to_owned()),
            "stop" => Self::Stop,
            _ => Self::Unknown(word.to_owned()),
        })
    }
}

/// Turns a `/stream` argument into a secret that is safe as one URL path
/// segment. An empty argument yields a freshly generated secret.
pub fn sanitize_secret(arg: &str) -> String {
    let cleaned: String = arg.trim().chars().filter(|c| !matches!(c, '.' | '/')).collect();
    match cleaned.split_whitespace().next() {
        Some(token) => token.to_owned(),
        None => Uuid::new_v4().to_string(),
    }
}

pub struct CommandInterpreter {
    store: Arc<dyn IdentityStore>,
    settings: Arc<Settings>,
}

impl CommandInterpreter {
    pub fn new(store: Arc<dyn IdentityStore>, settings: Arc<Settings>) -> Self {
        Self { store, settings }
    }

    /// Applies `command` to the chat's subscription. `None` means the command
    /// is not ours and gets no reply.
    pub async fn execute(&self, chat_id: i64, command: Command) -> Option<Reply> {
        match command {
            Command::Help => Some(Reply::plain(HELP_TEXT)),
            Command::Stream(arg) => Some(self.stream(chat_id, &arg).await),
            Command::Stop => Some(self.stop(chat_id).await),
            Command::Unknown(_) => None,
        }
    }

    async fn stream(&self, chat_id: i64, arg: &str) -> Reply {
        let secret = sanitize_secret(arg);
        match self.store.upsert_subscription(chat_id, &secret).await {
            Ok(subscription) => {
                info!(chat_id, "location sharing started");
                let url = self.settings.subscription_url(&subscription.secret);
                Reply::markdown(format!(
                    "Start sharing to {}",
                    teloxide::utils::markdown::code_inline(&url)
                ))
            }
            Err(e) => {
                error!(chat_id, "failed to store subscription: {e}");
                Reply::plain(FAILED_TEXT)
            }
        }
    }

    async fn stop(&self, chat_id: i64) -> Reply {
        match self.store.delete_subscription(chat_id).await {
            Ok(()) => {
                info!(chat_id, "location sharing stopped");
                Reply::plain(STOPPED_TEXT)
            }
            Err(e) => {
                error!(chat_id, "failed to delete subscription: {e}");
                Reply::plain(FAILED_TEXT)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    #[test]
    fn parses_known_commands() {
        assert_eq!(Command::parse("/help", "locbot"), Some(Command::Help));
        assert_eq!(Command::parse("/stop", "locbot"), Some(Command::Stop));
        assert_eq!(
            Command::parse("/stream  my secret", "locbot"),
            Some(Command::Stream("  my secret".to_owned()))
        );
        assert_eq!(
            Command::parse("/stream", "locbot"),
            Some(Command::Stream(String::new()))
        );
    }

    #[test]
    fn bot_mentions_are_checked() {
        assert_eq!(Command::parse("/stop@LocBot", "locbot"), Some(Command::Stop));
        assert_eq!(Command::parse("/stop@otherbot", "locbot"), None);
    }

    #[test]
    fn unregistered_commands_are_unknown() {
        assert_eq!(
            Command::parse("/start", "locbot"),
            Some(Command::Unknown("start".to_owned()))
        );
        assert_eq!(Command::parse("hello", "locbot"), None);
        assert_eq!(Command::parse("/", "locbot"), None);
    }

    #[test]
    fn sanitize_strips_traversal_and_keeps_first_token() {
        assert_eq!(sanitize_secret("../../x y"), "x");
        assert_eq!(sanitize_secret("  abc  "), "abc");
        assert_eq!(sanitize_secret("a.b/c\td"), "abc");
    }

    #[test]
    fn empty_argument_generates_fresh_secret() {
        let a = sanitize_secret("");
        let b = sanitize_secret("   ");
        let c = sanitize_secret("./");

        assert!(!a.is_empty());
        assert!(!b.is_empty());
        assert_ne!(a, b);
        assert_ne!(b, c);
    }

    async fn interpreter() -> (CommandInterpreter, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let settings = Arc::new(Settings::new("t", "https://example.org"));
        (CommandInterpreter::new(store.clone(), settings), store)
    }

    #[tokio::test]
    async fn stream_stores_secret_and_replies_with_url() {
        let (interpreter, store) = interpreter().await;

        let reply = interpreter
            .execute(-5, Command::Stream(" ../club house".to_owned()))
            .await
            .unwrap();

        assert!(reply.markdown);
        assert!(reply.text.contains("https://example.org/sub/club"));
        assert_eq!(store.secret(-5).await.unwrap().as_deref(), Some("club"));
    }

    #[tokio::test]
    async fn stop_removes_subscription() {
        let (interpreter, store) = interpreter().await;
        store.upsert_subscription(-5, "club").await.unwrap();

        let reply = interpreter.execute(-5, Command::Stop).await.unwrap();

        assert_eq!(reply, Reply::plain(STOPPED_TEXT));
        assert_eq!(store.secret(-5).await.unwrap(), None);
    }

    #[tokio::test]
    async fn help_and_unknown_do_not_touch_state() {
        let (interpreter, store) = interpreter().await;
        store.upsert_subscription(-5, "club").await.unwrap();

        assert_eq!(
            interpreter.execute(-5, Command::Help).await,
            Some(Reply::plain(HELP_TEXT))
        );
        assert_eq!(
            interpreter.execute(-5, Command::Unknown("start".to_owned())).await,
            None
        );
        assert_eq!(store.secret(-5).await.unwrap().as_deref(), Some("club"));
    }
}
