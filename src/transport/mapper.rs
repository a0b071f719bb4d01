//! Maps Telegram updates into the relay's inbound events.

use teloxide::types::{ChatMemberKind, ChatMemberUpdated, Message, Update, UpdateKind, User};
use tracing::warn;

use crate::{
    commands::Command,
    dispatch::{Batch, Inbound},
    location::LocationUpdate,
    membership::MembershipChange,
};

/// Every category found in `update`. Categories are checked independently;
/// update kinds the relay does not care about map to an empty batch.
pub fn map_update(update: &Update, bot_name: &str) -> Batch {
    let mut batch = Batch::new();
    match &update.kind {
        UpdateKind::Message(msg) => {
            if let Some(command) = command(msg, bot_name) {
                batch.push(command);
            }
            if let Some(location) = location(msg) {
                batch.push(Inbound::Location(location));
            }
        }
        UpdateKind::EditedMessage(msg) => {
            if let Some(location) = location(msg) {
                batch.push(Inbound::Location(location));
            }
        }
        UpdateKind::MyChatMember(change) => batch.push(Inbound::Membership(membership(change))),
        _ => {}
    }
    batch
}

fn command(msg: &Message, bot_name: &str) -> Option<Inbound> {
    let command = Command::parse(msg.text()?, bot_name)?;
    Some(Inbound::Command {
        chat_id: msg.chat.id.0,
        command,
    })
}

fn location(msg: &Message) -> Option<LocationUpdate> {
    let location = msg.location()?;
    let user = msg.from.as_ref()?;
    let Ok(user_id) = i64::try_from(user.id.0) else {
        warn!(user_id = user.id.0, "user id out of range, location dropped");
        return None;
    };
    Some(LocationUpdate {
        chat_id: msg.chat.id.0,
        user_id,
        display_name: display_name(user),
        latitude: location.latitude,
        longitude: location.longitude,
        date: msg.date.timestamp(),
    })
}

fn display_name(user: &User) -> String {
    user.username
        .clone()
        .unwrap_or_else(|| user.first_name.clone())
}

fn membership(change: &ChatMemberUpdated) -> MembershipChange {
    MembershipChange {
        chat_id: change.chat.id.0,
        private: change.chat.is_private(),
        removed: is_removed(&change.new_chat_member.kind),
    }
}

/// Left the chat, kicked from it, or blocked in a private chat.
fn is_removed(kind: &ChatMemberKind) -> bool {
    kind.is_left() || kind.is_banned()
}
