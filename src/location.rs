//! Fan-out of shared locations to the subscribers of the sender's group.

use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    config::Settings,
    error::Result,
    hub::{BroadcastSink, channel_path},
    store::IdentityStore,
    transport::ChatTransport,
};

/// Upper bound on a profile picture download; past it the location goes
/// out without a picture.
const PICTURE_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// A new or edited message carrying a location.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationUpdate {
    pub chat_id: i64,
    pub user_id: i64,
    pub display_name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Unix seconds of the message.
    pub date: i64,
}

/// What viewers of a subscription receive. Never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationEvent {
    pub user_id: i64,
    pub display_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: i64,
    pub picture_url: Option<String>,
}

#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    user_location: UserLocation<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    picture: Option<&'a str>,
}

#[derive(Serialize)]
struct UserLocation<'a> {
    id: i64,
    name: &'a str,
    lat: f64,
    lng: f64,
    date: i64,
}

impl LocationEvent {
    pub fn to_json(&self) -> Result<String> {
        let envelope = Envelope {
            kind: "user_location",
            user_location: UserLocation {
                id: self.user_id,
                name: &self.display_name,
                lat: self.latitude,
                lng: self.longitude,
                date: self.timestamp,
            },
            picture: self.picture_url.as_deref(),
        };
        Ok(serde_json::to_string(&envelope)?)
    }
}

pub struct LocationRouter {
    store: Arc<dyn IdentityStore>,
    transport: Arc<dyn ChatTransport>,
    sink: Arc<dyn BroadcastSink>,
    settings: Arc<Settings>,
}

impl LocationRouter {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        transport: Arc<dyn ChatTransport>,
        sink: Arc<dyn BroadcastSink>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            store,
            transport,
            sink,
            settings,
        }
    }

    /// Broadcasts `update` to its group's subscribers. Returns how many
    /// viewers got it; updates from groups without a subscription are
    /// dropped.
    pub async fn route(&self, update: LocationUpdate) -> usize {
        let chat_id = update.chat_id;
        let secret = match self.store.secret(chat_id).await {
            Ok(Some(secret)) => secret,
            Ok(None) => {
                debug!(chat_id, "location from chat without subscription");
                return 0;
            }
            Err(e) => {
                warn!(chat_id, "failed to look up subscription: {e}");
                return 0;
            }
        };

        let picture_url = if self.settings.fetch_user_pic {
            self.picture_handle(update.user_id)
                .await
                .map(|handle| self.settings.picture_url(&handle))
        } else {
            None
        };

        let event = LocationEvent {
            user_id: update.user_id,
            display_name: update.display_name,
            latitude: update.latitude,
            longitude: update.longitude,
            timestamp: update.date,
            picture_url,
        };

        let payload = match event.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(chat_id, "dropping location event: {e}");
                return 0;
            }
        };

        let delivered = self.sink.publish(&channel_path(&secret), payload);
        debug!(chat_id, user_id = event.user_id, delivered, "location broadcast");
        delivered
    }

    /// Handle of the sender's cached picture, fetching it on first sight.
    /// Any failure just means no picture.
    async fn picture_handle(&self, user_id: i64) -> Option<String> {
        match self.store.profile_by_id(user_id).await {
            Ok(Some(profile)) => return Some(profile.handle),
            Ok(None) => {}
            Err(e) => {
                warn!(user_id, "failed to look up profile: {e}");
                return None;
            }
        }

        let fetch = self.transport.fetch_profile_picture(user_id);
        let picture = match tokio::time::timeout(PICTURE_FETCH_TIMEOUT, fetch).await {
            Ok(Ok(picture)) => picture,
            Ok(Err(e)) => {
                debug!(user_id, "no profile picture: {e}");
                return None;
            }
            Err(_) => {
                warn!(user_id, "profile picture fetch timed out");
                return None;
            }
        };

        match self.store.upsert_profile(user_id, picture).await {
            Ok(profile) => Some(profile.handle),
            Err(e) => {
                warn!(user_id, "failed to cache profile picture: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(picture_url: Option<&str>) -> LocationEvent {
        LocationEvent {
            user_id: 42,
            display_name: "ann".to_owned(),
            latitude: 48.5,
            longitude: 2.25,
            timestamp: 1_700_000_000,
            picture_url: picture_url.map(str::to_owned),
        }
    }

    #[test]
    fn envelope_matches_wire_format() {
        let json: serde_json::Value =
            serde_json::from_str(&event(Some("https://e.org/pic/h")).to_json().unwrap()).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "type": "user_location",
                "user_location": {
                    "id": 42,
                    "name": "ann",
                    "lat": 48.5,
                    "lng": 2.25,
                    "date": 1_700_000_000
                },
                "picture": "https://e.org/pic/h"
            })
        );
    }

    #[test]
    fn picture_field_is_omitted_when_absent() {
        let payload = event(None).to_json().unwrap();
        let json: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert!(json.get("picture").is_none());
    }
}
