use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::{upstream_error, Error};
use crate::external::{
    ChatCollaborator, DomainEvent, EventBus, Notification, NotificationSink, RatingSource,
    RatingSummary,
};

/// HTTP client for the downstream collaborator services (notifications,
/// chat, ratings, realtime fanout), all reachable under one base URL.
#[derive(Debug)]
pub struct WebhookClient {
    base: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct CreateRoomResponse {
    room_id: Uuid,
}

impl WebhookClient {
    pub fn new(base: String) -> Self {
        Self {
            base,
            client: reqwest::Client::new(),
        }
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response, Error> {
        let url = format!("{}/{}", self.base, path);
        let res = self.client.post(url).json(&body).send().await?;

        if !res.status().is_success() {
            return Err(upstream_error());
        }

        Ok(res)
    }
}

#[async_trait]
impl NotificationSink for WebhookClient {
    #[tracing::instrument(skip(self))]
    async fn notify(&self, notification: Notification) -> Result<(), Error> {
        self.post("notifications", json!(notification)).await?;
        Ok(())
    }
}

#[async_trait]
impl ChatCollaborator for WebhookClient {
    #[tracing::instrument(skip(self))]
    async fn create_room(
        &self,
        ride_id: Uuid,
        name: String,
        creator_id: Uuid,
    ) -> Result<Uuid, Error> {
        let res = self
            .post(
                "chat/rooms",
                json!({
                    "ride_id": ride_id,
                    "name": name,
                    "participants": [creator_id],
                }),
            )
            .await?;

        let data: CreateRoomResponse = res.json().await?;
        Ok(data.room_id)
    }

    #[tracing::instrument(skip(self))]
    async fn add_participant(&self, room_id: Uuid, user_id: Uuid) -> Result<(), Error> {
        self.post(
            &format!("chat/rooms/{}/participants", room_id),
            json!({ "user_id": user_id }),
        )
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn remove_participant(&self, room_id: Uuid, user_id: Uuid) -> Result<(), Error> {
        self.post(
            &format!("chat/rooms/{}/participants/remove", room_id),
            json!({ "user_id": user_id }),
        )
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn post_system_message(&self, room_id: Uuid, text: &str) -> Result<(), Error> {
        self.post(
            &format!("chat/rooms/{}/messages", room_id),
            json!({ "type": "system", "message": text }),
        )
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn teardown_if_empty(
        &self,
        room_id: Uuid,
        min_participants: usize,
    ) -> Result<(), Error> {
        self.post(
            &format!("chat/rooms/{}/teardown", room_id),
            json!({ "min_participants": min_participants }),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RatingSource for WebhookClient {
    #[tracing::instrument(skip(self))]
    async fn average_for(
        &self,
        ride_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<RatingSummary>, Error> {
        let url = format!("{}/ratings/{}/{}", self.base, ride_id, user_id);
        let res = self.client.get(url).send().await?;

        if res.status().as_u16() == 404 {
            return Ok(None);
        }

        if !res.status().is_success() {
            return Err(upstream_error());
        }

        let summary: RatingSummary = res.json().await?;
        Ok(Some(summary))
    }
}

#[async_trait]
impl EventBus for WebhookClient {
    #[tracing::instrument(skip(self))]
    async fn publish(&self, event: DomainEvent) -> Result<(), Error> {
        self.post("events", json!(event)).await?;
        Ok(())
    }
}
