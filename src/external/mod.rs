mod webhook;

pub use webhook::WebhookClient;

use std::env;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Fire-and-forget user notification delivery. Failures never affect ride
/// state; the engine logs and moves on.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), Error>;
}

/// The messaging collaborator. Called after membership changes commit.
#[async_trait]
pub trait ChatCollaborator: Send + Sync {
    async fn create_room(
        &self,
        ride_id: Uuid,
        name: String,
        creator_id: Uuid,
    ) -> Result<Uuid, Error>;

    async fn add_participant(&self, room_id: Uuid, user_id: Uuid) -> Result<(), Error>;

    async fn remove_participant(&self, room_id: Uuid, user_id: Uuid) -> Result<(), Error>;

    async fn post_system_message(&self, room_id: Uuid, text: &str) -> Result<(), Error>;

    /// Tears the room down once fewer than `min_participants` remain.
    async fn teardown_if_empty(&self, room_id: Uuid, min_participants: usize)
        -> Result<(), Error>;
}

/// Read-only rating aggregates used to enrich participant listings.
#[async_trait]
pub trait RatingSource: Send + Sync {
    async fn average_for(
        &self,
        ride_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<RatingSummary>, Error>;
}

/// Best-effort broadcast of domain events for live clients.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: DomainEvent) -> Result<(), Error>;
}

#[derive(Clone, Debug, Serialize)]
pub struct Notification {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub ride_id: Option<Uuid>,
    pub message: String,
}

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    General,
    Join,
    Kick,
    Finish,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RatingSummary {
    pub average: f64,
    pub count: i64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    RideCreated {
        ride_id: Uuid,
        creator_id: Uuid,
        chat_room_id: Option<Uuid>,
    },
    RideUpdated {
        ride_id: Uuid,
    },
    RideJoined {
        ride_id: Uuid,
        user_id: Uuid,
        seat_booked: i32,
    },
    UserLeft {
        ride_id: Uuid,
        user_id: Uuid,
    },
    KickVoteStarted {
        ride_id: Uuid,
        target_user_id: Uuid,
        current_votes: usize,
        required_votes: usize,
    },
    UserKicked {
        ride_id: Uuid,
        user_id: Uuid,
        reason: String,
    },
    RideFinished {
        ride_id: Uuid,
        user_id: Uuid,
    },
    RideCancelled {
        ride_id: Uuid,
    },
    OwnershipTransferProposed {
        ride_id: Uuid,
        current_creator_id: Uuid,
        proposed_creator_id: Uuid,
    },
}

/// The engine's outward-facing dependencies, injected at construction.
#[derive(Clone)]
pub struct Collaborators {
    pub notifications: Arc<dyn NotificationSink>,
    pub chat: Arc<dyn ChatCollaborator>,
    pub ratings: Arc<dyn RatingSource>,
    pub events: Arc<dyn EventBus>,
}

impl Collaborators {
    /// Webhook-backed collaborators when COLLAB_WEBHOOK_BASE is set,
    /// otherwise inert ones.
    pub fn from_env() -> Self {
        match env::var("COLLAB_WEBHOOK_BASE") {
            Ok(base) => {
                let client = Arc::new(WebhookClient::new(base));
                Self {
                    notifications: client.clone(),
                    chat: client.clone(),
                    ratings: client.clone(),
                    events: client,
                }
            }
            Err(_) => Self::disconnected(),
        }
    }

    pub fn disconnected() -> Self {
        let noop = Arc::new(NoopCollaborator);
        Self {
            notifications: noop.clone(),
            chat: noop.clone(),
            ratings: noop.clone(),
            events: noop,
        }
    }
}

/// Inert implementation for running without downstream services.
pub struct NoopCollaborator;

#[async_trait]
impl NotificationSink for NoopCollaborator {
    async fn notify(&self, _notification: Notification) -> Result<(), Error> {
        Ok(())
    }
}

#[async_trait]
impl ChatCollaborator for NoopCollaborator {
    async fn create_room(
        &self,
        _ride_id: Uuid,
        _name: String,
        _creator_id: Uuid,
    ) -> Result<Uuid, Error> {
        Ok(Uuid::new_v4())
    }

    async fn add_participant(&self, _room_id: Uuid, _user_id: Uuid) -> Result<(), Error> {
        Ok(())
    }

    async fn remove_participant(&self, _room_id: Uuid, _user_id: Uuid) -> Result<(), Error> {
        Ok(())
    }

    async fn post_system_message(&self, _room_id: Uuid, _text: &str) -> Result<(), Error> {
        Ok(())
    }

    async fn teardown_if_empty(
        &self,
        _room_id: Uuid,
        _min_participants: usize,
    ) -> Result<(), Error> {
        Ok(())
    }
}

#[async_trait]
impl RatingSource for NoopCollaborator {
    async fn average_for(
        &self,
        _ride_id: Uuid,
        _user_id: Uuid,
    ) -> Result<Option<RatingSummary>, Error> {
        Ok(None)
    }
}

#[async_trait]
impl EventBus for NoopCollaborator {
    async fn publish(&self, _event: DomainEvent) -> Result<(), Error> {
        Ok(())
    }
}
