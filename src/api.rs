use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::entities::{Booking, JoinRequest, Participant, Ride, RideDraft, RideUpdate, VoteTally};
use crate::error::Error;
use crate::geo::{RidePage, SearchQuery};

#[async_trait]
pub trait RideAPI {
    async fn create_ride(&self, user_id: Uuid, draft: RideDraft) -> Result<Ride, Error>;

    async fn find_ride(&self, id: Uuid) -> Result<Ride, Error>;

    async fn update_ride(
        &self,
        ride_id: Uuid,
        user_id: Uuid,
        update: RideUpdate,
    ) -> Result<Ride, Error>;

    async fn join_ride(
        &self,
        ride_id: Uuid,
        user_id: Uuid,
        request: JoinRequest,
    ) -> Result<JoinOutcome, Error>;

    async fn leave_ride(&self, ride_id: Uuid, user_id: Uuid) -> Result<Ride, Error>;

    async fn finish_ride(&self, ride_id: Uuid, user_id: Uuid) -> Result<Ride, Error>;

    async fn cancel_ride(&self, ride_id: Uuid, user_id: Uuid) -> Result<Ride, Error>;

    async fn vote_kick(
        &self,
        ride_id: Uuid,
        voter_id: Uuid,
        target_user_id: Uuid,
    ) -> Result<VoteTally, Error>;

    async fn kick_vote_status(
        &self,
        ride_id: Uuid,
        target_user_id: Uuid,
    ) -> Result<VoteTally, Error>;

    async fn transfer_ownership(&self, ride_id: Uuid, requester_id: Uuid) -> Result<Ride, Error>;

    async fn list_participants(&self, ride_id: Uuid) -> Result<Vec<Participant>, Error>;
}

#[async_trait]
pub trait SearchAPI {
    async fn search_rides(&self, query: SearchQuery) -> Result<RidePage, Error>;
}

pub trait API: RideAPI + SearchAPI {}

pub type DynAPI = Arc<dyn API + Send + Sync>;

/// What a successful join returns: the new booking plus the rating-enriched
/// participant roster.
#[derive(Clone, Debug, Serialize)]
pub struct JoinOutcome {
    pub booking: Booking,
    pub participants: Vec<Participant>,
}
