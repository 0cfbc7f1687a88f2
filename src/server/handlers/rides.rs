use axum::extract::{Extension, Json, Path, Query};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::{DynAPI, JoinOutcome},
    entities::{Baggage, JoinRequest, Participant, Ride, RideDraft, RideUpdate, VoteTally},
    error::Error,
    geo::{RidePage, SearchQuery},
};

// Authentication is handled upstream; handlers take the acting user id from
// the request payload.

#[derive(Deserialize)]
pub struct CreateRideParams {
    user_id: Uuid,
    #[serde(flatten)]
    draft: RideDraft,
}

#[derive(Deserialize)]
pub struct ActorParams {
    user_id: Uuid,
}

#[derive(Deserialize)]
pub struct JoinParams {
    user_id: Uuid,
    #[serde(default = "default_seats")]
    seats: i32,
    #[serde(default)]
    baggage: Baggage,
}

fn default_seats() -> i32 {
    1
}

#[derive(Deserialize)]
pub struct UpdateRideParams {
    user_id: Uuid,
    #[serde(flatten)]
    update: RideUpdate,
}

#[derive(Deserialize)]
pub struct VoteKickParams {
    voter_id: Uuid,
    target_user_id: Uuid,
}

pub async fn create(
    Extension(api): Extension<DynAPI>,
    Json(params): Json<CreateRideParams>,
) -> Result<Json<Ride>, Error> {
    let ride = api.create_ride(params.user_id, params.draft).await?;

    Ok(ride.into())
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, Error> {
    let ride = api.find_ride(id).await?;

    Ok(ride.into())
}

pub async fn update(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
    Json(params): Json<UpdateRideParams>,
) -> Result<Json<Ride>, Error> {
    let ride = api.update_ride(id, params.user_id, params.update).await?;

    Ok(ride.into())
}

pub async fn search(
    Extension(api): Extension<DynAPI>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<RidePage>, Error> {
    let page = api.search_rides(query).await?;

    Ok(page.into())
}

pub async fn join(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
    Json(params): Json<JoinParams>,
) -> Result<Json<JoinOutcome>, Error> {
    let request = JoinRequest {
        seats: params.seats,
        baggage: params.baggage,
    };

    let outcome = api.join_ride(id, params.user_id, request).await?;

    Ok(outcome.into())
}

pub async fn leave(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
    Json(params): Json<ActorParams>,
) -> Result<Json<Ride>, Error> {
    let ride = api.leave_ride(id, params.user_id).await?;

    Ok(ride.into())
}

pub async fn finish(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
    Json(params): Json<ActorParams>,
) -> Result<Json<Ride>, Error> {
    let ride = api.finish_ride(id, params.user_id).await?;

    Ok(ride.into())
}

pub async fn cancel(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
    Json(params): Json<ActorParams>,
) -> Result<Json<Ride>, Error> {
    let ride = api.cancel_ride(id, params.user_id).await?;

    Ok(ride.into())
}

pub async fn vote_kick(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
    Json(params): Json<VoteKickParams>,
) -> Result<Json<VoteTally>, Error> {
    let tally = api
        .vote_kick(id, params.voter_id, params.target_user_id)
        .await?;

    Ok(tally.into())
}

pub async fn kick_vote_status(
    Extension(api): Extension<DynAPI>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<VoteTally>, Error> {
    let tally = api.kick_vote_status(id, user_id).await?;

    Ok(tally.into())
}

pub async fn transfer_ownership(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
    Json(params): Json<ActorParams>,
) -> Result<Json<Ride>, Error> {
    let ride = api.transfer_ownership(id, params.user_id).await?;

    Ok(ride.into())
}

pub async fn participants(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Participant>>, Error> {
    let participants = api.list_participants(id).await?;

    Ok(participants.into())
}
