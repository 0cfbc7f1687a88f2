use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::Location;
use crate::error::{
    capacity_exceeded_error, invalid_state_error, validation_error, Error,
};
use crate::geo;

/// A shared-ride offer. The `booked_seats` counter is authoritative and must
/// equal the sum of `seat_booked` over active bookings after every commit;
/// the engine keeps that true by mutating ride and bookings under the same
/// ride row lock.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ride {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub start_location: Location,
    pub end_location: Location,
    pub departure_time: DateTime<Utc>,
    pub seat_count: i32,
    pub booked_seats: i32,
    /// Compass direction of travel, derived once at creation.
    pub bearing: f64,
    pub status: Status,
    pub deleted_by_creator: bool,
    /// Pending successor creator, proposed but never auto-promoted.
    pub new_creator: Option<Uuid>,
    pub kick_votes: Vec<KickVote>,
    pub chat_room_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Active,
    Completed,
    Cancelled,
}

impl Status {
    pub fn name(&self) -> String {
        match self {
            Self::Active => "active".into(),
            Self::Completed => "completed".into(),
            Self::Cancelled => "cancelled".into(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RideDraft {
    pub start_location: Location,
    pub end_location: Location,
    pub departure_time: DateTime<Utc>,
    pub seat_count: i32,
    pub bearing: Option<f64>,
}

/// Creator-supplied edits to an active ride. Absent fields keep their
/// current value.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RideUpdate {
    pub start_location: Option<Location>,
    pub end_location: Option<Location>,
    pub departure_time: Option<DateTime<Utc>>,
    pub seat_count: Option<i32>,
}

/// Per-target vote record, embedded in the ride. Voters are distinct and
/// insertion-ordered; `ejected_at` marks the terminal state for this target.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KickVote {
    pub target_user_id: Uuid,
    pub voted_by: Vec<Uuid>,
    pub ejected_at: Option<DateTime<Utc>>,
}

/// Snapshot of a kick vote returned to callers. The threshold is evaluated
/// against the ride's current `booked_seats`, not the count at cast time.
#[derive(Clone, Debug, Serialize)]
pub struct VoteTally {
    pub target_user_id: Uuid,
    pub total_votes: usize,
    pub voted_by: Vec<Uuid>,
    pub required_votes: usize,
    pub eligible: bool,
    pub ejected: bool,
}

impl Ride {
    pub fn new(creator_id: Uuid, draft: RideDraft) -> Result<Self, Error> {
        if draft.seat_count < 1 {
            return Err(validation_error("seat count must be at least 1"));
        }

        let bearing = draft.bearing.unwrap_or_else(|| {
            geo::bearing_deg(
                draft.start_location.coordinates,
                draft.end_location.coordinates,
            )
        });

        Ok(Self {
            id: Uuid::new_v4(),
            creator_id,
            start_location: draft.start_location,
            end_location: draft.end_location,
            departure_time: draft.departure_time,
            seat_count: draft.seat_count,
            // the creator is auto-booked
            booked_seats: 1,
            bearing,
            status: Status::Active,
            deleted_by_creator: false,
            new_creator: None,
            kick_votes: Vec::new(),
            chat_room_id: None,
            created_at: Utc::now(),
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }

    pub fn seats_free(&self) -> i32 {
        self.seat_count - self.booked_seats
    }

    #[tracing::instrument]
    pub fn add_seats(&mut self, seats: i32) -> Result<(), Error> {
        if !self.is_active() {
            return Err(invalid_state_error());
        }

        if self.booked_seats + seats > self.seat_count {
            return Err(capacity_exceeded_error());
        }

        self.booked_seats += seats;
        Ok(())
    }

    #[tracing::instrument]
    pub fn release_seats(&mut self, seats: i32) {
        self.booked_seats = (self.booked_seats - seats).max(0);
    }

    pub fn set_booked_seats(&mut self, total: i32) {
        self.booked_seats = total.max(0);
    }

    #[tracing::instrument]
    pub fn finish(&mut self) -> Result<(), Error> {
        match self.status {
            Status::Active => {
                self.status = Status::Completed;
                Ok(())
            }
            _ => Err(invalid_state_error()),
        }
    }

    #[tracing::instrument]
    pub fn cancel_by_creator(&mut self) -> Result<(), Error> {
        match self.status {
            Status::Active => {
                self.status = Status::Cancelled;
                self.deleted_by_creator = true;
                Ok(())
            }
            _ => Err(invalid_state_error()),
        }
    }

    /// Applies a creator edit. Capacity may shrink, but never below the
    /// seats already booked.
    #[tracing::instrument]
    pub fn apply_update(&mut self, update: RideUpdate) -> Result<(), Error> {
        if !self.is_active() {
            return Err(invalid_state_error());
        }

        if let Some(seat_count) = update.seat_count {
            if seat_count < 1 {
                return Err(validation_error("seat count must be at least 1"));
            }
            if seat_count < self.booked_seats {
                return Err(capacity_exceeded_error());
            }
            self.seat_count = seat_count;
        }

        if let Some(departure_time) = update.departure_time {
            self.departure_time = departure_time;
        }

        let route_changed = update.start_location.is_some() || update.end_location.is_some();
        if let Some(start) = update.start_location {
            self.start_location = start;
        }
        if let Some(end) = update.end_location {
            self.end_location = end;
        }
        if route_changed {
            self.bearing = geo::bearing_deg(
                self.start_location.coordinates,
                self.end_location.coordinates,
            );
        }

        Ok(())
    }

    pub fn propose_successor(&mut self, user_id: Uuid) {
        self.new_creator = Some(user_id);
    }

    /// ceil(booked_seats * 0.5), the majority bar a kick vote must clear.
    pub fn required_votes(&self) -> usize {
        ((self.booked_seats.max(0) + 1) / 2) as usize
    }

    /// Records a vote against `target_user_id` and returns the tally after
    /// the vote. Re-voting by the same voter does not double count; votes
    /// against an already ejected target are no-ops returning the terminal
    /// tally.
    #[tracing::instrument]
    pub fn record_kick_vote(
        &mut self,
        voter_id: Uuid,
        target_user_id: Uuid,
    ) -> Result<VoteTally, Error> {
        if voter_id == target_user_id {
            return Err(validation_error("you cannot vote to kick yourself"));
        }

        if target_user_id == self.creator_id {
            return Err(validation_error("cannot kick the ride creator"));
        }

        let required = self.required_votes();

        match self
            .kick_votes
            .iter_mut()
            .find(|v| v.target_user_id == target_user_id)
        {
            Some(vote) => {
                if vote.ejected_at.is_none() && !vote.voted_by.contains(&voter_id) {
                    vote.voted_by.push(voter_id);
                }
            }
            None => self.kick_votes.push(KickVote {
                target_user_id,
                voted_by: vec![voter_id],
                ejected_at: None,
            }),
        }

        Ok(self.tally_against(target_user_id, required))
    }

    pub fn vote_tally(&self, target_user_id: Uuid) -> VoteTally {
        self.tally_against(target_user_id, self.required_votes())
    }

    fn tally_against(&self, target_user_id: Uuid, required: usize) -> VoteTally {
        match self
            .kick_votes
            .iter()
            .find(|v| v.target_user_id == target_user_id)
        {
            Some(vote) => VoteTally {
                target_user_id,
                total_votes: vote.voted_by.len(),
                voted_by: vote.voted_by.clone(),
                required_votes: required,
                eligible: vote.voted_by.len() >= required,
                ejected: vote.ejected_at.is_some(),
            },
            None => VoteTally {
                target_user_id,
                total_votes: 0,
                voted_by: Vec::new(),
                required_votes: required,
                eligible: false,
                ejected: false,
            },
        }
    }

    #[tracing::instrument]
    pub fn mark_ejected(&mut self, target_user_id: Uuid) {
        if let Some(vote) = self
            .kick_votes
            .iter_mut()
            .find(|v| v.target_user_id == target_user_id)
        {
            vote.ejected_at = Some(Utc::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Coordinates;

    fn draft(seat_count: i32) -> RideDraft {
        RideDraft {
            start_location: Location::new(Coordinates::new(41.0082, 28.9784), "Taksim".into()),
            end_location: Location::new(Coordinates::new(40.9909, 29.0303), "Kadikoy".into()),
            departure_time: Utc::now(),
            seat_count,
            bearing: None,
        }
    }

    fn active_ride(seat_count: i32) -> Ride {
        Ride::new(Uuid::new_v4(), draft(seat_count)).unwrap()
    }

    #[test]
    fn creation_books_the_creator_and_derives_bearing() {
        let ride = active_ride(4);

        assert_eq!(ride.booked_seats, 1);
        assert_eq!(ride.status, Status::Active);
        assert!(ride.bearing >= 0.0 && ride.bearing < 360.0);
    }

    #[test]
    fn rejects_zero_capacity() {
        let err = Ride::new(Uuid::new_v4(), draft(0)).unwrap_err();
        assert_eq!(err.code, 101);
    }

    #[test]
    fn supplied_bearing_wins_over_derivation() {
        let mut d = draft(2);
        d.bearing = Some(123.0);
        let ride = Ride::new(Uuid::new_v4(), d).unwrap();

        assert_eq!(ride.bearing, 123.0);
    }

    #[test]
    fn seats_fill_to_capacity_then_overflow_fails() {
        let mut ride = active_ride(4);

        // three riders join the creator, one seat each
        for _ in 0..3 {
            ride.add_seats(1).unwrap();
        }
        assert_eq!(ride.booked_seats, 4);

        let err = ride.add_seats(1).unwrap_err();
        assert_eq!(err.code, 105);
        assert_eq!(ride.booked_seats, 4);
    }

    #[test]
    fn add_seats_requires_active_status() {
        let mut ride = active_ride(4);
        ride.finish().unwrap();

        assert_eq!(ride.add_seats(1).unwrap_err().code, 100);
    }

    #[test]
    fn release_never_goes_negative() {
        let mut ride = active_ride(3);
        ride.release_seats(5);

        assert_eq!(ride.booked_seats, 0);
    }

    #[test]
    fn finish_is_terminal() {
        let mut ride = active_ride(2);

        ride.finish().unwrap();
        assert_eq!(ride.status, Status::Completed);
        assert!(ride.finish().is_err());
        assert!(ride.cancel_by_creator().is_err());
    }

    #[test]
    fn cancel_marks_soft_delete() {
        let mut ride = active_ride(2);

        ride.cancel_by_creator().unwrap();
        assert_eq!(ride.status, Status::Cancelled);
        assert!(ride.deleted_by_creator);
        assert!(ride.finish().is_err());
    }

    #[test]
    fn update_rebears_when_the_route_changes() {
        let mut ride = active_ride(4);
        let old_bearing = ride.bearing;

        ride.apply_update(RideUpdate {
            end_location: Some(Location::new(
                Coordinates::new(41.0255, 28.9742),
                "Sisli".into(),
            )),
            ..RideUpdate::default()
        })
        .unwrap();

        assert_ne!(ride.bearing, old_bearing);
        assert_eq!(ride.end_location.address, "Sisli");
    }

    #[test]
    fn update_cannot_shrink_below_booked_seats() {
        let mut ride = active_ride(4);
        ride.set_booked_seats(3);

        let err = ride
            .apply_update(RideUpdate {
                seat_count: Some(2),
                ..RideUpdate::default()
            })
            .unwrap_err();
        assert_eq!(err.code, 105);
        assert_eq!(ride.seat_count, 4);

        ride.apply_update(RideUpdate {
            seat_count: Some(3),
            ..RideUpdate::default()
        })
        .unwrap();
        assert_eq!(ride.seat_count, 3);
    }

    #[test]
    fn update_requires_active_status() {
        let mut ride = active_ride(4);
        ride.finish().unwrap();

        let err = ride
            .apply_update(RideUpdate {
                departure_time: Some(Utc::now()),
                ..RideUpdate::default()
            })
            .unwrap_err();
        assert_eq!(err.code, 100);
    }

    #[test]
    fn majority_threshold_is_half_rounded_up() {
        let mut ride = active_ride(8);
        ride.set_booked_seats(5);

        assert_eq!(ride.required_votes(), 3);

        ride.set_booked_seats(4);
        assert_eq!(ride.required_votes(), 2);
    }

    #[test]
    fn five_riders_eject_at_three_votes_not_two() {
        let mut ride = active_ride(8);
        ride.set_booked_seats(5);
        let target = Uuid::new_v4();

        let first = ride.record_kick_vote(Uuid::new_v4(), target).unwrap();
        assert!(!first.eligible);

        let second = ride.record_kick_vote(Uuid::new_v4(), target).unwrap();
        assert!(!second.eligible);
        assert_eq!(second.total_votes, 2);

        let third = ride.record_kick_vote(Uuid::new_v4(), target).unwrap();
        assert!(third.eligible);
        assert_eq!(third.total_votes, 3);
        assert_eq!(third.required_votes, 3);
    }

    #[test]
    fn duplicate_votes_do_not_double_count() {
        let mut ride = active_ride(6);
        ride.set_booked_seats(5);
        let voter = Uuid::new_v4();
        let target = Uuid::new_v4();

        ride.record_kick_vote(voter, target).unwrap();
        let tally = ride.record_kick_vote(voter, target).unwrap();

        assert_eq!(tally.total_votes, 1);
    }

    #[test]
    fn self_votes_and_creator_targets_are_rejected() {
        let mut ride = active_ride(4);
        let voter = Uuid::new_v4();

        assert_eq!(ride.record_kick_vote(voter, voter).unwrap_err().code, 101);
        assert_eq!(
            ride.record_kick_vote(voter, ride.creator_id)
                .unwrap_err()
                .code,
            101
        );
        assert!(ride.kick_votes.is_empty());
    }

    #[test]
    fn threshold_follows_shrinking_membership() {
        let mut ride = active_ride(8);
        ride.set_booked_seats(6);
        let target = Uuid::new_v4();

        ride.record_kick_vote(Uuid::new_v4(), target).unwrap();
        let early = ride.record_kick_vote(Uuid::new_v4(), target).unwrap();
        assert!(!early.eligible); // 2 of 3 required

        // two riders leave; the bar drops to ceil(4 * 0.5) = 2
        ride.set_booked_seats(4);
        assert!(ride.vote_tally(target).eligible);
    }

    #[test]
    fn votes_after_ejection_are_noops() {
        let mut ride = active_ride(4);
        ride.set_booked_seats(2);
        let target = Uuid::new_v4();

        let tally = ride.record_kick_vote(Uuid::new_v4(), target).unwrap();
        assert!(tally.eligible);
        ride.mark_ejected(target);

        let after = ride.record_kick_vote(Uuid::new_v4(), target).unwrap();
        assert!(after.ejected);
        assert_eq!(after.total_votes, 1);
    }

    #[test]
    fn tally_for_unknown_target_is_empty() {
        let ride = active_ride(4);
        let tally = ride.vote_tally(Uuid::new_v4());

        assert_eq!(tally.total_votes, 0);
        assert!(!tally.eligible);
        assert!(!tally.ejected);
    }
}
