use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{invalid_state_error, validation_error, Error};

/// One user's seat reservation against a ride. At most one active booking
/// exists per (ride, user) pair; the engine checks this before inserting.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub user_id: Uuid,
    pub seat_booked: i32,
    pub baggage: Baggage,
    pub status: BookingStatus,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
    pub kicked: bool,
    pub cancel_reason: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Active,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn name(&self) -> String {
        match self {
            Self::Active => "active".into(),
            Self::Cancelled => "cancelled".into(),
            Self::Completed => "completed".into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Baggage {
    Large,
    Suitcase,
    None,
}

impl Default for Baggage {
    fn default() -> Self {
        Self::None
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct JoinRequest {
    #[serde(default = "default_seats")]
    pub seats: i32,
    #[serde(default)]
    pub baggage: Baggage,
}

fn default_seats() -> i32 {
    1
}

impl Booking {
    pub fn new(
        ride_id: Uuid,
        user_id: Uuid,
        seat_booked: i32,
        baggage: Baggage,
    ) -> Result<Self, Error> {
        if seat_booked < 1 {
            return Err(validation_error("seat count must be at least 1"));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            ride_id,
            user_id,
            seat_booked,
            baggage,
            status: BookingStatus::Active,
            joined_at: Utc::now(),
            left_at: None,
            kicked: false,
            cancel_reason: None,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == BookingStatus::Active
    }

    #[tracing::instrument]
    pub fn cancel(&mut self, reason: &str, kicked: bool) -> Result<(), Error> {
        match self.status {
            BookingStatus::Active => {
                self.status = BookingStatus::Cancelled;
                self.left_at = Some(Utc::now());
                self.kicked = kicked;
                self.cancel_reason = Some(reason.into());
                Ok(())
            }
            _ => Err(invalid_state_error()),
        }
    }

    #[tracing::instrument]
    pub fn complete(&mut self) -> Result<(), Error> {
        match self.status {
            BookingStatus::Active => {
                self.status = BookingStatus::Completed;
                Ok(())
            }
            _ => Err(invalid_state_error()),
        }
    }
}

/// Picks the successor creator: the active booking with the earliest
/// `joined_at`, excluding the departing creator. Ties resolve to the first
/// booking in insertion order.
pub fn select_successor(bookings: &[Booking], departing: Uuid) -> Option<Uuid> {
    bookings
        .iter()
        .filter(|b| b.is_active() && b.user_id != departing)
        .min_by_key(|b| b.joined_at)
        .map(|b| b.user_id)
}

/// An active rider as returned by participant listings, enriched with the
/// rating aggregate read from the external rating source.
#[derive(Clone, Debug, Serialize)]
pub struct Participant {
    pub user_id: Uuid,
    pub seat_booked: i32,
    pub baggage: Baggage,
    pub joined_at: DateTime<Utc>,
    pub avg_rating: Option<f64>,
    pub rating_count: i64,
}
