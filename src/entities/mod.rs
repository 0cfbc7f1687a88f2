mod booking;
mod location;
mod ride;

pub use booking::{select_successor, Baggage, Booking, BookingStatus, JoinRequest, Participant};
pub use location::{Coordinates, Location};
pub use ride::{KickVote, Ride, RideDraft, RideUpdate, Status, VoteTally};
