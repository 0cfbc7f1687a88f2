use super::Database;

use sqlx::{types::Json, Executor, Row, Transaction};
use uuid::Uuid;

use crate::{
    entities::{Booking, Ride},
    error::{not_found_error, Error},
};

/// Takes the per-ride write lock. Bounded by lock_timeout so a contended
/// writer fails with a retryable conflict instead of queueing forever.
#[tracing::instrument(skip(tx))]
pub async fn fetch_ride_for_update(
    tx: &mut Transaction<'_, Database>,
    id: &Uuid,
) -> Result<Ride, Error> {
    tx.execute(sqlx::query("SET LOCAL lock_timeout = '5s'"))
        .await?;

    let Json(ride): Json<Ride> = tx
        .fetch_optional(sqlx::query("SELECT data FROM rides WHERE id = $1 FOR UPDATE").bind(id))
        .await?
        .ok_or_else(not_found_error)?
        .try_get("data")?;

    Ok(ride)
}

#[tracing::instrument(skip(tx))]
pub async fn insert_ride(tx: &mut Transaction<'_, Database>, ride: &Ride) -> Result<(), Error> {
    tx.execute(
        sqlx::query(
            "INSERT INTO rides (id, status, departure_time, data) VALUES ($1, $2, $3, $4)",
        )
        .bind(&ride.id)
        .bind(ride.status.name())
        .bind(&ride.departure_time)
        .bind(Json(ride)),
    )
    .await?;

    Ok(())
}

#[tracing::instrument(skip(tx))]
pub async fn update_ride(tx: &mut Transaction<'_, Database>, ride: &Ride) -> Result<(), Error> {
    tx.execute(
        sqlx::query("UPDATE rides SET status = $2, departure_time = $3, data = $4 WHERE id = $1")
            .bind(&ride.id)
            .bind(ride.status.name())
            .bind(&ride.departure_time)
            .bind(Json(ride)),
    )
    .await?;

    Ok(())
}

#[tracing::instrument(skip(tx))]
pub async fn insert_booking(
    tx: &mut Transaction<'_, Database>,
    booking: &Booking,
) -> Result<(), Error> {
    tx.execute(
        sqlx::query(
            "INSERT INTO bookings (id, ride_id, user_id, status, joined_at, data) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&booking.id)
        .bind(&booking.ride_id)
        .bind(&booking.user_id)
        .bind(booking.status.name())
        .bind(&booking.joined_at)
        .bind(Json(booking)),
    )
    .await?;

    Ok(())
}

#[tracing::instrument(skip(tx))]
pub async fn update_booking(
    tx: &mut Transaction<'_, Database>,
    booking: &Booking,
) -> Result<(), Error> {
    tx.execute(
        sqlx::query("UPDATE bookings SET status = $2, data = $3 WHERE id = $1")
            .bind(&booking.id)
            .bind(booking.status.name())
            .bind(Json(booking)),
    )
    .await?;

    Ok(())
}

#[tracing::instrument(skip(tx))]
pub async fn fetch_active_booking_for_update(
    tx: &mut Transaction<'_, Database>,
    ride_id: &Uuid,
    user_id: &Uuid,
) -> Result<Option<Booking>, Error> {
    let maybe_row = tx
        .fetch_optional(
            sqlx::query(
                "SELECT data FROM bookings WHERE ride_id = $1 AND user_id = $2 AND status = 'active' FOR UPDATE",
            )
            .bind(ride_id)
            .bind(user_id),
        )
        .await?;

    match maybe_row {
        Some(row) => {
            let Json(booking): Json<Booking> = row.try_get("data")?;
            Ok(Some(booking))
        }
        None => Ok(None),
    }
}

#[tracing::instrument(skip(tx))]
pub async fn fetch_active_bookings_for_update(
    tx: &mut Transaction<'_, Database>,
    ride_id: &Uuid,
) -> Result<Vec<Booking>, Error> {
    let rows = tx
        .fetch_all(
            sqlx::query(
                "SELECT data FROM bookings WHERE ride_id = $1 AND status = 'active' ORDER BY joined_at FOR UPDATE",
            )
            .bind(ride_id),
        )
        .await?;

    let mut bookings = Vec::with_capacity(rows.len());
    for row in rows {
        let Json(booking): Json<Booking> = row.try_get("data")?;
        bookings.push(booking);
    }

    Ok(bookings)
}

/// The ledger total: seats across active bookings for one ride.
#[tracing::instrument(skip(tx))]
pub async fn active_seat_total(
    tx: &mut Transaction<'_, Database>,
    ride_id: &Uuid,
) -> Result<i64, Error> {
    let row = tx
        .fetch_one(
            sqlx::query(
                "SELECT COALESCE(SUM((data->>'seat_booked')::INT4), 0) AS total FROM bookings WHERE ride_id = $1 AND status = 'active'",
            )
            .bind(ride_id),
        )
        .await?;

    let total: i64 = row.try_get("total")?;
    Ok(total)
}

/// Overwrites the ride's counter from the booking rows. Only valid while
/// the ride row lock is held; used after multi-booking corrections.
#[tracing::instrument(skip(tx, ride))]
pub async fn recompute_booked_seats(
    tx: &mut Transaction<'_, Database>,
    ride: &mut Ride,
) -> Result<(), Error> {
    let total = active_seat_total(tx, &ride.id).await?;
    ride.set_booked_seats(total as i32);

    Ok(())
}
