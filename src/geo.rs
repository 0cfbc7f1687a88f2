use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{Coordinates, Ride};
use crate::error::{validation_error, Error};

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Rides pointing more than this many degrees away from the query direction
/// are considered to be going somewhere else.
pub const MAX_BEARING_DIFF_DEG: f64 = 45.0;

/// Great-circle distance in meters between two points.
pub fn haversine_distance_m(a: Coordinates, b: Coordinates) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos()
            * b.latitude.to_radians().cos()
            * (d_lng / 2.0).sin().powi(2);

    EARTH_RADIUS_M * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Initial compass bearing in degrees [0, 360) from `a` to `b`.
pub fn bearing_deg(a: Coordinates, b: Coordinates) -> f64 {
    let d_lng = (b.longitude - a.longitude).to_radians();
    let y = d_lng.sin() * b.latitude.to_radians().cos();
    let x = a.latitude.to_radians().cos() * b.latitude.to_radians().sin()
        - a.latitude.to_radians().sin() * b.latitude.to_radians().cos() * d_lng.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Minimal angular difference between two bearings, wraparound included.
pub fn bearing_diff_deg(b1: f64, b2: f64) -> f64 {
    let diff = (b1 - b2).abs() % 360.0;
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SearchQuery {
    pub from_lat: f64,
    pub from_lng: f64,
    pub to_lat: f64,
    pub to_lng: f64,
    pub departure_time: DateTime<Utc>,
    #[serde(default = "default_flex_minutes")]
    pub departure_flex_minutes: i64,
    #[serde(default = "default_flex_km")]
    pub departure_flex_km: f64,
    #[serde(default = "default_flex_km")]
    pub arrival_flex_km: f64,
    #[serde(default = "default_passengers")]
    pub passengers: i32,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_flex_minutes() -> i64 {
    15
}

fn default_flex_km() -> f64 {
    0.2
}

fn default_passengers() -> i32 {
    1
}

fn default_page() -> usize {
    1
}

fn default_limit() -> usize {
    10
}

impl SearchQuery {
    pub fn validate(&self) -> Result<(), Error> {
        if self.page < 1 {
            return Err(validation_error("page must be at least 1"));
        }
        if self.limit < 1 {
            return Err(validation_error("limit must be at least 1"));
        }
        if self.passengers < 1 {
            return Err(validation_error("passengers must be at least 1"));
        }

        Ok(())
    }

    pub fn origin(&self) -> Coordinates {
        Coordinates::new(self.from_lat, self.from_lng)
    }

    pub fn destination(&self) -> Coordinates {
        Coordinates::new(self.to_lat, self.to_lng)
    }

    pub fn bearing(&self) -> f64 {
        bearing_deg(self.origin(), self.destination())
    }

    pub fn window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let flex = Duration::minutes(self.departure_flex_minutes);
        (self.departure_time - flex, self.departure_time + flex)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Pagination {
    pub current_page: usize,
    pub total_pages: usize,
    pub total_count: usize,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct RidePage {
    pub rides: Vec<Ride>,
    pub pagination: Pagination,
}

/// Filters, ranks and paginates candidate rides against a search query.
/// Read-only; tolerates stale candidates (a concurrently filled ride is
/// dropped by the seat filter at booking time anyway).
pub fn match_rides(candidates: Vec<Ride>, query: &SearchQuery) -> RidePage {
    let (time_min, time_max) = query.window();
    let user_bearing = query.bearing();
    let pickup_radius_m = query.departure_flex_km * 1000.0;
    let dropoff_radius_m = query.arrival_flex_km * 1000.0;

    let mut matched: Vec<Ride> = candidates
        .into_iter()
        .filter(|ride| ride.is_active())
        .filter(|ride| ride.departure_time >= time_min && ride.departure_time <= time_max)
        .filter(|ride| ride.seats_free() >= query.passengers)
        .filter(|ride| {
            haversine_distance_m(query.origin(), ride.start_location.coordinates)
                <= pickup_radius_m
        })
        .filter(|ride| {
            haversine_distance_m(query.destination(), ride.end_location.coordinates)
                <= dropoff_radius_m
        })
        .filter(|ride| bearing_diff_deg(user_bearing, ride.bearing) <= MAX_BEARING_DIFF_DEG)
        .collect();

    matched.sort_by_key(|ride| ride.departure_time);

    paginate(matched, query.page, query.limit)
}

fn paginate(rides: Vec<Ride>, page: usize, limit: usize) -> RidePage {
    let total_count = rides.len();
    let total_pages = (total_count + limit - 1) / limit;

    let slice: Vec<Ride> = rides
        .into_iter()
        .skip(page.saturating_sub(1) * limit)
        .take(limit)
        .collect();

    RidePage {
        rides: slice,
        pagination: Pagination {
            current_page: page,
            total_pages,
            total_count,
            has_next_page: page < total_pages,
            has_prev_page: page > 1 && total_pages > 0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Location, RideDraft};
    use uuid::Uuid;

    fn point(lat: f64, lng: f64) -> Coordinates {
        Coordinates::new(lat, lng)
    }

    fn ride_between(
        start: Coordinates,
        end: Coordinates,
        departure_time: DateTime<Utc>,
        seat_count: i32,
    ) -> Ride {
        Ride::new(
            Uuid::new_v4(),
            RideDraft {
                start_location: Location::new(start, "start".into()),
                end_location: Location::new(end, "end".into()),
                departure_time,
                seat_count,
                bearing: None,
            },
        )
        .unwrap()
    }

    fn eastbound_query(departure_time: DateTime<Utc>) -> SearchQuery {
        SearchQuery {
            from_lat: 0.0,
            from_lng: 0.0,
            to_lat: 0.0,
            to_lng: 1.0,
            departure_time,
            departure_flex_minutes: 15,
            departure_flex_km: 0.2,
            arrival_flex_km: 0.2,
            passengers: 1,
            page: 1,
            limit: 10,
        }
    }

    #[test]
    fn one_degree_of_longitude_at_the_equator() {
        let d = haversine_distance_m(point(0.0, 0.0), point(0.0, 1.0));
        let expected = 111_195.0;

        assert!((d - expected).abs() / expected < 0.005, "got {d}");
    }

    #[test]
    fn due_east_bearing_is_ninety() {
        let b = bearing_deg(point(0.0, 0.0), point(0.0, 1.0));
        assert!((b - 90.0).abs() < 0.01, "got {b}");
    }

    #[test]
    fn due_north_bearing_is_zero() {
        let b = bearing_deg(point(0.0, 0.0), point(1.0, 0.0));
        assert!(b.abs() < 0.01 || (b - 360.0).abs() < 0.01, "got {b}");
    }

    #[test]
    fn bearing_diff_wraps_around_north() {
        assert!((bearing_diff_deg(350.0, 10.0) - 20.0).abs() < 1e-9);
        assert!((bearing_diff_deg(10.0, 350.0) - 20.0).abs() < 1e-9);
        assert!((bearing_diff_deg(0.0, 180.0) - 180.0).abs() < 1e-9);
    }

    #[test]
    fn bearing_gate_admits_44_rejects_46() {
        let now = Utc::now();
        let query = eastbound_query(now);

        let mut aligned = ride_between(point(0.0, 0.0), point(0.0, 1.0), now, 4);
        aligned.bearing = 90.0 + 44.0;

        let mut divergent = ride_between(point(0.0, 0.0), point(0.0, 1.0), now, 4);
        divergent.bearing = 90.0 + 46.0;

        let page = match_rides(vec![aligned.clone(), divergent], &query);

        assert_eq!(page.rides.len(), 1);
        assert_eq!(page.rides[0].id, aligned.id);
    }

    #[test]
    fn departure_window_is_inclusive() {
        let now = Utc::now();
        let query = eastbound_query(now);

        let on_edge = ride_between(
            point(0.0, 0.0),
            point(0.0, 1.0),
            now + Duration::minutes(15),
            4,
        );
        let too_late = ride_between(
            point(0.0, 0.0),
            point(0.0, 1.0),
            now + Duration::minutes(16),
            4,
        );

        let page = match_rides(vec![on_edge.clone(), too_late], &query);

        assert_eq!(page.rides.len(), 1);
        assert_eq!(page.rides[0].id, on_edge.id);
    }

    #[test]
    fn full_rides_are_filtered_out() {
        let now = Utc::now();
        let mut query = eastbound_query(now);
        query.passengers = 2;

        let mut full = ride_between(point(0.0, 0.0), point(0.0, 1.0), now, 3);
        full.set_booked_seats(2); // one seat left, two requested

        let open = ride_between(point(0.0, 0.0), point(0.0, 1.0), now, 3);

        let page = match_rides(vec![full, open.clone()], &query);

        assert_eq!(page.rides.len(), 1);
        assert_eq!(page.rides[0].id, open.id);
    }

    #[test]
    fn pickup_outside_radius_is_excluded() {
        let now = Utc::now();
        let query = eastbound_query(now);

        // ~1.1 km north of the query origin, radius is 200 m
        let far_start = ride_between(point(0.01, 0.0), point(0.0, 1.0), now, 4);
        let near_start = ride_between(point(0.0005, 0.0), point(0.0, 1.0), now, 4);

        let page = match_rides(vec![far_start, near_start.clone()], &query);

        assert_eq!(page.rides.len(), 1);
        assert_eq!(page.rides[0].id, near_start.id);
    }

    #[test]
    fn results_sort_by_departure_time() {
        let now = Utc::now();
        let mut query = eastbound_query(now);
        query.departure_flex_minutes = 30;

        let later = ride_between(
            point(0.0, 0.0),
            point(0.0, 1.0),
            now + Duration::minutes(10),
            4,
        );
        let sooner = ride_between(
            point(0.0, 0.0),
            point(0.0, 1.0),
            now - Duration::minutes(10),
            4,
        );

        let page = match_rides(vec![later.clone(), sooner.clone()], &query);

        assert_eq!(page.rides[0].id, sooner.id);
        assert_eq!(page.rides[1].id, later.id);
    }

    #[test]
    fn pagination_splits_23_rides_into_three_pages() {
        let now = Utc::now();
        let rides: Vec<Ride> = (0..23)
            .map(|_| ride_between(point(0.0, 0.0), point(0.0, 1.0), now, 4))
            .collect();

        let mut query = eastbound_query(now);

        let first = match_rides(rides.clone(), &query);
        assert_eq!(first.rides.len(), 10);
        assert_eq!(first.pagination.total_pages, 3);
        assert_eq!(first.pagination.total_count, 23);
        assert!(first.pagination.has_next_page);
        assert!(!first.pagination.has_prev_page);

        query.page = 2;
        let second = match_rides(rides.clone(), &query);
        assert_eq!(second.rides.len(), 10);
        assert!(second.pagination.has_next_page);
        assert!(second.pagination.has_prev_page);

        query.page = 3;
        let third = match_rides(rides, &query);
        assert_eq!(third.rides.len(), 3);
        assert!(!third.pagination.has_next_page);
        assert!(third.pagination.has_prev_page);
    }

    #[test]
    fn page_beyond_range_is_empty_not_an_error() {
        let now = Utc::now();
        let rides = vec![ride_between(point(0.0, 0.0), point(0.0, 1.0), now, 4)];

        let mut query = eastbound_query(now);
        query.page = 5;

        let page = match_rides(rides, &query);

        assert!(page.rides.is_empty());
        assert_eq!(page.pagination.total_count, 1);
        assert!(!page.pagination.has_next_page);
    }

    #[test]
    fn query_validation_rejects_zero_page_and_limit() {
        let mut query = eastbound_query(Utc::now());
        query.page = 0;
        assert!(query.validate().is_err());

        query.page = 1;
        query.limit = 0;
        assert!(query.validate().is_err());

        query.limit = 10;
        query.passengers = 0;
        assert!(query.validate().is_err());
    }
}
