use super::Engine;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::{types::Json, Executor, Row};

use crate::{
    api::SearchAPI,
    entities::Ride,
    error::Error,
    geo::{self, RidePage, SearchQuery},
};

#[async_trait]
impl SearchAPI for Engine {
    /// Read-only matching. The SQL prefilter narrows on status and departure
    /// window; distance, bearing and seat checks run in the pure pipeline.
    /// May observe slightly stale seat counts, which is acceptable for
    /// search.
    #[tracing::instrument(skip(self))]
    async fn search_rides(&self, query: SearchQuery) -> Result<RidePage, Error> {
        query.validate()?;

        let (time_min, time_max) = query.window();

        let mut conn = self.pool.acquire().await?;

        let mut rows = conn.fetch(
            sqlx::query(
                "SELECT data FROM rides WHERE status = 'active' AND departure_time >= $1 AND departure_time <= $2 ORDER BY departure_time",
            )
            .bind(time_min)
            .bind(time_max),
        );

        let mut candidates: Vec<Ride> = Vec::new();
        while let Some(row) = rows.try_next().await? {
            let Json(ride): Json<Ride> = row.try_get("data")?;
            candidates.push(ride);
        }

        Ok(geo::match_rides(candidates, &query))
    }
}
