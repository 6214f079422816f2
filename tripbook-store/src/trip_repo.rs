use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};
use tripbook_core::repository::TripRepository;
use tripbook_core::{CapacityReconciler, CoreError, CoreResult, Trip, TripUpdate};
use uuid::Uuid;

use crate::error::db_error;

const TRIP_COLUMNS: &str = "id, title, description, trip_date, capacity, available_spots, active, days, price_cents, overbooked, created_at, updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct TripRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    trip_date: NaiveDate,
    capacity: i32,
    available_spots: i32,
    active: bool,
    days: i32,
    price_cents: i64,
    overbooked: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TripRow> for Trip {
    fn from(row: TripRow) -> Self {
        Trip {
            id: row.id,
            title: row.title,
            description: row.description,
            trip_date: row.trip_date,
            capacity: row.capacity,
            available_spots: row.available_spots,
            active: row.active,
            days: row.days,
            price_cents: row.price_cents,
            overbooked: row.overbooked,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Read the trip row and hold its lock until the transaction ends.
pub(crate) async fn lock_trip(conn: &mut PgConnection, id: Uuid) -> CoreResult<Option<Trip>> {
    let row = sqlx::query_as::<_, TripRow>(&format!(
        "SELECT {} FROM trips WHERE id = $1 FOR UPDATE",
        TRIP_COLUMNS
    ))
    .bind(id)
    .fetch_optional(conn)
    .await
    .map_err(db_error)?;

    Ok(row.map(Trip::from))
}

/// Participants across the trip's active reservations.
pub(crate) async fn committed_participants(conn: &mut PgConnection, trip_id: Uuid) -> CoreResult<i32> {
    sqlx::query_scalar::<_, i32>(
        "SELECT COALESCE(SUM(participant_count), 0)::INTEGER FROM reservations WHERE trip_id = $1 AND active",
    )
    .bind(trip_id)
    .fetch_one(conn)
    .await
    .map_err(db_error)
}

pub(crate) async fn save_trip(conn: &mut PgConnection, trip: &Trip) -> CoreResult<()> {
    sqlx::query(
        r#"
        UPDATE trips
        SET title = $2, description = $3, trip_date = $4, capacity = $5, available_spots = $6,
            active = $7, days = $8, price_cents = $9, overbooked = $10, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(trip.id)
    .bind(&trip.title)
    .bind(&trip.description)
    .bind(trip.trip_date)
    .bind(trip.capacity)
    .bind(trip.available_spots)
    .bind(trip.active)
    .bind(trip.days)
    .bind(trip.price_cents)
    .bind(trip.overbooked)
    .execute(conn)
    .await
    .map_err(|e| title_conflict(e, &trip.title))?;

    Ok(())
}

fn title_conflict(err: sqlx::Error, title: &str) -> CoreError {
    match db_error(err) {
        CoreError::Conflict(msg) if msg.contains("trips_title_key") => {
            CoreError::Conflict(format!("trip title '{}' already exists", title))
        }
        other => other,
    }
}

pub struct PgTripRepository {
    pool: PgPool,
    reconciler: CapacityReconciler,
}

impl PgTripRepository {
    pub fn new(pool: PgPool, reconciler: CapacityReconciler) -> Self {
        Self { pool, reconciler }
    }

    /// Lock, recompute with `capacity` (or the stored one), write back.
    async fn recompute(&self, id: Uuid, update: Option<&TripUpdate>) -> CoreResult<Trip> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let mut trip = lock_trip(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Trip {}", id)))?;
        let committed = committed_participants(&mut tx, id).await?;

        let capacity = match update {
            Some(update) => {
                trip.apply_details(update);
                update.capacity
            }
            None => trip.capacity,
        };
        self.reconciler.recompute(&mut trip, capacity, committed)?;

        save_trip(&mut tx, &trip).await?;
        tx.commit().await.map_err(db_error)?;

        Ok(trip)
    }
}

#[async_trait]
impl TripRepository for PgTripRepository {
    async fn insert_trip(&self, trip: &Trip) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO trips (id, title, description, trip_date, capacity, available_spots, active, days, price_cents, overbooked, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(trip.id)
        .bind(&trip.title)
        .bind(&trip.description)
        .bind(trip.trip_date)
        .bind(trip.capacity)
        .bind(trip.available_spots)
        .bind(trip.active)
        .bind(trip.days)
        .bind(trip.price_cents)
        .bind(trip.overbooked)
        .bind(trip.created_at)
        .bind(trip.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| title_conflict(e, &trip.title))?;

        Ok(())
    }

    async fn find_trip(&self, id: Uuid) -> CoreResult<Option<Trip>> {
        let row = sqlx::query_as::<_, TripRow>(&format!("SELECT {} FROM trips WHERE id = $1", TRIP_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(row.map(Trip::from))
    }

    async fn list_trips(&self, active_only: bool) -> CoreResult<Vec<Trip>> {
        let rows = sqlx::query_as::<_, TripRow>(&format!(
            "SELECT {} FROM trips WHERE active OR NOT $1 ORDER BY trip_date, title",
            TRIP_COLUMNS
        ))
        .bind(active_only)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows.into_iter().map(Trip::from).collect())
    }

    async fn update_trip(&self, id: Uuid, update: &TripUpdate) -> CoreResult<Trip> {
        self.recompute(id, Some(update)).await
    }

    async fn reconcile_trip(&self, id: Uuid) -> CoreResult<Trip> {
        self.recompute(id, None).await
    }

    async fn deactivate_trip(&self, id: Uuid) -> CoreResult<()> {
        let result = sqlx::query("UPDATE trips SET active = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("Trip {}", id)));
        }
        Ok(())
    }
}
