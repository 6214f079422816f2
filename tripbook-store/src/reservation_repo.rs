use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgExecutor, PgPool};
use std::collections::HashMap;
use tripbook_core::repository::ReservationRepository;
use tripbook_core::{
    CapacityReconciler, Contact, CoreError, CoreResult, NewReservation, Participant, Reservation,
};
use tripbook_shared::Masked;
use uuid::Uuid;

use crate::error::db_error;
use crate::trip_repo::{committed_participants, lock_trip, save_trip};

const RESERVATION_COLUMNS: &str = "id, trip_id, owner_id, contact_name, contact_surname, contact_email, contact_phone, participant_count, total_price_cents, active, created_at, cancelled_at";

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct ReservationRow {
    id: Uuid,
    trip_id: Uuid,
    owner_id: String,
    contact_name: String,
    contact_surname: String,
    contact_email: String,
    contact_phone: String,
    participant_count: i32,
    total_price_cents: i64,
    active: bool,
    created_at: DateTime<Utc>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl ReservationRow {
    fn into_reservation(self, participants: Vec<Participant>) -> Reservation {
        Reservation {
            id: self.id,
            trip_id: self.trip_id,
            owner_id: self.owner_id,
            contact: Contact {
                name: self.contact_name,
                surname: self.contact_surname,
                email: Masked::new(self.contact_email),
                phone: Masked::new(self.contact_phone),
            },
            participants,
            participant_count: self.participant_count,
            total_price_cents: self.total_price_cents,
            active: self.active,
            created_at: self.created_at,
            cancelled_at: self.cancelled_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ParticipantRow {
    reservation_id: Uuid,
    name: String,
    surname: String,
}

pub struct PgReservationRepository {
    pool: PgPool,
    reconciler: CapacityReconciler,
}

impl PgReservationRepository {
    pub fn new(pool: PgPool, reconciler: CapacityReconciler) -> Self {
        Self { pool, reconciler }
    }

    async fn hydrate(&self, rows: Vec<ReservationRow>) -> CoreResult<Vec<Reservation>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut participants = participants_for(&self.pool, &ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let list = participants.remove(&row.id).unwrap_or_default();
                row.into_reservation(list)
            })
            .collect())
    }
}

/// Participants of the given reservations, in booking order.
async fn participants_for<'e, E>(executor: E, ids: &[Uuid]) -> CoreResult<HashMap<Uuid, Vec<Participant>>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, ParticipantRow>(
        "SELECT reservation_id, name, surname FROM reservation_participants WHERE reservation_id = ANY($1) ORDER BY reservation_id, position",
    )
    .bind(ids)
    .fetch_all(executor)
    .await
    .map_err(db_error)?;

    let mut grouped: HashMap<Uuid, Vec<Participant>> = HashMap::new();
    for row in rows {
        grouped.entry(row.reservation_id).or_default().push(Participant {
            name: row.name,
            surname: row.surname,
        });
    }
    Ok(grouped)
}

async fn insert_reservation(conn: &mut PgConnection, reservation: &Reservation) -> CoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO reservations (id, trip_id, owner_id, contact_name, contact_surname, contact_email, contact_phone, participant_count, total_price_cents, active, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(reservation.id)
    .bind(reservation.trip_id)
    .bind(&reservation.owner_id)
    .bind(&reservation.contact.name)
    .bind(&reservation.contact.surname)
    .bind(reservation.contact.email.expose())
    .bind(reservation.contact.phone.expose())
    .bind(reservation.participant_count)
    .bind(reservation.total_price_cents)
    .bind(reservation.active)
    .bind(reservation.created_at)
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;

    for (position, participant) in reservation.participants.iter().enumerate() {
        sqlx::query(
            "INSERT INTO reservation_participants (reservation_id, position, name, surname) VALUES ($1, $2, $3, $4)",
        )
        .bind(reservation.id)
        .bind(position as i32)
        .bind(&participant.name)
        .bind(&participant.surname)
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;
    }

    Ok(())
}

#[async_trait]
impl ReservationRepository for PgReservationRepository {
    async fn create_reservation(
        &self,
        owner_id: &str,
        new: NewReservation,
    ) -> CoreResult<Reservation> {
        let trip_id = new.trip_id;
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        // Concurrent bookings of the same trip queue up here
        let mut trip = lock_trip(&mut tx, trip_id)
            .await?
            .filter(|t| t.active)
            .ok_or_else(|| CoreError::NotFound(format!("Trip {}", trip_id)))?;

        let reservation = Reservation::open(&trip, owner_id, new)?;
        self.reconciler.admit(&mut trip, reservation.participant_count)?;

        insert_reservation(&mut tx, &reservation).await?;
        save_trip(&mut tx, &trip).await?;
        tx.commit().await.map_err(db_error)?;

        Ok(reservation)
    }

    async fn find_reservation(&self, id: Uuid) -> CoreResult<Option<Reservation>> {
        let row = sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {} FROM reservations WHERE id = $1",
            RESERVATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_for_trip(&self, trip_id: Uuid, active_only: bool) -> CoreResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {} FROM reservations WHERE trip_id = $1 AND (active OR NOT $2) ORDER BY created_at",
            RESERVATION_COLUMNS
        ))
        .bind(trip_id)
        .bind(active_only)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        self.hydrate(rows).await
    }

    async fn cancel_reservation(&self, id: Uuid) -> CoreResult<Reservation> {
        // Trip id never changes, so it is safe to read before locking
        let trip_id = sqlx::query_scalar::<_, Uuid>("SELECT trip_id FROM reservations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .ok_or_else(|| CoreError::NotFound(format!("Reservation {}", id)))?;

        let mut tx = self.pool.begin().await.map_err(db_error)?;

        // Trip first, then reservation: same order as booking
        let mut trip = lock_trip(&mut tx, trip_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Trip {}", trip_id)))?;

        let row = sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {} FROM reservations WHERE id = $1 FOR UPDATE",
            RESERVATION_COLUMNS
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;

        let mut reservation = row.into_reservation(Vec::new());
        reservation.mark_cancelled()?;

        sqlx::query("UPDATE reservations SET active = FALSE, cancelled_at = $2 WHERE id = $1")
            .bind(id)
            .bind(reservation.cancelled_at)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        let committed_after = committed_participants(&mut tx, trip_id).await?;
        self.reconciler
            .release(&mut trip, reservation.participant_count, committed_after);
        save_trip(&mut tx, &trip).await?;

        // Read before commit so a failure here rolls the cancellation back
        let mut participants = participants_for(&mut *tx, &[id]).await?;
        reservation.participants = participants.remove(&id).unwrap_or_default();

        tx.commit().await.map_err(db_error)?;
        Ok(reservation)
    }
}
