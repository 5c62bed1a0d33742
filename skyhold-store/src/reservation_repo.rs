use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use skyhold_core::{Reservation, ReservationStatus, ReservationStore, ReservationTx, StoreError};
use tracing::debug;
use uuid::Uuid;

const RESERVATION_COLUMNS: &str =
    "id, flight_ref, user_ref, seat_count, total_cost, status, created_at, updated_at";

pub struct PgReservationStore {
    pool: PgPool,
}

impl PgReservationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ReservationRow {
    id: Uuid,
    flight_ref: String,
    user_ref: String,
    seat_count: i32,
    total_cost: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = StoreError;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<ReservationStatus>()
            .map_err(|reason| StoreError::CorruptRow { id: row.id, reason })?;
        let seat_count = u32::try_from(row.seat_count)
            .map_err(|_| StoreError::CorruptRow { id: row.id, reason: format!("seat_count {}", row.seat_count) })?;

        Ok(Reservation {
            id: row.id,
            flight_ref: row.flight_ref,
            user_ref: row.user_ref,
            seat_count,
            total_cost: row.total_cost,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

fn status_names(statuses: &[ReservationStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

#[async_trait]
impl ReservationStore for PgReservationStore {
    async fn begin(&self) -> Result<Box<dyn ReservationTx>, StoreError> {
        let tx = self.pool.begin().await.map_err(db_err)?;
        Ok(Box::new(PgReservationTx { tx }))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Reservation>, StoreError> {
        let row: Option<ReservationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM reservations WHERE id = $1",
            RESERVATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Reservation::try_from).transpose()
    }

    async fn expire_stale(
        &self,
        threshold: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE reservations
            SET status = $1, updated_at = $2
            WHERE created_at < $3 AND status = ANY($4)
            "#,
        )
        .bind(ReservationStatus::Cancelled.as_str())
        .bind(now)
        .bind(threshold)
        .bind(status_names(&ReservationStatus::OPEN))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected())
    }
}

pub struct PgReservationTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ReservationTx for PgReservationTx {
    async fn insert(&mut self, reservation: &Reservation) -> Result<(), StoreError> {
        let seat_count = i32::try_from(reservation.seat_count)
            .map_err(|_| StoreError::Database(format!("seat_count {} out of range", reservation.seat_count)))?;

        sqlx::query(
            r#"
            INSERT INTO reservations (id, flight_ref, user_ref, seat_count, total_cost, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(reservation.id)
        .bind(&reservation.flight_ref)
        .bind(&reservation.user_ref)
        .bind(seat_count)
        .bind(reservation.total_cost)
        .bind(reservation.status.as_str())
        .bind(reservation.created_at)
        .bind(reservation.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => StoreError::Duplicate(reservation.id),
            _ => db_err(e),
        })?;

        Ok(())
    }

    async fn fetch_for_update(&mut self, id: Uuid) -> Result<Option<Reservation>, StoreError> {
        let row: Option<ReservationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM reservations WHERE id = $1 FOR UPDATE",
            RESERVATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;

        row.map(Reservation::try_from).transpose()
    }

    async fn transition(
        &mut self,
        id: Uuid,
        expected: &[ReservationStatus],
        to: ReservationStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Reservation>, StoreError> {
        let row: Option<ReservationRow> = sqlx::query_as(&format!(
            r#"
            UPDATE reservations
            SET status = $1, updated_at = $2
            WHERE id = $3 AND status = ANY($4)
            RETURNING {}
            "#,
            RESERVATION_COLUMNS
        ))
        .bind(to.as_str())
        .bind(now)
        .bind(id)
        .bind(status_names(expected))
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;

        if row.is_none() {
            debug!(reservation_id = %id, to = %to, "Conditional status update matched no row");
        }

        row.map(Reservation::try_from).transpose()
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let PgReservationTx { tx } = *self;
        tx.commit().await.map_err(db_err)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let PgReservationTx { tx } = *self;
        tx.rollback().await.map_err(db_err)
    }
}
