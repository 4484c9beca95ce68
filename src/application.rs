use serde::Deserialize;
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::{error, info, warn};

use crate::domain::{
    BookingOutcome, BookingPolicy, CustomerId, RentalId, RentalStatus, VehicleId, VehicleStatus,
    UNGUARDED_START_MILEAGE,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Database connection failed")]
    Connection(#[source] sqlx::Error),
    #[error(transparent)]
    Database(sqlx::Error),
    #[error(transparent)]
    Domain(#[from] crate::domain::Error),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => Error::Connection(err),
            err => Error::Database(err),
        }
    }
}

/// Runs the booking demo against the shared database.
///
/// The service holds no state of its own: every contested value lives in the
/// `vehicle` and `rental` tables, and every call acquires its own connection.
#[derive(Clone)]
pub struct Application {
    pool: PgPool,
    policy: BookingPolicy,
}

#[derive(FromRow)]
struct VehicleRow {
    status: String,
    mileage: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetSummary {
    pub vehicles_reset: u64,
    pub rentals_deleted: u64,
}

impl Application {
    pub fn new(pool: PgPool, policy: BookingPolicy) -> Self {
        Self { pool, policy }
    }

    /// Check-then-act without any lock. Two overlapping callers can both see
    /// the vehicle as available and both insert a rental.
    pub async fn book_without_lock(&self, command: BookVehicle) -> Result<BookingOutcome, Error> {
        command.validate()?;
        let delay = self.policy.delay(command.delay)?;
        let mut conn = self.pool.acquire().await.map_err(Error::Connection)?;

        match self.try_book_without_lock(&mut conn, &command, delay).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                error!(vehicle_id = command.vehicle_id, %err, "unlocked booking failed");
                Ok(BookingOutcome::failed(err.to_string()))
            }
        }
    }

    async fn try_book_without_lock(
        &self,
        conn: &mut PgConnection,
        command: &BookVehicle,
        delay: std::time::Duration,
    ) -> Result<BookingOutcome, sqlx::Error> {
        let vehicle = sqlx::query_as::<_, VehicleRow>(
            "SELECT status, mileage FROM vehicle WHERE vehicle_id = $1",
        )
        .bind(command.vehicle_id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(vehicle) = vehicle else {
            return Ok(BookingOutcome::not_found());
        };
        let status = VehicleStatus::parse(&vehicle.status);
        if !status.is_available() {
            return Ok(BookingOutcome::not_available(&status));
        }

        tokio::time::sleep(delay).await;

        let rental_id = self
            .insert_rental(
                conn,
                command,
                Some(UNGUARDED_START_MILEAGE),
                RentalStatus::Pending,
            )
            .await?;

        info!(
            vehicle_id = command.vehicle_id,
            rental_id,
            customer = %command.customer_name,
            "vehicle booked without lock"
        );
        Ok(BookingOutcome::booked(&command.customer_name, rental_id))
    }

    /// Check-then-act serialized by `SELECT ... FOR UPDATE`. The row lock is
    /// held across the delay, so concurrent callers queue in the database and
    /// re-read the status only once the holder has committed.
    pub async fn book_with_lock(&self, command: BookVehicle) -> Result<BookingOutcome, Error> {
        command.validate()?;
        let delay = self.policy.delay(command.delay)?;
        let mut tx = self.pool.begin().await.map_err(Error::Connection)?;

        let result = self.try_book_with_lock(&mut tx, &command, delay).await;
        let outcome = match result {
            Ok(outcome) if outcome.success => tx.commit().await.map(|_| outcome),
            Ok(outcome) => tx.rollback().await.map(|_| outcome),
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(%rollback_err, "rollback failed");
                }
                Err(err)
            }
        };

        match outcome {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                error!(vehicle_id = command.vehicle_id, %err, "locked booking failed");
                Ok(BookingOutcome::failed(err.to_string()))
            }
        }
    }

    async fn try_book_with_lock(
        &self,
        conn: &mut PgConnection,
        command: &BookVehicle,
        delay: std::time::Duration,
    ) -> Result<BookingOutcome, sqlx::Error> {
        let vehicle = sqlx::query_as::<_, VehicleRow>(
            "SELECT status, mileage FROM vehicle WHERE vehicle_id = $1 FOR UPDATE",
        )
        .bind(command.vehicle_id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(vehicle) = vehicle else {
            return Ok(BookingOutcome::not_found());
        };
        info!(vehicle_id = command.vehicle_id, customer = %command.customer_name, "vehicle locked");

        tokio::time::sleep(delay).await;

        let status = VehicleStatus::parse(&vehicle.status);
        if !status.is_available() {
            info!(vehicle_id = command.vehicle_id, %status, "vehicle taken while waiting");
            return Ok(BookingOutcome::taken(&status));
        }

        let rental_id = self
            .insert_rental(
                conn,
                command,
                vehicle.mileage,
                RentalStatus::Active,
            )
            .await?;

        sqlx::query("UPDATE vehicle SET status = $1 WHERE vehicle_id = $2")
            .bind(VehicleStatus::Rented.as_str())
            .bind(command.vehicle_id)
            .execute(&mut *conn)
            .await?;

        info!(
            vehicle_id = command.vehicle_id,
            rental_id,
            customer = %command.customer_name,
            "vehicle booked with lock"
        );
        Ok(BookingOutcome::booked(&command.customer_name, rental_id))
    }

    async fn insert_rental(
        &self,
        conn: &mut PgConnection,
        command: &BookVehicle,
        start_mileage: Option<i32>,
        status: RentalStatus,
    ) -> Result<RentalId, sqlx::Error> {
        sqlx::query_scalar::<_, RentalId>(
            r#"
            INSERT INTO rental (customer_id, vehicle_id, branch_id, start_date, end_date,
                                start_mileage, daily_rate, status)
            VALUES ($1, $2, $3, CURRENT_DATE, CURRENT_DATE + $4::int, $5, $6::numeric, $7)
            RETURNING rental_id
            "#,
        )
        .bind(command.customer_id)
        .bind(command.vehicle_id)
        .bind(self.policy.branch_id)
        .bind(self.policy.rental_days)
        .bind(start_mileage)
        .bind(self.policy.daily_rate)
        .bind(status.as_str())
        .fetch_one(&mut *conn)
        .await
    }

    /// Frees every vehicle touched by a rental created inside the reset window
    /// and deletes those rentals. Running it twice leaves nothing for the
    /// second call to do.
    pub async fn reset_demo(&self) -> Result<ResetSummary, Error> {
        let mut tx = self.pool.begin().await.map_err(Error::Connection)?;

        let vehicles_reset = sqlx::query(
            r#"
            UPDATE vehicle
            SET status = $1
            WHERE status <> $1
              AND vehicle_id IN (
                SELECT DISTINCT vehicle_id
                FROM rental
                WHERE created_at >= CURRENT_TIMESTAMP - make_interval(mins => $2)
              )
            "#,
        )
        .bind(VehicleStatus::Available.as_str())
        .bind(self.policy.reset_window_minutes)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let rentals_deleted = sqlx::query(
            "DELETE FROM rental WHERE created_at >= CURRENT_TIMESTAMP - make_interval(mins => $1)",
        )
        .bind(self.policy.reset_window_minutes)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        info!(vehicles_reset, rentals_deleted, "demo reset");
        Ok(ResetSummary {
            vehicles_reset,
            rentals_deleted,
        })
    }
}

fn default_customer_id() -> CustomerId {
    1
}

#[derive(Deserialize, Debug, Clone)]
pub struct BookVehicle {
    pub customer_name: String,
    #[serde(default = "default_customer_id")]
    pub customer_id: CustomerId,
    pub vehicle_id: VehicleId,
    /// Artificial processing time in seconds.
    #[serde(default)]
    pub delay: f64,
}

impl BookVehicle {
    fn validate(&self) -> Result<(), crate::domain::Error> {
        if self.customer_name.trim().is_empty() {
            return Err(crate::domain::Error::MissingCustomerName);
        }
        Ok(())
    }
}
