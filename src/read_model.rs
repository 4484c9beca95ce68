use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::application::Error;
use crate::domain::{RentalId, RentalStatus, VehicleId, VehicleStatus};

/// Read-only queries behind the dashboard and the demo page.
#[derive(Clone)]
pub struct Repository {
    pool: PgPool,
}

impl Repository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn dashboard(&self) -> Result<Dashboard, Error> {
        let mut conn = self.pool.acquire().await.map_err(Error::Connection)?;

        let available_vehicles: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM vehicle WHERE status = $1")
                .bind(VehicleStatus::Available.as_str())
                .fetch_one(&mut *conn)
                .await?;

        let active_rentals: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rental WHERE status = $1")
            .bind(RentalStatus::Active.as_str())
            .fetch_one(&mut *conn)
            .await?;

        let total_customers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customer")
            .fetch_one(&mut *conn)
            .await?;

        let total_revenue: f64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_amount), 0)::float8 FROM rental WHERE status = $1",
        )
        .bind(RentalStatus::Completed.as_str())
        .fetch_one(&mut *conn)
        .await?;

        let recent_rentals = sqlx::query_as::<_, RecentRental>(
            r#"
            SELECT r.rental_id,
                   c.first_name || ' ' || c.last_name AS customer_name,
                   v.make || ' ' || v.model AS vehicle,
                   r.start_date,
                   r.status
            FROM rental r
            JOIN customer c ON r.customer_id = c.customer_id
            JOIN vehicle v ON r.vehicle_id = v.vehicle_id
            ORDER BY r.created_at DESC, r.rental_id DESC
            LIMIT 5
            "#,
        )
        .fetch_all(&mut *conn)
        .await?;

        Ok(Dashboard {
            available_vehicles,
            active_rentals,
            total_customers,
            total_revenue,
            recent_rentals,
        })
    }

    /// Lowest-numbered vehicle that is currently available.
    pub async fn available_vehicle(&self) -> Result<Option<AvailableVehicle>, Error> {
        let mut conn = self.pool.acquire().await.map_err(Error::Connection)?;

        let vehicle = sqlx::query_as::<_, AvailableVehicle>(
            r#"
            SELECT vehicle_id, make, model, year, license_plate, status
            FROM vehicle
            WHERE status = $1
            ORDER BY vehicle_id
            LIMIT 1
            "#,
        )
        .bind(VehicleStatus::Available.as_str())
        .fetch_optional(&mut *conn)
        .await?;

        Ok(vehicle)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub available_vehicles: i64,
    pub active_rentals: i64,
    pub total_customers: i64,
    pub total_revenue: f64,
    pub recent_rentals: Vec<RecentRental>,
}

#[derive(FromRow, Debug, Clone, PartialEq)]
pub struct RecentRental {
    pub rental_id: RentalId,
    pub customer_name: String,
    pub vehicle: String,
    pub start_date: NaiveDate,
    pub status: String,
}

#[derive(FromRow, Serialize, Debug, Clone, PartialEq)]
pub struct AvailableVehicle {
    pub vehicle_id: VehicleId,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub license_plate: String,
    pub status: String,
}
