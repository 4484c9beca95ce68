use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("customer_name must not be empty")]
    MissingCustomerName,
    #[error("delay must be a finite, non-negative number of seconds")]
    InvalidDelay,
    #[error("delay of {requested}s exceeds the {max}s limit")]
    DelayTooLong { requested: f64, max: f64 },
}

pub type VehicleId = i32;
pub type CustomerId = i32;
pub type RentalId = i32;

/// Mileage recorded on rentals created by the unguarded booking path, which
/// never reads the vehicle's odometer.
pub const UNGUARDED_START_MILEAGE: i32 = 10_000;

/// Availability of a vehicle as stored in `vehicle.status`.
///
/// Values the service does not know about are kept verbatim so they can be
/// echoed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VehicleStatus {
    Available,
    Rented,
    Maintenance,
    Other(String),
}

impl VehicleStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "available" => Self::Available,
            "rented" => Self::Rented,
            "maintenance" => Self::Maintenance,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Available => "available",
            Self::Rented => "rented",
            Self::Maintenance => "maintenance",
            Self::Other(other) => other,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RentalStatus {
    Pending,
    Active,
    Completed,
}

impl RentalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

/// Phase of a booking attempt at which its outcome was decided.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStep {
    Check,
    Unavailable,
    Booked,
    Error,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct BookingOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rental_id: Option<RentalId>,
    pub step: BookingStep,
}

impl BookingOutcome {
    pub fn booked(customer_name: &str, rental_id: RentalId) -> Self {
        Self {
            success: true,
            message: format!("{customer_name} successfully booked the vehicle!"),
            rental_id: Some(rental_id),
            step: BookingStep::Booked,
        }
    }

    pub fn not_found() -> Self {
        Self::rejected("Vehicle not found".to_owned(), BookingStep::Check)
    }

    /// The vehicle was already taken when first read.
    pub fn not_available(status: &VehicleStatus) -> Self {
        Self::rejected(format!("Vehicle is {status}"), BookingStep::Check)
    }

    /// The vehicle was taken by another caller while this one waited for the lock.
    pub fn taken(status: &VehicleStatus) -> Self {
        Self::rejected(
            format!("Vehicle is now {status} (another user got it)"),
            BookingStep::Unavailable,
        )
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::rejected(message.into(), BookingStep::Error)
    }

    fn rejected(message: String, step: BookingStep) -> Self {
        Self {
            success: false,
            message,
            rental_id: None,
            step,
        }
    }
}

/// Fixed terms applied to every rental the demo creates, plus the limits
/// placed on demo requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookingPolicy {
    pub branch_id: i32,
    pub daily_rate: f64,
    pub rental_days: i32,
    pub max_delay_secs: f64,
    pub reset_window_minutes: i32,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            branch_id: 1,
            daily_rate: 50.0,
            rental_days: 7,
            max_delay_secs: 30.0,
            reset_window_minutes: 5,
        }
    }
}

impl BookingPolicy {
    /// Converts a requested artificial delay in seconds into a sleep duration.
    pub fn delay(&self, secs: f64) -> Result<Duration, Error> {
        if !secs.is_finite() || secs < 0.0 {
            return Err(Error::InvalidDelay);
        }
        if secs > self.max_delay_secs {
            return Err(Error::DelayTooLong {
                requested: secs,
                max: self.max_delay_secs,
            });
        }
        Ok(Duration::from_secs_f64(secs))
    }
}
