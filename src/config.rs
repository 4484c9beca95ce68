use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;

use crate::domain::BookingPolicy;

/// Startup configuration. Values come from flags, then the environment
/// (a `.env` file is loaded first), then the defaults below.
#[derive(Parser, Debug, Clone)]
#[command(name = "vehicle-rental", about = "Vehicle rental dashboard and row-locking demo")]
pub struct Config {
    /// Postgres URL. When unset, the standard `PGHOST`/`PGUSER`/... variables are used.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:5002")]
    pub bind: SocketAddr,

    /// Must exceed the number of concurrent demo requests, or callers queue on
    /// the pool instead of on the row lock.
    #[arg(
        long,
        env = "DB_MAX_CONNECTIONS",
        default_value_t = 20,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_connections: u32,

    #[arg(long, env = "DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 5)]
    pub acquire_timeout_secs: u64,

    #[arg(long, env = "RESET_WINDOW_MINUTES", default_value_t = 5)]
    pub reset_window_minutes: i32,

    #[arg(long, env = "MAX_DELAY_SECS", default_value_t = 30.0)]
    pub max_delay_secs: f64,

    #[arg(long, env = "DEMO_BRANCH_ID", default_value_t = 1)]
    pub branch_id: i32,

    #[arg(long, env = "DEMO_DAILY_RATE", default_value_t = 50.0)]
    pub daily_rate: f64,

    #[arg(long, env = "DEMO_RENTAL_DAYS", default_value_t = 7)]
    pub rental_days: i32,
}

impl Config {
    pub fn connect_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        match &self.database_url {
            Some(url) => url.parse(),
            None => Ok(PgConnectOptions::new()),
        }
    }

    /// Builds the pool without connecting; the first request that needs the
    /// database opens the first connection.
    pub fn pool(&self) -> Result<PgPool, sqlx::Error> {
        Ok(PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
            .connect_lazy_with(self.connect_options()?))
    }

    pub fn booking_policy(&self) -> BookingPolicy {
        BookingPolicy {
            branch_id: self.branch_id,
            daily_rate: self.daily_rate,
            rental_days: self.rental_days,
            max_delay_secs: self.max_delay_secs,
            reset_window_minutes: self.reset_window_minutes,
        }
    }
}
