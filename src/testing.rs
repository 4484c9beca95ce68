//! Scratch database fixtures for the tests marked `#[ignore = "requires database"]`.
//!
//! Run with: DATABASE_URL=postgres://... cargo test -- --ignored

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Executor, PgPool};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE customer (
        customer_id SERIAL PRIMARY KEY,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL
    )"#,
    r#"
    CREATE TABLE vehicle (
        vehicle_id SERIAL PRIMARY KEY,
        make TEXT NOT NULL,
        model TEXT NOT NULL,
        year INTEGER NOT NULL,
        license_plate TEXT NOT NULL UNIQUE,
        status VARCHAR(20) NOT NULL DEFAULT 'available',
        mileage INTEGER NOT NULL DEFAULT 0
    )"#,
    r#"
    CREATE TABLE rental (
        rental_id SERIAL PRIMARY KEY,
        customer_id INTEGER NOT NULL REFERENCES customer (customer_id),
        vehicle_id INTEGER NOT NULL REFERENCES vehicle (vehicle_id),
        branch_id INTEGER NOT NULL,
        start_date DATE NOT NULL,
        end_date DATE,
        start_mileage INTEGER,
        daily_rate NUMERIC(10, 2) NOT NULL,
        total_amount NUMERIC(10, 2),
        status VARCHAR(20) NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
    )"#,
    r#"
    INSERT INTO customer (first_name, last_name)
    VALUES ('Ada', 'Lovelace'), ('Grace', 'Hopper')"#,
    r#"
    INSERT INTO vehicle (make, model, year, license_plate, mileage)
    SELECT 'Toyota', 'Corolla', 2020 + n % 4, 'DEMO-' || n, 1000 * n
    FROM generate_series(1, 7) AS n"#,
];

/// Creates `schema` from scratch on the database behind `DATABASE_URL` and
/// returns a pool whose connections resolve unqualified names inside it.
///
/// Seeds two customers and vehicles 1..=7, all available.
pub async fn scratch_pool(schema: &str) -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let admin = PgPool::connect(&url).await.unwrap();
    admin
        .execute(format!("DROP SCHEMA IF EXISTS {schema} CASCADE").as_str())
        .await
        .unwrap();
    admin
        .execute(format!("CREATE SCHEMA {schema}").as_str())
        .await
        .unwrap();
    admin.close().await;

    let options = url
        .parse::<PgConnectOptions>()
        .unwrap()
        .options([("search_path", schema)]);
    let pool = PgPoolOptions::new()
        .max_connections(16)
        .connect_with(options)
        .await
        .unwrap();

    for statement in SCHEMA {
        pool.execute(*statement).await.unwrap();
    }
    pool
}
