mod application;
mod config;
mod dashboard;
mod domain;
mod http;
mod read_model;
#[cfg(test)]
mod testing;

use std::net::SocketAddr;

use actix_web::{web::Data, App, HttpServer};
use anyhow::Context;
use application::Application;
use clap::Parser;
use read_model::Repository;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let pool = config.pool().context("invalid database configuration")?;
    let application = Application::new(pool.clone(), config.booking_policy());
    let repository = Repository::new(pool);

    http_server(config.bind, application, repository).await
}

async fn http_server(
    bind: SocketAddr,
    app: Application,
    repository: Repository,
) -> anyhow::Result<()> {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(Data::new(app.clone()))
            .app_data(Data::new(repository.clone()))
            .configure(http::routes)
    })
    .bind(bind)
    .with_context(|| format!("failed to bind {bind}"))?
    .disable_signals()
    .run();

    info!(%bind, "dashboard at http://{bind}, demo at http://{bind}/concurrency-demo");

    let handle = server.handle();
    tokio::spawn(async move {
        shutdown().await;
        info!("shutting down");
        handle.stop(true).await;
    });

    server.await?;
    Ok(())
}

async fn shutdown() {
    if let Err(err) = signal::ctrl_c().await {
        error!(%err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
