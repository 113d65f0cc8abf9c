mod config;
mod database;
mod handlers;
mod middleware;
mod models;
mod requests;
mod routes;
mod services;
mod utils;

use crate::config::Config;
use crate::models::booking::{Booking, BookingScope};
use crate::services::email::Notifier;
use crate::services::payments::PaymentBridge;
use crate::services::processor::{PaymentProcessor, StripeClient};
use crate::utils::clock::{Clock, SharedClock, system_clock};
use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use anyhow::Context;
use dotenv::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=debug", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = database::connection::init_pool(&config.database)
        .await
        .context("Failed to connect to database")?;
    sqlx::migrate!()
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let clock: SharedClock = system_clock();
    let processor: Arc<dyn PaymentProcessor> = Arc::new(StripeClient::new(&config.processor));
    let bridge = PaymentBridge::new(
        pool.clone(),
        processor,
        config.processor.currency.clone(),
    );
    let notifier = Notifier::from_env();

    // Periodic auto-completion sweep; the listing handlers run the same
    // reconciliation on demand.
    {
        let pool = pool.clone();
        let clock = clock.clone();
        let interval_secs = config.reconcile.interval_secs;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
            loop {
                ticker.tick().await;
                match Booking::reconcile_scoped(&pool, BookingScope::All, clock.now()).await {
                    Ok(0) => {}
                    Ok(changed) => info!("Auto-completed {} bookings", changed),
                    Err(e) => error!("Reconcile sweep failed: {}", e),
                }
            }
        });
    }

    let addr = SocketAddr::from((config.server.host, config.server.port));
    info!("mentorconnect listening on {}", addr);

    let pool_data = web::Data::new(pool);
    let bridge_data = web::Data::new(bridge);
    let notifier_data = web::Data::new(notifier);
    let clock_data = web::Data::new(clock);

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(pool_data.clone())
            .app_data(bridge_data.clone())
            .app_data(notifier_data.clone())
            .app_data(clock_data.clone())
            .configure(routes::api::scoped_config)
    })
    .bind(addr)
    .context("Failed to bind server address")?
    .run()
    .await
    .context("Server error")?;

    Ok(())
}
