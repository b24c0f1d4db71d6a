#![allow(clippy::result_large_err)]

use dotenvy::dotenv;
use jprint::{
    api::{self, AppState},
    config::{self, database, server},
    core::inventory,
    errors::Result,
};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; variables may also be set externally
    dotenv().ok();

    // 3. Pricing, OTP and seed settings
    let app_config = config::load_app_configuration()?;

    // 4. Database and schema
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database schema ready."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Stationery catalog
    let added = inventory::seed_inventory(&db, &app_config.stationery)
        .await
        .inspect_err(|e| error!("Failed to seed inventory: {}", e))?;
    info!(added, "Inventory seeded.");

    // 6. Serve the API
    let address = server::bind_address()?;
    let listener = TcpListener::bind(address)
        .await
        .inspect_err(|e| error!("Failed to bind {}: {}", address, e))?;
    info!("Order service listening on {}", address);

    api::serve(listener, AppState::new(db, &app_config)).await
}
