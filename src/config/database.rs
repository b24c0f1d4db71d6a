//! Database configuration module for `jprint`.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs. The one thing entities cannot express,
//! the partial unique index on active OTPs, is created with raw SQL afterwards.

use crate::entities::{InventoryItem, Order, OrderFile, OrderStatusEvent};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};

/// Default database location, created on first start
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/jprint.sqlite?mode=rwc";

/// An OTP may only be held by one `paid` or `printed` order at a time.
const ACTIVE_OTP_INDEX: &str = "CREATE UNIQUE INDEX IF NOT EXISTS idx_orders_active_otp \
     ON orders (otp) WHERE status IN ('paid', 'printed')";

/// Gets the database URL from the `DATABASE_URL` environment variable, or the default `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by `DATABASE_URL`.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    if let Some(dir) = sqlite_parent_dir(&database_url) {
        std::fs::create_dir_all(dir)?;
    }
    Database::connect(&database_url).await.map_err(Into::into)
}

/// Directory holding a file-backed `SQLite` database, if the URL names one.
fn sqlite_parent_dir(url: &str) -> Option<&std::path::Path> {
    let path = url.strip_prefix("sqlite://")?;
    let path = path.split('?').next()?;
    if path.is_empty() || path.starts_with(':') {
        return None;
    }
    std::path::Path::new(path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
}

/// Creates every table that does not exist yet, plus the active-OTP index.
///
/// Parents are created before children so the foreign keys resolve.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    create_table(db, &schema, Order).await?;
    create_table(db, &schema, OrderFile).await?;
    create_table(db, &schema, OrderStatusEvent).await?;
    create_table(db, &schema, InventoryItem).await?;

    db.execute_unprepared(ACTIVE_OTP_INDEX).await?;
    Ok(())
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}
