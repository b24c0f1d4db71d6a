//! Stationery inventory - the catalog students can add to a draft.

use crate::{
    config::settings::StationeryConfig,
    core::cart::StationeryDescriptor,
    entities::{InventoryItem, inventory_item, inventory_item::InventoryStatus},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::{debug, info, instrument};

impl From<&inventory_item::Model> for StationeryDescriptor {
    fn from(item: &inventory_item::Model) -> Self {
        Self {
            name: item.name.clone(),
            price: item.price,
        }
    }
}

/// Items students may order: active and in stock, alphabetical.
pub async fn list_available(db: &DatabaseConnection) -> Result<Vec<inventory_item::Model>> {
    InventoryItem::find()
        .filter(inventory_item::Column::Status.eq(InventoryStatus::Active))
        .filter(inventory_item::Column::Stock.gt(0))
        .order_by_asc(inventory_item::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

async fn find_by_name(
    db: &DatabaseConnection,
    name: &str,
) -> Result<Option<inventory_item::Model>> {
    InventoryItem::find()
        .filter(inventory_item::Column::Name.eq(name))
        .one(db)
        .await
        .map_err(Into::into)
}

async fn insert_item(db: &DatabaseConnection, seed: &StationeryConfig) -> Result<()> {
    let name = seed.name.trim();
    if name.is_empty() {
        return Err(Error::validation("item name cannot be empty"));
    }
    if seed.price < 0 {
        return Err(Error::validation(format!("'{name}' has a negative price")));
    }
    if seed.stock < 0 {
        return Err(Error::validation(format!("'{name}' has negative stock")));
    }

    let now = chrono::Utc::now();
    inventory_item::ActiveModel {
        name: Set(name.to_string()),
        price: Set(seed.price),
        stock: Set(seed.stock),
        category: Set(seed.category.clone()),
        status: Set(InventoryStatus::Active),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(())
}

/// Inserts configured stationery whose name is not in the table yet.
///
/// Existing rows are left alone, so stock counted at the counter survives a restart.
/// Returns the number of inserted items.
#[instrument(skip_all, fields(configured = seeds.len()))]
pub async fn seed_inventory(db: &DatabaseConnection, seeds: &[StationeryConfig]) -> Result<usize> {
    let mut inserted = 0;
    for seed in seeds {
        if find_by_name(db, seed.name.trim()).await?.is_some() {
            debug!("Inventory item '{}' already exists, skipping", seed.name);
            continue;
        }
        insert_item(db, seed).await?;
        inserted += 1;
    }
    info!("Seeded {inserted} inventory item(s)");
    Ok(inserted)
}
