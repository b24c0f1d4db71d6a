//! Inventory item entity - Stationery sold at the counter.
//!
//! Items are seeded from `config.toml`. Only `active` items with stock left are
//! offered to students.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Whether an item is offered in the catalog
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum InventoryStatus {
    /// Listed for students
    #[default]
    #[sea_orm(string_value = "active")]
    Active,
    /// Hidden from the catalog
    #[sea_orm(string_value = "inactive")]
    Inactive,
}

/// Inventory database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name (e.g., "A4 Notebook")
    pub name: String,
    /// Unit price in currency units
    pub price: i64,
    /// Units on hand
    pub stock: i32,
    /// Free-form grouping (e.g., "pens", "notebooks")
    pub category: String,
    /// Catalog visibility
    pub status: InventoryStatus,
    /// When the item was created
    pub created_at: DateTimeUtc,
    /// When the item was last modified
    pub updated_at: DateTimeUtc,
}

/// Inventory items have no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
