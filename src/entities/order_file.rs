//! Order file entity - The snapshot of one file item taken when an order is placed.
//!
//! Rows are written once, together with their order, and never modified. `item_type`
//! holds the MIME type of an uploaded document or the literal `"stationery"`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order file database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_files")]
pub struct Model {
    /// Row identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Order this item belongs to
    pub order_id: i64,
    /// Print order within the order, starting at 0
    pub position: i32,
    /// Client-generated item token
    pub item_id: String,
    /// Original file name or stationery name
    pub name: String,
    /// Size in bytes (0 for stationery)
    pub size: i64,
    /// MIME type, or `"stationery"`
    pub item_type: String,
    /// Resolved page count (0 for stationery)
    pub page_count: i32,
    /// Unit price for stationery, `None` for documents
    pub price: Option<i64>,
    /// Reference to the stored binary, if the upload service supplied one
    pub payload_ref: Option<String>,
}

/// Defines relationships between `OrderFile` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each file item belongs to one order
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
