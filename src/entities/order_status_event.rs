//! Order status event entity - Append-only history of status changes.
//!
//! One row is written when an order is created (`from_status` is `None`) and one
//! per applied transition. Vendor overrides that skip `printed` are flagged with
//! `is_override` and carry the vendor's reason.

use super::order::OrderStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Status event database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_status_events")]
pub struct Model {
    /// Row identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Order whose status changed
    pub order_id: i64,
    /// Status before the change, `None` for creation
    pub from_status: Option<OrderStatus>,
    /// Status after the change
    pub to_status: OrderStatus,
    /// Session user id of whoever caused the change
    pub actor_id: String,
    /// Set when a vendor skipped a lifecycle step
    pub is_override: bool,
    /// Reason given for an override
    pub reason: Option<String>,
    /// When the change was committed
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `OrderStatusEvent` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each event belongs to one order
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
