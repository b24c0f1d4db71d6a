//! Order entity - A submitted print/stationery order and its fulfillment status.
//!
//! Orders are created in the `paid` state with a 4-digit OTP and a frozen
//! `total_amount`. Status only ever moves forward along `paid -> printed -> collected`;
//! every move is recorded in `order_status_events`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fulfillment state of an order
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Paid and waiting in the vendor queue
    #[sea_orm(string_value = "paid")]
    Paid,
    /// Printed and ready for pickup
    #[sea_orm(string_value = "printed")]
    Printed,
    /// Handed over to the student; terminal
    #[sea_orm(string_value = "collected")]
    Collected,
}

impl OrderStatus {
    /// Statuses whose OTP is still redeemable.
    pub const ACTIVE: [Self; 2] = [Self::Paid, Self::Printed];

    /// Lowercase wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Printed => "printed",
            Self::Collected => "collected",
        }
    }

    /// Position along the lifecycle, used to check monotonicity.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Paid => 0,
            Self::Printed => 1,
            Self::Collected => 2,
        }
    }

    /// `true` while the order sits in the vendor queue.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Paid | Self::Printed)
    }

    /// The single status a regular vendor action may move to next.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Paid => Some(Self::Printed),
            Self::Printed => Some(Self::Collected),
            Self::Collected => None,
        }
    }

    /// The status a regular transition into `self` must start from.
    #[must_use]
    pub const fn expected_predecessor(self) -> Option<Self> {
        match self {
            Self::Paid => None,
            Self::Printed => Some(Self::Paid),
            Self::Collected => Some(Self::Printed),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    /// Server-assigned identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Id of the student who placed the order
    pub user_id: String,
    /// Email of the student, shown to the vendor
    pub user_email: String,
    /// 4-digit pickup code, unique among active orders
    pub otp: String,
    /// Color printing for every document in the order
    pub color: bool,
    /// Duplex printing for every document in the order
    pub double_sided: bool,
    /// Copies of every document, at least 1
    pub copies: i32,
    /// Amount charged at submission; never recomputed
    pub total_amount: i64,
    /// Current fulfillment state
    pub status: OrderStatus,
    /// Idempotency key supplied by the submitting client
    #[sea_orm(unique)]
    pub client_ref: Option<String>,
    /// When the order was placed
    pub created_at: DateTimeUtc,
    /// When the status last changed
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Order and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One order has many file items
    #[sea_orm(has_many = "super::order_file::Entity")]
    Files,
    /// One order has many status history rows
    #[sea_orm(has_many = "super::order_status_event::Entity")]
    StatusEvents,
}

impl Related<super::order_file::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Files.def()
    }
}

impl Related<super::order_status_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StatusEvents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_order() {
        assert_eq!(OrderStatus::Paid.next(), Some(OrderStatus::Printed));
        assert_eq!(OrderStatus::Printed.next(), Some(OrderStatus::Collected));
        assert_eq!(OrderStatus::Collected.next(), None);
        assert!(OrderStatus::Paid.rank() < OrderStatus::Printed.rank());
        assert!(OrderStatus::Printed.rank() < OrderStatus::Collected.rank());
    }

    #[test]
    fn test_active_statuses() {
        assert!(OrderStatus::Paid.is_active());
        assert!(OrderStatus::Printed.is_active());
        assert!(!OrderStatus::Collected.is_active());
        assert_eq!(OrderStatus::Collected.expected_predecessor(), Some(OrderStatus::Printed));
    }
}
