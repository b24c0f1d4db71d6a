//! Report generation business logic.
//!
//! Summaries for the vendor dashboard and the student profile, and the vendor's
//! order search. Everything here works on already-loaded [`OrderView`]s, so the same
//! functions serve the API and the client's polled snapshots.

use crate::{core::orders::OrderView, entities::order::OrderStatus};
use serde::{Deserialize, Serialize};

/// Counter-side overview
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorSummary {
    /// Orders waiting at the counter (`paid` + `printed`)
    pub queue_count: usize,
    /// Of those, not printed yet
    pub awaiting_print: usize,
    /// Printed and waiting for pickup
    pub awaiting_pickup: usize,
    /// Handed over
    pub completed_count: usize,
    /// Sum of every order's total
    pub total_earnings: i64,
}

/// A student's own history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    /// All orders ever placed
    pub order_count: usize,
    /// Not collected yet
    pub active_count: usize,
    /// Collected
    pub past_count: usize,
    /// Sum of every order's total
    pub total_spent: i64,
}

/// Summarizes every order for the vendor dashboard.
#[must_use]
pub fn vendor_summary(orders: &[OrderView]) -> VendorSummary {
    orders
        .iter()
        .fold(VendorSummary::default(), |mut summary, order| {
            match order.status {
                OrderStatus::Paid => summary.awaiting_print += 1,
                OrderStatus::Printed => summary.awaiting_pickup += 1,
                OrderStatus::Collected => summary.completed_count += 1,
            }
            summary.total_earnings = summary.total_earnings.saturating_add(order.total_amount);
            summary.queue_count = summary.awaiting_print + summary.awaiting_pickup;
            summary
        })
}

/// Summarizes the orders belonging to `user_id`.
#[must_use]
pub fn user_summary(orders: &[OrderView], user_id: &str) -> UserSummary {
    orders
        .iter()
        .filter(|o| o.user_id == user_id)
        .fold(UserSummary::default(), |mut summary, order| {
            summary.order_count += 1;
            if order.is_active() {
                summary.active_count += 1;
            } else {
                summary.past_count += 1;
            }
            summary.total_spent = summary.total_spent.saturating_add(order.total_amount);
            summary
        })
}

/// Orders whose OTP, id, or email contains `query`, ignoring case.
///
/// An empty query matches everything.
#[must_use]
pub fn search_orders<'a>(orders: &'a [OrderView], query: &str) -> Vec<&'a OrderView> {
    let needle = query.trim().to_lowercase();
    orders
        .iter()
        .filter(|o| needle.is_empty() || matches_query(o, &needle))
        .collect()
}

fn matches_query(order: &OrderView, needle: &str) -> bool {
    order.otp.as_str().contains(needle)
        || order.id.to_string().contains(needle)
        || order.user_email.to_lowercase().contains(needle)
}

/// Splits orders into `(active, past)`, keeping their order.
#[must_use]
pub fn partition_active(orders: &[OrderView]) -> (Vec<&OrderView>, Vec<&OrderView>) {
    orders.iter().partition(|o| o.is_active())
}
