//! Client side of the order lifecycle.
//!
//! [`session::OrderSession`] owns the student's draft and drives submission and vendor
//! actions through an [`OrderBackend`]. The backend is either the database directly
//! ([`local::LocalBackend`]) or the REST API ([`http::HttpBackend`]); both give the
//! same answers, errors included.

pub mod http;
pub mod local;
pub mod page_count;
pub mod session;
pub mod sync;

use crate::{
    core::{
        fulfillment::{OtpVerification, TransitionOutcome, TransitionRequest},
        identity::SessionUser,
        orders::OrderView,
        submission::NewOrder,
    },
    entities::inventory_item,
    errors::Result,
};
use async_trait::async_trait;

/// Access to the shared order store
#[async_trait]
pub trait OrderBackend: Send + Sync {
    /// Stationery students may add to a draft.
    async fn list_inventory(&self) -> Result<Vec<inventory_item::Model>>;

    /// Submits a draft; returns the placed (or replayed) order.
    async fn submit_order(&self, user: &SessionUser, order: NewOrder) -> Result<OrderView>;

    /// Orders visible to `user`, newest first.
    async fn list_orders(&self, user: &SessionUser) -> Result<Vec<OrderView>>;

    /// One order visible to `user`.
    async fn get_order(&self, user: &SessionUser, order_id: i64) -> Result<OrderView>;

    /// Requests a status change.
    async fn update_status(
        &self,
        user: &SessionUser,
        order_id: i64,
        request: TransitionRequest,
    ) -> Result<TransitionOutcome>;

    /// Looks up the active order holding a pickup code.
    async fn verify_otp(&self, user: &SessionUser, code: &str) -> Result<OtpVerification>;
}
