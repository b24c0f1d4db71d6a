//! In-process backend talking to the database directly.

use super::OrderBackend;
use crate::{
    core::{
        fulfillment::{self, OtpVerification, TransitionOutcome, TransitionRequest},
        identity::SessionUser,
        inventory,
        orders::{self, OrderView},
        otp::{OtpGenerator, RandomOtpGenerator},
        submission::{self, NewOrder, SubmissionPolicy},
    },
    entities::inventory_item,
    errors::Result,
};
use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// [`OrderBackend`] over a [`DatabaseConnection`]
#[derive(Clone)]
pub struct LocalBackend {
    db: DatabaseConnection,
    otp_generator: Arc<dyn OtpGenerator>,
    policy: SubmissionPolicy,
}

impl LocalBackend {
    /// Backend issuing random OTPs.
    #[must_use]
    pub fn new(db: DatabaseConnection, policy: SubmissionPolicy) -> Self {
        Self {
            db,
            otp_generator: Arc::new(RandomOtpGenerator),
            policy,
        }
    }

    /// Replaces the OTP source.
    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn OtpGenerator>) -> Self {
        self.otp_generator = generator;
        self
    }

    /// The underlying connection.
    #[must_use]
    pub const fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl OrderBackend for LocalBackend {
    async fn list_inventory(&self) -> Result<Vec<inventory_item::Model>> {
        inventory::list_available(&self.db).await
    }

    async fn submit_order(&self, user: &SessionUser, order: NewOrder) -> Result<OrderView> {
        let placed = submission::submit_order_as(
            &self.db,
            user,
            order,
            self.otp_generator.as_ref(),
            &self.policy,
        )
        .await?;
        Ok(placed.order)
    }

    async fn list_orders(&self, user: &SessionUser) -> Result<Vec<OrderView>> {
        orders::list_orders_for(&self.db, user).await
    }

    async fn get_order(&self, user: &SessionUser, order_id: i64) -> Result<OrderView> {
        orders::get_order_for(&self.db, user, order_id).await
    }

    async fn update_status(
        &self,
        user: &SessionUser,
        order_id: i64,
        request: TransitionRequest,
    ) -> Result<TransitionOutcome> {
        fulfillment::apply_request(&self.db, user, order_id, &request).await
    }

    async fn verify_otp(&self, user: &SessionUser, code: &str) -> Result<OtpVerification> {
        fulfillment::verify_otp(&self.db, user, code).await
    }
}
