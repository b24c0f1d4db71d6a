//! Order submission and OTP issuance.
//!
//! Turns a submitted cart into a persisted `paid` order. Validation happens before
//! anything is written. The order row, its file snapshot and the first status event
//! are committed in one transaction, so a failed submission leaves nothing behind.
//!
//! OTP uniqueness among active orders is checked inside the transaction and backed
//! by a partial unique index; a collision at either point just draws another code,
//! up to the configured number of attempts.

use crate::{
    core::{
        cart::{FileItem, PrintSettings},
        identity::SessionUser,
        orders::{self, OrderView},
        otp::{self, OtpGenerator},
        pricing::PriceSheet,
    },
    entities::{OrderFile, order, order::OrderStatus, order_file, order_status_event},
    errors::{Error, Result},
};
use sea_orm::{Set, SqlErr, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

/// Default number of OTP candidates drawn before giving up
pub const DEFAULT_MAX_OTP_ATTEMPTS: u32 = 32;

/// A cart submitted for payment (`POST /api/orders` body)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    /// Items in print order
    pub files: Vec<FileItem>,
    /// Settings for every document
    pub settings: PrintSettings,
    /// Total the student agreed to pay
    pub total_amount: i64,
    /// Submitting user
    pub user_id: String,
    /// Submitting user's email
    pub user_email: String,
    /// Idempotency key for this submission attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ref: Option<String>,
}

/// Server-side rules applied to every submission
#[derive(Debug, Clone, Copy)]
pub struct SubmissionPolicy {
    /// Rates used to check the submitted total
    pub prices: PriceSheet,
    /// OTP candidates to try before failing
    pub max_otp_attempts: u32,
}

impl Default for SubmissionPolicy {
    fn default() -> Self {
        Self {
            prices: PriceSheet::default(),
            max_otp_attempts: DEFAULT_MAX_OTP_ATTEMPTS,
        }
    }
}

/// Result of a successful submission
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    /// The persisted order
    pub order: OrderView,
    /// `true` when the client ref matched an order created by an earlier attempt
    pub replayed: bool,
}

/// Checks a submission without touching the database.
pub fn validate_new_order(new_order: &NewOrder, prices: &PriceSheet) -> Result<()> {
    if new_order.files.is_empty() {
        return Err(Error::EmptyDraft);
    }
    if new_order.user_id.trim().is_empty() {
        return Err(Error::validation("user id cannot be empty"));
    }
    if new_order.user_email.trim().is_empty() {
        return Err(Error::validation("user email cannot be empty"));
    }
    new_order.settings.validate()?;

    let mut seen = HashSet::new();
    for file in &new_order.files {
        if !seen.insert(file.id.as_str()) {
            return Err(Error::validation(format!("duplicate file item id '{}'", file.id)));
        }
    }

    if new_order.total_amount < 0 {
        return Err(Error::validation("total amount cannot be negative"));
    }
    let computed = prices.total_for(&new_order.files, &new_order.settings);
    if computed != new_order.total_amount {
        return Err(Error::TotalMismatch {
            submitted: new_order.total_amount,
            computed,
        });
    }
    Ok(())
}

/// Persists a submitted cart as a `paid` order with a fresh OTP.
///
/// If `client_ref` matches an order this user already placed, that order is
/// returned instead and nothing new is written.
#[instrument(skip_all, fields(user_id = %new_order.user_id, items = new_order.files.len()))]
pub async fn create_order(
    db: &DatabaseConnection,
    new_order: NewOrder,
    generator: &dyn OtpGenerator,
    policy: &SubmissionPolicy,
) -> Result<PlacedOrder> {
    validate_new_order(&new_order, &policy.prices)?;

    if let Some(existing) = replayed_order(db, &new_order).await? {
        info!(order_id = existing.id, "Submission replayed, returning existing order");
        return Ok(PlacedOrder {
            order: existing,
            replayed: true,
        });
    }

    for attempt in 1..=policy.max_otp_attempts {
        let candidate = generator.generate();
        if !otp::is_available(db, &candidate).await? {
            debug!(attempt, "OTP candidate collides with an active order");
            continue;
        }

        // Write-only transaction: the active-OTP index settles races with
        // concurrent submissions.
        let txn = db.begin().await?;
        match insert_order(&txn, &new_order, candidate.as_str()).await {
            Ok(order_id) => {
                txn.commit().await?;
                let order = orders::load_order_view(db, order_id)
                    .await?
                    .ok_or(Error::OrderNotFound { id: order_id })?;
                info!(
                    order_id,
                    total = order.total_amount,
                    attempt,
                    "Order placed"
                );
                return Ok(PlacedOrder {
                    order,
                    replayed: false,
                });
            }
            Err(Error::Database(e)) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                txn.rollback().await?;
                if let Some(existing) = replayed_order(db, &new_order).await? {
                    info!(order_id = existing.id, "Concurrent replay of the same submission");
                    return Ok(PlacedOrder {
                        order: existing,
                        replayed: true,
                    });
                }
                debug!(attempt, "OTP taken by a concurrent submission");
            }
            Err(e) => return Err(e),
        }
    }

    warn!(
        attempts = policy.max_otp_attempts,
        "Gave up issuing a unique OTP"
    );
    Err(Error::OtpCollisionExhausted {
        attempts: policy.max_otp_attempts,
    })
}

/// [`create_order`] on behalf of the session that submitted it.
///
/// The order must name the caller as its owner.
pub async fn submit_order_as(
    db: &DatabaseConnection,
    actor: &SessionUser,
    new_order: NewOrder,
    generator: &dyn OtpGenerator,
    policy: &SubmissionPolicy,
) -> Result<PlacedOrder> {
    if new_order.user_id != actor.id {
        return Err(Error::Forbidden {
            role: actor.role,
            action: "place orders for another user".to_string(),
        });
    }
    create_order(db, new_order, generator, policy).await
}

async fn replayed_order(db: &DatabaseConnection, new_order: &NewOrder) -> Result<Option<OrderView>> {
    match new_order.client_ref.as_deref() {
        Some(client_ref) => orders::find_by_client_ref(db, &new_order.user_id, client_ref).await,
        None => Ok(None),
    }
}

async fn insert_order<C>(db: &C, new_order: &NewOrder, otp: &str) -> Result<i64>
where
    C: ConnectionTrait,
{
    let now = chrono::Utc::now();
    let order = order::ActiveModel {
        user_id: Set(new_order.user_id.clone()),
        user_email: Set(new_order.user_email.trim().to_string()),
        otp: Set(otp.to_string()),
        color: Set(new_order.settings.color),
        double_sided: Set(new_order.settings.double_sided),
        copies: Set(i32::try_from(new_order.settings.copies).unwrap_or(i32::MAX)),
        total_amount: Set(new_order.total_amount),
        status: Set(OrderStatus::Paid),
        client_ref: Set(new_order.client_ref.clone()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let files = new_order
        .files
        .iter()
        .enumerate()
        .map(|(position, file)| order_file::ActiveModel {
            order_id: Set(order.id),
            position: Set(i32::try_from(position).unwrap_or(i32::MAX)),
            item_id: Set(file.id.clone()),
            name: Set(file.name.clone()),
            size: Set(i64::try_from(file.size).unwrap_or(i64::MAX)),
            item_type: Set(file.item_type().to_string()),
            page_count: Set(i32::try_from(file.page_count).unwrap_or(i32::MAX)),
            price: Set(file.price()),
            payload_ref: Set(file.payload_ref.clone()),
            ..Default::default()
        });
    OrderFile::insert_many(files).exec(db).await?;

    order_status_event::ActiveModel {
        order_id: Set(order.id),
        from_status: Set(None),
        to_status: Set(OrderStatus::Paid),
        actor_id: Set(new_order.user_id.clone()),
        is_override: Set(false),
        reason: Set(None),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(order.id)
}
