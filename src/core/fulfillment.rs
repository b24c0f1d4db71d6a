//! Fulfillment tracker - vendor-driven status transitions and OTP verification.
//!
//! ```text
//! paid ──(mark_as_printed)──> printed ──(mark_as_collected)──> collected
//! ```
//!
//! Every transition is a guarded conditional update: the status only changes if it
//! still equals the expected predecessor. A request whose target status is already
//! in place is a no-op ([`TransitionOutcome::Unchanged`]); any other mismatch is a
//! conflict and leaves the order untouched, so a stale vendor screen can never move
//! an order backwards.
//!
//! Skipping `printed` is only possible through [`collect_with_override`], which
//! demands a reason and flags the history row.

use crate::{
    core::{
        identity::SessionUser,
        orders::{self, OrderView},
        otp::{self, Otp},
    },
    entities::{Order, order, order::OrderStatus, order_status_event},
    errors::{Error, Result},
};
use sea_orm::{Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// What a transition request did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "order", rename_all = "lowercase")]
pub enum TransitionOutcome {
    /// The status moved
    Applied(OrderView),
    /// The order was already in the requested status; nothing changed
    Unchanged(OrderView),
}

impl TransitionOutcome {
    /// The order after the request.
    #[must_use]
    pub const fn order(&self) -> &OrderView {
        match self {
            Self::Applied(order) | Self::Unchanged(order) => order,
        }
    }

    /// Consumes the outcome, returning the order.
    #[must_use]
    pub fn into_order(self) -> OrderView {
        match self {
            Self::Applied(order) | Self::Unchanged(order) => order,
        }
    }

    /// `true` if this request changed the status.
    #[must_use]
    pub const fn was_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Identity of an order matched by its pickup code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedOrder {
    /// Order id
    pub id: i64,
    /// Current status
    pub status: OrderStatus,
    /// Student email, for the counter to confirm identity
    pub user_email: String,
    /// The next regular transition, if any
    pub next_status: Option<OrderStatus>,
}

/// Answer to an OTP lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpVerification {
    /// Whether an active order holds the code
    pub matched: bool,
    /// The matching order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<MatchedOrder>,
}

impl OtpVerification {
    /// No active order holds the code.
    #[must_use]
    pub const fn not_found() -> Self {
        Self {
            matched: false,
            order: None,
        }
    }

    /// An active order holds the code.
    #[must_use]
    pub const fn found(order: MatchedOrder) -> Self {
        Self {
            matched: true,
            order: Some(order),
        }
    }
}

/// Body of a status change request (`PATCH /api/orders/{id}`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRequest {
    /// Requested status
    pub status: OrderStatus,
    /// Skip `printed` on the way to `collected`
    #[serde(default, rename = "override")]
    pub override_printed: bool,
    /// Required with `override`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TransitionRequest {
    /// A regular transition to `status`.
    #[must_use]
    pub const fn to(status: OrderStatus) -> Self {
        Self {
            status,
            override_printed: false,
            reason: None,
        }
    }

    /// An override collection with `reason`.
    pub fn override_collect(reason: impl Into<String>) -> Self {
        Self {
            status: OrderStatus::Collected,
            override_printed: true,
            reason: Some(reason.into()),
        }
    }
}

/// Carries out a [`TransitionRequest`].
pub async fn apply_request(
    db: &DatabaseConnection,
    actor: &SessionUser,
    order_id: i64,
    request: &TransitionRequest,
) -> Result<TransitionOutcome> {
    if !request.override_printed {
        return transition_order(db, actor, order_id, request.status).await;
    }
    if request.status != OrderStatus::Collected {
        return Err(Error::validation("override only applies to collection"));
    }
    collect_with_override(db, actor, order_id, request.reason.as_deref().unwrap_or_default()).await
}

/// Moves an order to `target` along the regular lifecycle.
///
/// `target` must be `printed` or `collected`; orders cannot be moved back to `paid`.
#[instrument(skip(db, actor), fields(actor = %actor.id))]
pub async fn transition_order(
    db: &DatabaseConnection,
    actor: &SessionUser,
    order_id: i64,
    target: OrderStatus,
) -> Result<TransitionOutcome> {
    actor.require_vendor(&format!("mark orders {target}"))?;
    let from = target
        .expected_predecessor()
        .ok_or_else(|| Error::validation(format!("orders cannot be moved to {target}")))?;
    apply_guarded(db, actor, order_id, from, target, None).await
}

/// `paid -> printed`
pub async fn mark_as_printed(
    db: &DatabaseConnection,
    actor: &SessionUser,
    order_id: i64,
) -> Result<TransitionOutcome> {
    transition_order(db, actor, order_id, OrderStatus::Printed).await
}

/// `printed -> collected`
pub async fn mark_as_collected(
    db: &DatabaseConnection,
    actor: &SessionUser,
    order_id: i64,
) -> Result<TransitionOutcome> {
    transition_order(db, actor, order_id, OrderStatus::Collected).await
}

/// Hands an order over even if it was never marked printed.
///
/// From `printed` this behaves like [`mark_as_collected`]. From `paid` it skips
/// `printed` and records the skip, with `reason`, in the status history.
#[instrument(skip(db, actor), fields(actor = %actor.id))]
pub async fn collect_with_override(
    db: &DatabaseConnection,
    actor: &SessionUser,
    order_id: i64,
    reason: &str,
) -> Result<TransitionOutcome> {
    actor.require_vendor("override order collection")?;
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(Error::validation("an override needs a reason"));
    }

    let current = orders::load_order_view(db, order_id)
        .await?
        .ok_or(Error::OrderNotFound { id: order_id })?;

    match current.status {
        OrderStatus::Collected => Ok(TransitionOutcome::Unchanged(current)),
        OrderStatus::Printed => {
            apply_guarded(db, actor, order_id, OrderStatus::Printed, OrderStatus::Collected, None)
                .await
        }
        OrderStatus::Paid => {
            warn!(order_id, reason, "Vendor override: collecting an unprinted order");
            apply_guarded(
                db,
                actor,
                order_id,
                OrderStatus::Paid,
                OrderStatus::Collected,
                Some(reason),
            )
            .await
        }
    }
}

async fn apply_guarded(
    db: &DatabaseConnection,
    actor: &SessionUser,
    order_id: i64,
    from: OrderStatus,
    to: OrderStatus,
    override_reason: Option<&str>,
) -> Result<TransitionOutcome> {
    let now = chrono::Utc::now();
    let txn = db.begin().await?;

    let updated = Order::update_many()
        .set(order::ActiveModel {
            status: Set(to),
            updated_at: Set(now),
            ..Default::default()
        })
        .filter(order::Column::Id.eq(order_id))
        .filter(order::Column::Status.eq(from))
        .exec(&txn)
        .await?;

    if updated.rows_affected == 1 {
        order_status_event::ActiveModel {
            order_id: Set(order_id),
            from_status: Set(Some(from)),
            to_status: Set(to),
            actor_id: Set(actor.id.clone()),
            is_override: Set(override_reason.is_some()),
            reason: Set(override_reason.map(str::to_string)),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        info!(order_id, %from, %to, "Order status changed");
        let order = orders::load_order_view(db, order_id)
            .await?
            .ok_or(Error::OrderNotFound { id: order_id })?;
        return Ok(TransitionOutcome::Applied(order));
    }

    txn.rollback().await?;
    let current = orders::load_order_view(db, order_id)
        .await?
        .ok_or(Error::OrderNotFound { id: order_id })?;

    if current.status == to {
        info!(order_id, %to, "Transition already applied, nothing to do");
        Ok(TransitionOutcome::Unchanged(current))
    } else {
        warn!(
            order_id,
            current = %current.status,
            requested = %to,
            "Rejected stale or illegal transition"
        );
        Err(Error::IllegalTransition {
            id: order_id,
            current: current.status,
            requested: to,
        })
    }
}

/// Looks up the active order holding `code`. Never changes anything.
#[instrument(skip(db, actor), fields(actor = %actor.id))]
pub async fn verify_otp(
    db: &DatabaseConnection,
    actor: &SessionUser,
    code: &str,
) -> Result<OtpVerification> {
    actor.require_vendor("verify pickup codes")?;
    let otp: Otp = code.parse()?;

    Ok(otp::find_active_by_otp(db, &otp)
        .await?
        .map_or_else(OtpVerification::not_found, |order| {
            OtpVerification::found(MatchedOrder {
                id: order.id,
                status: order.status,
                user_email: order.user_email,
                next_status: order.status.next(),
            })
        }))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_full_lifecycle() -> Result<()> {
        let db = setup_test_db().await?;
        let vendor = test_vendor();
        let order = create_test_order_with_otp(&db, "student-1", "1234").await?;

        let printed = mark_as_printed(&db, &vendor, order.id).await?;
        assert!(printed.was_applied());
        assert_eq!(printed.order().status, OrderStatus::Printed);

        let collected = mark_as_collected(&db, &vendor, order.id).await?;
        assert!(collected.was_applied());
        assert_eq!(collected.order().status, OrderStatus::Collected);

        let again = mark_as_collected(&db, &vendor, order.id).await?;
        assert!(!again.was_applied());
        assert_eq!(again.order().status, OrderStatus::Collected);

        let history = orders::status_history(&db, order.id).await?;
        let statuses: Vec<OrderStatus> = history.iter().map(|e| e.to_status).collect();
        assert_eq!(
            statuses,
            [OrderStatus::Paid, OrderStatus::Printed, OrderStatus::Collected]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_repeat_print_is_noop() -> Result<()> {
        let db = setup_test_db().await?;
        let vendor = test_vendor();
        let order = create_test_order_with_otp(&db, "student-1", "1234").await?;

        mark_as_printed(&db, &vendor, order.id).await?;
        let again = mark_as_printed(&db, &vendor, order.id).await?;
        assert!(matches!(again, TransitionOutcome::Unchanged(_)));
        assert_eq!(orders::status_history(&db, order.id).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_collect_requires_printed() -> Result<()> {
        let db = setup_test_db().await?;
        let order = create_test_order_with_otp(&db, "student-1", "1234").await?;

        let result = mark_as_collected(&db, &test_vendor(), order.id).await;
        assert!(matches!(
            result,
            Err(Error::IllegalTransition {
                current: OrderStatus::Paid,
                requested: OrderStatus::Collected,
                ..
            })
        ));
        let view = orders::load_order_view(&db, order.id).await?.unwrap();
        assert_eq!(view.status, OrderStatus::Paid);
        Ok(())
    }

    #[tokio::test]
    async fn test_collected_never_goes_back_to_printed() -> Result<()> {
        let db = setup_test_db().await?;
        let vendor = test_vendor();
        let order = create_test_order_with_otp(&db, "student-1", "1234").await?;
        mark_as_printed(&db, &vendor, order.id).await?;
        mark_as_collected(&db, &vendor, order.id).await?;

        let result = mark_as_printed(&db, &vendor, order.id).await;
        assert!(matches!(result, Err(Error::IllegalTransition { .. })));
        let view = orders::load_order_view(&db, order.id).await?.unwrap();
        assert_eq!(view.status, OrderStatus::Collected);
        Ok(())
    }

    #[tokio::test]
    async fn test_students_cannot_transition() -> Result<()> {
        let db = setup_test_db().await?;
        let order = create_test_order_with_otp(&db, "student-1", "1234").await?;

        let result = mark_as_printed(&db, &test_student("student-1"), order.id).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_order() -> Result<()> {
        let db = setup_test_db().await?;
        let result = mark_as_printed(&db, &test_vendor(), 404).await;
        assert!(matches!(result, Err(Error::OrderNotFound { id: 404 })));
        Ok(())
    }

    #[tokio::test]
    async fn test_cannot_target_paid() -> Result<()> {
        let db = setup_test_db().await?;
        let order = create_test_order_with_otp(&db, "student-1", "1234").await?;
        let result = transition_order(&db, &test_vendor(), order.id, OrderStatus::Paid).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_prints_apply_once() -> Result<()> {
        let db = setup_test_db().await?;
        let order = create_test_order_with_otp(&db, "student-1", "1234").await?;
        let vendor_a = test_vendor();
        let vendor_b = SessionUser::vendor("vendor-2", "desk2@campus.edu", "Second Desk");

        let (a, b) = tokio::join!(
            mark_as_printed(&db, &vendor_a, order.id),
            mark_as_printed(&db, &vendor_b, order.id)
        );
        let applied = [a?, b?].iter().filter(|o| o.was_applied()).count();
        assert_eq!(applied, 1);
        assert_eq!(orders::status_history(&db, order.id).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_override_from_paid_is_recorded() -> Result<()> {
        let db = setup_test_db().await?;
        let order = create_test_order_with_otp(&db, "student-1", "1234").await?;

        let outcome =
            collect_with_override(&db, &test_vendor(), order.id, "printed offline").await?;
        assert!(outcome.was_applied());
        assert_eq!(outcome.order().status, OrderStatus::Collected);

        let history = orders::status_history(&db, order.id).await?;
        let last = history.last().unwrap();
        assert!(last.is_override);
        assert_eq!(last.from_status, Some(OrderStatus::Paid));
        assert_eq!(last.reason.as_deref(), Some("printed offline"));
        Ok(())
    }

    #[tokio::test]
    async fn test_override_needs_reason() -> Result<()> {
        let db = setup_test_db().await?;
        let order = create_test_order_with_otp(&db, "student-1", "1234").await?;
        let result = collect_with_override(&db, &test_vendor(), order.id, "  ").await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_override_from_printed_is_regular() -> Result<()> {
        let db = setup_test_db().await?;
        let vendor = test_vendor();
        let order = create_test_order_with_otp(&db, "student-1", "1234").await?;
        mark_as_printed(&db, &vendor, order.id).await?;

        collect_with_override(&db, &vendor, order.id, "walk-in").await?;
        let history = orders::status_history(&db, order.id).await?;
        assert!(!history.last().unwrap().is_override);
        Ok(())
    }

    #[tokio::test]
    async fn test_apply_request() -> Result<()> {
        let db = setup_test_db().await?;
        let vendor = test_vendor();
        let order = create_test_order_with_otp(&db, "student-1", "1234").await?;

        let bad = TransitionRequest {
            status: OrderStatus::Printed,
            override_printed: true,
            reason: Some("why not".to_string()),
        };
        assert!(matches!(
            apply_request(&db, &vendor, order.id, &bad).await,
            Err(Error::Validation { .. })
        ));

        let outcome = apply_request(
            &db,
            &vendor,
            order.id,
            &TransitionRequest::override_collect("printer jammed, handed over originals"),
        )
        .await?;
        assert_eq!(outcome.order().status, OrderStatus::Collected);
        Ok(())
    }

    #[test]
    fn test_transition_request_wire_shape() {
        let request: TransitionRequest =
            serde_json::from_str(r#"{"status":"collected","override":true,"reason":"x"}"#)
                .unwrap();
        assert!(request.override_printed);
        let plain: TransitionRequest = serde_json::from_str(r#"{"status":"printed"}"#).unwrap();
        assert_eq!(plain, TransitionRequest::to(OrderStatus::Printed));
    }

    #[tokio::test]
    async fn test_outcome_wire_shape() -> Result<()> {
        let db = setup_test_db().await?;
        let order = create_test_order_with_otp(&db, "student-1", "1234").await?;
        let outcome = mark_as_printed(&db, &test_vendor(), order.id).await?;

        let json = serde_json::to_value(&outcome)?;
        assert_eq!(json["outcome"], "applied");
        assert_eq!(json["order"]["status"], "printed");
        assert_eq!(serde_json::from_value::<TransitionOutcome>(json)?, outcome);
        Ok(())
    }

    #[tokio::test]
    async fn test_verify_otp() -> Result<()> {
        let db = setup_test_db().await?;
        let vendor = test_vendor();
        let order = create_test_order_with_otp(&db, "student-1", "2468").await?;

        let found = verify_otp(&db, &vendor, "2468").await?;
        assert!(found.matched);
        let matched = found.order.unwrap();
        assert_eq!(matched.id, order.id);
        assert_eq!(matched.next_status, Some(OrderStatus::Printed));

        assert_eq!(verify_otp(&db, &vendor, "1357").await?, OtpVerification::not_found());

        mark_as_printed(&db, &vendor, order.id).await?;
        mark_as_collected(&db, &vendor, order.id).await?;
        assert!(!verify_otp(&db, &vendor, "2468").await?.matched);
        Ok(())
    }

    #[tokio::test]
    async fn test_verify_otp_rejects_malformed_code() -> Result<()> {
        let db = setup_test_db().await?;
        let result = verify_otp(&db, &test_vendor(), "12").await;
        assert!(matches!(result, Err(Error::InvalidOtp { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_verify_otp_is_read_only() -> Result<()> {
        let db = setup_test_db().await?;
        let order = create_test_order_with_otp(&db, "student-1", "8642").await?;
        verify_otp(&db, &test_vendor(), "8642").await?;
        let view = orders::load_order_view(&db, order.id).await?.unwrap();
        assert_eq!(view.status, OrderStatus::Paid);
        assert_eq!(orders::status_history(&db, order.id).await?.len(), 1);
        Ok(())
    }
}
