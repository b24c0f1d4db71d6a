//! Route handlers. Each one extracts the caller, delegates to `core`, and wraps the
//! result in JSON.

use super::AppState;
use crate::{
    core::{
        fulfillment::{self, OtpVerification, TransitionOutcome, TransitionRequest},
        identity::SessionUser,
        inventory,
        orders::{self, OrderView},
        report::{self, VendorSummary},
        submission::{self, NewOrder},
    },
    entities::inventory_item,
    errors::{Error, Result},
};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use serde::Deserialize;

type JsonBody<T> = std::result::Result<Json<T>, JsonRejection>;
type OrderId = std::result::Result<Path<i64>, PathRejection>;

fn body<T>(payload: JsonBody<T>) -> Result<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| Error::validation(e.body_text()))
}

fn order_id(path: OrderId) -> Result<i64> {
    path.map(|Path(id)| id)
        .map_err(|e| Error::validation(e.body_text()))
}

/// `GET /api/health`
pub async fn health() -> &'static str {
    "ok"
}

/// `GET /api/inventory`
pub async fn list_inventory(
    State(state): State<AppState>,
) -> Result<Json<Vec<inventory_item::Model>>> {
    Ok(Json(inventory::list_available(&state.db).await?))
}

/// Query string of `GET /api/orders`
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// OTP, id or email fragment
    pub q: Option<String>,
}

/// `GET /api/orders`
pub async fn list_orders(
    State(state): State<AppState>,
    user: SessionUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<OrderView>>> {
    let orders = orders::list_orders_for(&state.db, &user).await?;
    let orders = match query.q.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => report::search_orders(&orders, q)
            .into_iter()
            .cloned()
            .collect(),
        _ => orders,
    };
    Ok(Json(orders))
}

/// `POST /api/orders`; 201 for a new order, 200 when a client ref was replayed.
pub async fn create_order(
    State(state): State<AppState>,
    user: SessionUser,
    payload: JsonBody<NewOrder>,
) -> Result<(StatusCode, Json<OrderView>)> {
    let new_order = body(payload)?;
    let placed = submission::submit_order_as(
        &state.db,
        &user,
        new_order,
        state.otp_generator.as_ref(),
        &state.policy,
    )
    .await?;

    let status = if placed.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(placed.order)))
}

/// `GET /api/orders/{id}`
pub async fn get_order(
    State(state): State<AppState>,
    user: SessionUser,
    id: OrderId,
) -> Result<Json<OrderView>> {
    let id = order_id(id)?;
    Ok(Json(orders::get_order_for(&state.db, &user, id).await?))
}

/// `PATCH /api/orders/{id}`
pub async fn update_status(
    State(state): State<AppState>,
    user: SessionUser,
    id: OrderId,
    payload: JsonBody<TransitionRequest>,
) -> Result<Json<TransitionOutcome>> {
    let id = order_id(id)?;
    let request = body(payload)?;
    Ok(Json(
        fulfillment::apply_request(&state.db, &user, id, &request).await?,
    ))
}

/// Body of `POST /api/orders/verify`
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    /// Code read out by the student
    pub otp: String,
}

/// `POST /api/orders/verify`
pub async fn verify_otp(
    State(state): State<AppState>,
    user: SessionUser,
    payload: JsonBody<VerifyRequest>,
) -> Result<Json<OtpVerification>> {
    let request = body(payload)?;
    Ok(Json(
        fulfillment::verify_otp(&state.db, &user, &request.otp).await?,
    ))
}

/// `GET /api/orders/summary`
pub async fn vendor_summary(
    State(state): State<AppState>,
    user: SessionUser,
) -> Result<Json<VendorSummary>> {
    user.require_vendor("view the order dashboard")?;
    let orders = orders::list_orders_for(&state.db, &user).await?;
    Ok(Json(report::vendor_summary(&orders)))
}
