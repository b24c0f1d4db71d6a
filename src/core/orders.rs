//! Order read models and role-scoped queries.
//!
//! Students see only their own orders; vendors see all of them. Orders are always
//! returned newest first with their file snapshot in print order.

use crate::{
    core::{
        cart::{FileItem, FileItemPayload, PrintSettings},
        identity::{Role, SessionUser},
        otp::Otp,
    },
    entities::{Order, OrderFile, OrderStatusEvent, order, order::OrderStatus, order_file, order_status_event},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, QueryOrder, prelude::*};
use serde::{Deserialize, Serialize};

/// An order as both roles see it on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    /// Server-assigned id
    pub id: i64,
    /// Owner
    pub user_id: String,
    /// Owner's email
    pub user_email: String,
    /// Pickup code
    pub otp: Otp,
    /// Snapshot taken at submission
    pub files: Vec<FileItem>,
    /// Print settings at submission
    pub settings: PrintSettings,
    /// Amount charged
    pub total_amount: i64,
    /// Fulfillment state
    pub status: OrderStatus,
    /// Idempotency key of the submitting client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ref: Option<String>,
    /// Placement time
    pub created_at: DateTime<Utc>,
    /// Last status change
    pub updated_at: DateTime<Utc>,
}

impl OrderView {
    /// Assembles a view from an order row and its file rows.
    pub fn from_models(order: order::Model, mut files: Vec<order_file::Model>) -> Result<Self> {
        files.sort_by_key(|f| f.position);
        let files = files
            .into_iter()
            .map(file_item_from_row)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id: order.id,
            user_id: order.user_id,
            user_email: order.user_email,
            otp: order.otp.parse()?,
            files,
            settings: PrintSettings {
                color: order.color,
                double_sided: order.double_sided,
                copies: u32::try_from(order.copies).unwrap_or(1).max(1),
            },
            total_amount: order.total_amount,
            status: order.status,
            client_ref: order.client_ref,
            created_at: order.created_at,
            updated_at: order.updated_at,
        })
    }

    /// `true` while the order waits at the counter.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

fn file_item_from_row(row: order_file::Model) -> Result<FileItem> {
    FileItem::try_from(FileItemPayload {
        id: row.item_id,
        name: row.name,
        size: u64::try_from(row.size).unwrap_or(0),
        item_type: row.item_type,
        page_count: u32::try_from(row.page_count).unwrap_or(0),
        price: row.price,
        payload_ref: row.payload_ref,
    })
}

/// Loads one order with its files, regardless of owner.
pub async fn load_order_view<C>(db: &C, order_id: i64) -> Result<Option<OrderView>>
where
    C: ConnectionTrait,
{
    let Some(order) = Order::find_by_id(order_id).one(db).await? else {
        return Ok(None);
    };
    let files = OrderFile::find()
        .filter(order_file::Column::OrderId.eq(order_id))
        .order_by_asc(order_file::Column::Position)
        .all(db)
        .await?;
    OrderView::from_models(order, files).map(Some)
}

/// Lists the orders visible to `viewer`, newest first.
pub async fn list_orders_for<C>(db: &C, viewer: &SessionUser) -> Result<Vec<OrderView>>
where
    C: ConnectionTrait,
{
    let mut query = Order::find();
    if viewer.role == Role::User {
        query = query.filter(order::Column::UserId.eq(viewer.id.as_str()));
    }

    let mut rows = query.find_with_related(OrderFile).all(db).await?;
    rows.sort_by(|(a, _), (b, _)| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

    rows.into_iter()
        .map(|(order, files)| OrderView::from_models(order, files))
        .collect()
}

/// Fetches one order if `viewer` may see it.
///
/// A student asking for someone else's order gets [`Error::OrderNotFound`], the
/// same answer as for an id that does not exist.
pub async fn get_order_for<C>(db: &C, viewer: &SessionUser, order_id: i64) -> Result<OrderView>
where
    C: ConnectionTrait,
{
    match load_order_view(db, order_id).await? {
        Some(view) if viewer.is_vendor() || view.user_id == viewer.id => Ok(view),
        _ => Err(Error::OrderNotFound { id: order_id }),
    }
}

/// Finds an order previously submitted with `client_ref` by `user_id`.
pub async fn find_by_client_ref<C>(
    db: &C,
    user_id: &str,
    client_ref: &str,
) -> Result<Option<OrderView>>
where
    C: ConnectionTrait,
{
    let order = Order::find()
        .filter(order::Column::ClientRef.eq(client_ref))
        .filter(order::Column::UserId.eq(user_id))
        .one(db)
        .await?;
    match order {
        Some(order) => load_order_view(db, order.id).await,
        None => Ok(None),
    }
}

/// Status history of an order, oldest first.
pub async fn status_history<C>(db: &C, order_id: i64) -> Result<Vec<order_status_event::Model>>
where
    C: ConnectionTrait,
{
    OrderStatusEvent::find()
        .filter(order_status_event::Column::OrderId.eq(order_id))
        .order_by_asc(order_status_event::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
