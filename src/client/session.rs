//! The student's (or vendor's) working session.
//!
//! An [`OrderSession`] owns the draft outright; every mutation goes through `&mut self`.
//! Page counting runs in background tasks and only reaches the draft when the session
//! collects the results, so a count for a file that was removed in the meantime is
//! simply dropped.
//!
//! Calls that change server state are bounded by a timeout. When one expires the
//! session asks the server what actually happened before reporting anything.

use super::{
    OrderBackend,
    page_count::{PageCountResolver, PageCounter},
};
use crate::{
    config::AppConfig,
    core::{
        cart::{DraftOrder, NewItem, SettingUpdate, StationeryDescriptor},
        fulfillment::{OtpVerification, TransitionOutcome, TransitionRequest},
        identity::SessionUser,
        orders::OrderView,
        otp::Otp,
        pricing::PriceSheet,
        report::{self, UserSummary, VendorSummary},
        submission::NewOrder,
    },
    entities::{inventory_item, inventory_item::InventoryStatus, order::OrderStatus},
    errors::{Error, Result},
};
use std::{future::Future, path::Path, sync::Arc, time::Duration};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Default bound on submission and transition calls
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Draft, order list and actions for one signed-in user
pub struct OrderSession {
    user: SessionUser,
    backend: Arc<dyn OrderBackend>,
    draft: DraftOrder,
    prices: PriceSheet,
    page_counts: PageCountResolver,
    request_timeout: Duration,
    orders: Vec<OrderView>,
    /// Client ref of a submission whose outcome is unknown; reused until the draft changes
    pending_client_ref: Option<String>,
}

impl OrderSession {
    /// A session with an empty draft and default pricing.
    #[must_use]
    pub fn new(
        user: SessionUser,
        backend: Arc<dyn OrderBackend>,
        counter: Arc<dyn PageCounter>,
    ) -> Self {
        Self {
            user,
            backend,
            draft: DraftOrder::new(),
            prices: PriceSheet::default(),
            page_counts: PageCountResolver::new(counter),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            orders: Vec::new(),
            pending_client_ref: None,
        }
    }

    /// A session priced and bounded by `config`.
    #[must_use]
    pub fn configured(
        user: SessionUser,
        backend: Arc<dyn OrderBackend>,
        counter: Arc<dyn PageCounter>,
        config: &AppConfig,
    ) -> Self {
        Self::new(user, backend, counter)
            .with_prices(config.pricing)
            .with_request_timeout(config.sync.request_timeout())
    }

    /// Uses `prices` for the live total.
    #[must_use]
    pub const fn with_prices(mut self, prices: PriceSheet) -> Self {
        self.prices = prices;
        self
    }

    /// Bounds submission and transition calls by `timeout`.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Continues from a saved draft.
    #[must_use]
    pub fn with_draft(mut self, draft: DraftOrder) -> Self {
        self.draft = draft;
        self.pending_client_ref = None;
        self
    }

    /// The signed-in user.
    #[must_use]
    pub const fn user(&self) -> &SessionUser {
        &self.user
    }

    /// The current draft.
    #[must_use]
    pub const fn draft(&self) -> &DraftOrder {
        &self.draft
    }

    /// Orders as of the last refresh or action.
    #[must_use]
    pub fn orders(&self) -> &[OrderView] {
        &self.orders
    }

    // ---- draft -------------------------------------------------------------

    /// Adds an upload or stationery line. Uploads get a page count scheduled.
    pub fn add_file(&mut self, item: impl Into<NewItem>) -> String {
        let item = item.into();
        let upload = match &item {
            NewItem::Upload(upload) => Some(upload.clone()),
            NewItem::Stationery(_) => None,
        };
        let id = self.draft.add_file(item);
        self.pending_client_ref = None;
        if let Some(upload) = upload {
            self.page_counts.schedule(id.clone(), upload);
        }
        id
    }

    /// Adds a catalog item, if it is still on offer.
    pub fn add_stationery(&mut self, item: &inventory_item::Model) -> Result<String> {
        if item.status != InventoryStatus::Active || item.stock <= 0 {
            return Err(Error::validation(format!("'{}' is not available", item.name)));
        }
        Ok(self.add_file(StationeryDescriptor::from(item)))
    }

    /// Removes an item and cancels its page count. No-op for unknown ids.
    pub fn remove_file(&mut self, id: &str) -> bool {
        self.page_counts.cancel(id);
        let removed = self.draft.remove_file(id);
        self.mark_changed(removed)
    }

    /// Changes one print setting.
    pub fn update_settings(&mut self, update: SettingUpdate) {
        self.draft.update_settings(update);
        self.pending_client_ref = None;
    }

    /// Records a page count directly.
    pub fn update_file_page_count(&mut self, id: &str, count: u32) -> bool {
        let updated = self.draft.update_file_page_count(id, count);
        self.mark_changed(updated)
    }

    /// Applies every page count that has finished. Returns how many were applied.
    pub fn apply_page_counts(&mut self) -> usize {
        let mut applied = 0;
        while let Some(result) = self.page_counts.try_next() {
            if self.update_file_page_count(&result.file_id, result.page_count) {
                applied += 1;
            }
        }
        applied
    }

    /// Waits until every scheduled page count has finished and applies them.
    pub async fn wait_for_page_counts(&mut self) -> usize {
        let mut applied = 0;
        while let Some(result) = self.page_counts.next().await {
            if self.update_file_page_count(&result.file_id, result.page_count) {
                applied += 1;
            }
        }
        applied
    }

    /// A changed draft is a different cart; its submissions get a new client ref.
    fn mark_changed(&mut self, changed: bool) -> bool {
        if changed {
            self.pending_client_ref = None;
        }
        changed
    }

    /// Page counts still being resolved.
    #[must_use]
    pub fn pending_page_counts(&self) -> usize {
        self.page_counts.pending()
    }

    /// Live total; provisional while page counts are pending.
    #[must_use]
    pub fn total(&self) -> i64 {
        self.draft.calculate_total(&self.prices)
    }

    /// Writes the draft to `path`.
    pub fn save_draft<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.draft.save(path)
    }

    // ---- orders ------------------------------------------------------------

    /// Submits the draft at `total`.
    ///
    /// On success the draft is cleared and the placed order returned. On failure the
    /// draft is left exactly as it was.
    ///
    /// Page counts that finished since the caller read [`Self::total`] are applied
    /// first; if that moves the total, [`Error::TotalMismatch`] is returned without
    /// contacting the server. A submission whose outcome is unknown (timeout) keeps
    /// its client ref, and a retry of the unchanged draft sends the same ref, so
    /// the server answers with the order it already stored.
    #[instrument(skip(self), fields(user = %self.user.id))]
    pub async fn place_order(&mut self, total: i64) -> Result<OrderView> {
        if self.draft.is_empty() {
            return Err(Error::EmptyDraft);
        }
        self.apply_page_counts();
        let computed = self.total();
        if computed != total {
            return Err(Error::TotalMismatch {
                submitted: total,
                computed,
            });
        }

        let client_ref = self
            .pending_client_ref
            .get_or_insert_with(|| Uuid::new_v4().to_string())
            .clone();
        let new_order = NewOrder {
            files: self.draft.files().to_vec(),
            settings: *self.draft.settings(),
            total_amount: total,
            user_id: self.user.id.clone(),
            user_email: self.user.email.clone(),
            client_ref: Some(client_ref.clone()),
        };

        let submitted = self
            .bounded("place order", self.backend.submit_order(&self.user, new_order))
            .await;

        let order = match submitted {
            Err(Error::Timeout { operation }) => {
                warn!(%client_ref, "Submission timed out, checking whether it went through");
                // Any failure here leaves the outcome unknown; the ref stays pending.
                self.find_submitted(&client_ref)
                    .await?
                    .ok_or(Error::Timeout { operation })?
            }
            Err(e) => {
                if !e.is_retryable() {
                    self.pending_client_ref = None;
                }
                return Err(e);
            }
            Ok(order) => order,
        };

        info!(order_id = order.id, otp = %order.otp, "Order placed");
        self.pending_client_ref = None;
        self.draft.clear();
        self.remember(order.clone());
        Ok(order)
    }

    async fn find_submitted(&self, client_ref: &str) -> Result<Option<OrderView>> {
        let orders = self
            .bounded("list orders", self.backend.list_orders(&self.user))
            .await?;
        Ok(orders
            .into_iter()
            .find(|o| o.client_ref.as_deref() == Some(client_ref)))
    }

    /// Reloads the order list.
    pub async fn refresh(&mut self) -> Result<&[OrderView]> {
        self.orders = self
            .bounded("list orders", self.backend.list_orders(&self.user))
            .await?;
        Ok(&self.orders)
    }

    /// Vendor: `paid -> printed`.
    pub async fn mark_as_printed(&mut self, order_id: i64) -> Result<TransitionOutcome> {
        self.transition(order_id, TransitionRequest::to(OrderStatus::Printed))
            .await
    }

    /// Vendor: `printed -> collected`.
    pub async fn mark_as_collected(&mut self, order_id: i64) -> Result<TransitionOutcome> {
        self.transition(order_id, TransitionRequest::to(OrderStatus::Collected))
            .await
    }

    /// Vendor: hand over an order that may not have been marked printed.
    pub async fn collect_with_override(
        &mut self,
        order_id: i64,
        reason: &str,
    ) -> Result<TransitionOutcome> {
        if reason.trim().is_empty() {
            return Err(Error::validation("an override needs a reason"));
        }
        self.transition(order_id, TransitionRequest::override_collect(reason))
            .await
    }

    async fn transition(
        &mut self,
        order_id: i64,
        request: TransitionRequest,
    ) -> Result<TransitionOutcome> {
        self.user
            .require_vendor(&format!("mark orders {}", request.status))?;
        let target = request.status;

        let result = self
            .bounded(
                "update order status",
                self.backend.update_status(&self.user, order_id, request),
            )
            .await;

        let outcome = match result {
            Err(Error::Timeout { operation }) => {
                warn!(order_id, "Status update timed out, re-reading the order");
                let current = self
                    .bounded("get order", self.backend.get_order(&self.user, order_id))
                    .await?;
                if current.status == target {
                    TransitionOutcome::Applied(current)
                } else {
                    return Err(Error::Timeout { operation });
                }
            }
            Err(e @ Error::IllegalTransition { .. }) => {
                // Pull the authoritative state so the next render is not stale.
                if let Err(refresh_error) = self.refresh().await {
                    warn!("Refresh after conflict failed: {refresh_error}");
                }
                return Err(e);
            }
            other => other?,
        };

        self.remember(outcome.order().clone());
        Ok(outcome)
    }

    /// Vendor: looks up the active order holding `code`. Never changes anything.
    pub async fn verify_otp(&self, code: &str) -> Result<OtpVerification> {
        self.user.require_vendor("verify pickup codes")?;
        let otp: Otp = code.parse()?;
        self.bounded(
            "verify otp",
            self.backend.verify_otp(&self.user, otp.as_str()),
        )
        .await
    }

    /// Stationery on offer.
    pub async fn inventory(&self) -> Result<Vec<inventory_item::Model>> {
        self.bounded("list inventory", self.backend.list_inventory())
            .await
    }

    /// The signed-in student's totals over the cached orders.
    #[must_use]
    pub fn user_summary(&self) -> UserSummary {
        report::user_summary(&self.orders, &self.user.id)
    }

    /// Dashboard totals over the cached orders.
    #[must_use]
    pub fn vendor_summary(&self) -> VendorSummary {
        report::vendor_summary(&self.orders)
    }

    fn remember(&mut self, order: OrderView) {
        match self.orders.iter_mut().find(|o| o.id == order.id) {
            Some(existing) => *existing = order,
            None => self.orders.insert(0, order),
        }
    }

    async fn bounded<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.request_timeout, call)
            .await
            .map_err(|_| Error::Timeout {
                operation: operation.to_string(),
            })?
    }
}
