//! Background polling of the order list.
//!
//! [`OrderSync`] keeps one task per subscription polling [`OrderBackend::list_orders`]
//! and publishing an [`OrderSnapshot`] over a `watch` channel. A failed poll keeps the
//! last good orders and only records the error.

use super::{OrderBackend, session::DEFAULT_REQUEST_TIMEOUT};
use crate::{
    config::settings::SyncConfig,
    core::{identity::SessionUser, orders::OrderView},
    errors::Error,
};
use chrono::{DateTime, Utc};
use std::{collections::HashSet, sync::Arc, time::Duration};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

/// The order list as of one poll
#[derive(Debug, Clone, Default)]
pub struct OrderSnapshot {
    /// Orders visible to the subscriber, newest first
    pub orders: Vec<OrderView>,
    /// Orders that were not in the previous snapshot
    pub new_orders: usize,
    /// When the orders were fetched; `None` before the first successful poll
    pub fetched_at: Option<DateTime<Utc>>,
    /// Error from the most recent poll, if it failed
    pub last_error: Option<String>,
}

/// Polls the backend until dropped
pub struct OrderSync {
    receiver: watch::Receiver<OrderSnapshot>,
    handle: JoinHandle<()>,
}

impl OrderSync {
    /// Starts polling immediately, then every `interval`.
    pub fn spawn(backend: Arc<dyn OrderBackend>, user: SessionUser, interval: Duration) -> Self {
        Self::spawn_with_timeout(backend, user, interval, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Like [`Self::spawn`], giving up on any single poll after `timeout`.
    pub fn spawn_with_timeout(
        backend: Arc<dyn OrderBackend>,
        user: SessionUser,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        let (sender, receiver) = watch::channel(OrderSnapshot::default());
        let handle = tokio::spawn(poll_loop(backend, user, interval, timeout, sender));
        Self { receiver, handle }
    }

    /// Polls at the configured `[sync]` interval and request timeout.
    pub fn from_config(
        backend: Arc<dyn OrderBackend>,
        user: SessionUser,
        config: &SyncConfig,
    ) -> Self {
        Self::spawn_with_timeout(backend, user, config.poll_interval(), config.request_timeout())
    }

    /// A receiver for snapshot updates.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<OrderSnapshot> {
        self.receiver.clone()
    }

    /// The most recent snapshot.
    #[must_use]
    pub fn latest(&self) -> OrderSnapshot {
        self.receiver.borrow().clone()
    }

    /// Waits for the next published snapshot. `None` if polling has stopped.
    pub async fn changed(&mut self) -> Option<OrderSnapshot> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}

impl Drop for OrderSync {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn poll_loop(
    backend: Arc<dyn OrderBackend>,
    user: SessionUser,
    interval: Duration,
    timeout: Duration,
    sender: watch::Sender<OrderSnapshot>,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut known: Option<HashSet<i64>> = None;

    info!(user = %user.id, ?interval, "Order sync started");
    loop {
        ticker.tick().await;

        let polled = time::timeout(timeout, backend.list_orders(&user))
            .await
            .unwrap_or_else(|_| {
                Err(Error::Timeout {
                    operation: "list orders".to_string(),
                })
            });

        match polled {
            Ok(orders) => {
                let ids: HashSet<i64> = orders.iter().map(|o| o.id).collect();
                // The first poll establishes the baseline.
                let new_orders = known
                    .as_ref()
                    .map_or(0, |previous| ids.difference(previous).count());
                if new_orders > 0 {
                    info!(new_orders, "New orders arrived");
                }
                debug!(count = orders.len(), "Orders refreshed");
                known = Some(ids);

                let snapshot = OrderSnapshot {
                    orders,
                    new_orders,
                    fetched_at: Some(Utc::now()),
                    last_error: None,
                };
                if sender.send(snapshot).is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!(user = %user.id, "Order poll failed: {e}");
                sender.send_modify(|snapshot| {
                    snapshot.new_orders = 0;
                    snapshot.last_error = Some(e.to_string());
                });
                if sender.is_closed() {
                    break;
                }
            }
        }
    }
    debug!(user = %user.id, "Order sync stopped");
}
