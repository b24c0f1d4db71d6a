//! REST API over the order lifecycle.
//!
//! Callers are identified by headers set upstream (see [`identity`]); students only
//! ever see their own orders and every fulfillment route is vendor-only. Errors are
//! rendered by [`error`].

pub mod error;
pub mod handlers;
pub mod identity;

use crate::{
    config::AppConfig,
    core::{
        otp::{OtpGenerator, RandomOtpGenerator},
        submission::SubmissionPolicy,
    },
    errors::Result,
};
use axum::{
    Router,
    http::{HeaderName, Method, header::CONTENT_TYPE},
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use std::{future::Future, sync::Arc, time::Duration};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    /// Order database
    pub db: DatabaseConnection,
    /// Source of pickup codes
    pub otp_generator: Arc<dyn OtpGenerator>,
    /// Pricing and OTP rules applied to submissions
    pub policy: SubmissionPolicy,
}

impl AppState {
    /// State with random OTPs and the configured pricing.
    #[must_use]
    pub fn new(db: DatabaseConnection, config: &AppConfig) -> Self {
        Self {
            db,
            otp_generator: Arc::new(RandomOtpGenerator),
            policy: SubmissionPolicy {
                prices: config.pricing,
                max_otp_attempts: config.otp.max_attempts.max(1),
            },
        }
    }

    /// Replaces the OTP source.
    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn OtpGenerator>) -> Self {
        self.otp_generator = generator;
        self
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static(identity::USER_ID_HEADER),
            HeaderName::from_static(identity::USER_EMAIL_HEADER),
            HeaderName::from_static(identity::USER_NAME_HEADER),
            HeaderName::from_static(identity::USER_ROLE_HEADER),
        ])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/inventory", get(handlers::list_inventory))
        .route(
            "/api/orders",
            get(handlers::list_orders).post(handlers::create_order),
        )
        .route("/api/orders/summary", get(handlers::vendor_summary))
        .route("/api/orders/verify", post(handlers::verify_otp))
        .route(
            "/api/orders/{id}",
            get(handlers::get_order).patch(handlers::update_status),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serves the API on `listener` until Ctrl+C or SIGTERM.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    serve_with_shutdown(listener, state, shutdown_signal()).await
}

/// Serves the API on `listener` until `shutdown` resolves.
pub async fn serve_with_shutdown<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(address) = listener.local_addr() {
        info!("Server running on {address}");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, shutting down");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
