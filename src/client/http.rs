//! REST backend.
//!
//! Requests carry the session identity in the same headers the API reads. Error
//! responses are decoded back into [`Error`] so callers cannot tell this backend
//! apart from [`super::local::LocalBackend`].

use super::OrderBackend;
use crate::{
    api::{error::ErrorBody, identity},
    core::{
        fulfillment::{OtpVerification, TransitionOutcome, TransitionRequest},
        identity::SessionUser,
        orders::OrderView,
        submission::NewOrder,
    },
    entities::inventory_item,
    errors::{Error, Result},
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

/// [`OrderBackend`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    /// Backend for the API served at `base_url` (e.g. `http://localhost:8080`).
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("jprint/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Backend reusing an existing client.
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn as_user(builder: RequestBuilder, user: &SessionUser) -> RequestBuilder {
        builder
            .header(identity::USER_ID_HEADER, &user.id)
            .header(identity::USER_EMAIL_HEADER, &user.email)
            .header(identity::USER_NAME_HEADER, &user.name)
            .header(identity::USER_ROLE_HEADER, user.role.as_str())
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        let bytes = response.bytes().await?;

        if status.is_success() {
            return serde_json::from_slice(&bytes).map_err(|e| Error::MalformedResponse {
                message: format!("unexpected {status} body: {e}"),
            });
        }

        debug!(%status, "Order service returned an error");
        match serde_json::from_slice::<ErrorBody>(&bytes) {
            Ok(body) => Err(body.into_error(status.as_u16())),
            Err(_) => Err(Error::Server {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&bytes).into_owned(),
            }),
        }
    }
}

#[async_trait]
impl OrderBackend for HttpBackend {
    async fn list_inventory(&self) -> Result<Vec<inventory_item::Model>> {
        let response = self.client.get(self.url("/api/inventory")).send().await?;
        Self::decode(response).await
    }

    async fn submit_order(&self, user: &SessionUser, order: NewOrder) -> Result<OrderView> {
        let request = self.client.post(self.url("/api/orders")).json(&order);
        Self::decode(Self::as_user(request, user).send().await?).await
    }

    async fn list_orders(&self, user: &SessionUser) -> Result<Vec<OrderView>> {
        let request = self.client.get(self.url("/api/orders"));
        Self::decode(Self::as_user(request, user).send().await?).await
    }

    async fn get_order(&self, user: &SessionUser, order_id: i64) -> Result<OrderView> {
        let request = self.client.get(self.url(&format!("/api/orders/{order_id}")));
        Self::decode(Self::as_user(request, user).send().await?).await
    }

    async fn update_status(
        &self,
        user: &SessionUser,
        order_id: i64,
        request: TransitionRequest,
    ) -> Result<TransitionOutcome> {
        let builder = self
            .client
            .patch(self.url(&format!("/api/orders/{order_id}")))
            .json(&request);
        Self::decode(Self::as_user(builder, user).send().await?).await
    }

    async fn verify_otp(&self, user: &SessionUser, code: &str) -> Result<OtpVerification> {
        let request = self
            .client
            .post(self.url("/api/orders/verify"))
            .json(&json!({ "otp": code }));
        Self::decode(Self::as_user(request, user).send().await?).await
    }
}
