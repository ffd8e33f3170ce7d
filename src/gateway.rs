use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::ProviderConfig;

/// Payment provider failures, kept separate from the service taxonomy so
/// callers can tell transport trouble from a provider that answered but
/// returned nothing usable. The gateway never retries; retry policy belongs
/// to the caller.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Transport-level failure: unreachable endpoint, timeout, broken
    /// connection. Retryable.
    #[error("payment provider unavailable: {0}")]
    Unavailable(String),

    /// The provider responded, possibly with a 2xx status, but the payload
    /// carried no usable token or payment URL.
    #[error("payment provider rejected request: {0}")]
    Rejected(String),
}

/// Dynamic fields of one invoice request.
#[derive(Debug, Clone)]
pub struct PaymentLinkRequest {
    pub invoice_id: String,
    pub amount: Decimal,
    pub description: String,
    pub contact_email: String,
    pub contact_phone: String,
}

/// Contract with the payment provider: exchange an invoice description for a
/// hosted payment-link URL.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_payment_link(
        &self,
        request: &PaymentLinkRequest,
    ) -> Result<String, ProviderError>;
}

/// Form-encoded body of the credential exchange.
#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    scope: &'a str,
    username: &'a str,
    password: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
}

/// JSON invoice payload: static merchant configuration merged with the
/// dynamic fields of one checkout attempt.
#[derive(Serialize)]
struct InvoicePayload<'a> {
    invoice_id: &'a str,
    amount: Decimal,
    description: &'a str,
    recipient_contact: &'a str,
    recipient_contact_sms: &'a str,
    notifier_contact_sms: &'a str,
    shop_id: &'a str,
    account_id: &'a str,
    language: &'a str,
    expire_period: &'a str,
    currency: &'a str,
    post_link: &'a str,
    failure_post_link: &'a str,
    back_link: &'a str,
    failure_back_link: &'a str,
}

/// HTTP gateway to the bank's hosted payment-link API.
pub struct EpayGateway {
    client: Client,
    config: ProviderConfig,
}

impl EpayGateway {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("failed to build client: {e}")))?;
        Ok(Self::with_client(config, client))
    }

    /// Build a gateway from an existing client (useful for testing).
    pub fn with_client(config: ProviderConfig, client: Client) -> Self {
        Self { client, config }
    }

    /// Obtain a short-lived bearer credential via a form-encoded exchange
    /// against the provider's token endpoint.
    #[instrument(skip(self))]
    async fn acquire_credential(&self) -> Result<String, ProviderError> {
        let body = TokenRequest {
            grant_type: &self.config.grant_type,
            scope: &self.config.scope,
            username: &self.config.username,
            password: &self.config.password,
            client_id: &self.config.client_id,
            client_secret: &self.config.client_secret,
        };

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        let payload: Value = response.json().await.map_err(|e| {
            ProviderError::Rejected(format!("token endpoint returned non-JSON body: {e}"))
        })?;

        // A 2xx does not imply a usable credential; inspect the payload.
        match payload.get("access_token").and_then(Value::as_str) {
            Some(token) if !token.is_empty() => {
                debug!("acquired provider credential");
                Ok(token.to_string())
            }
            _ => {
                warn!(%status, "token endpoint response carried no access token");
                Err(ProviderError::Rejected(
                    "no access token in provider response".to_string(),
                ))
            }
        }
    }
}

#[async_trait]
impl PaymentProvider for EpayGateway {
    #[instrument(skip(self, request), fields(invoice_id = %request.invoice_id))]
    async fn create_payment_link(
        &self,
        request: &PaymentLinkRequest,
    ) -> Result<String, ProviderError> {
        let token = self.acquire_credential().await?;

        let payload = InvoicePayload {
            invoice_id: &request.invoice_id,
            amount: request.amount,
            description: &request.description,
            recipient_contact: &request.contact_email,
            recipient_contact_sms: &request.contact_phone,
            notifier_contact_sms: &request.contact_phone,
            shop_id: &self.config.shop_id,
            account_id: &self.config.account_id,
            language: &self.config.language,
            expire_period: &self.config.expire_period,
            currency: &self.config.currency,
            post_link: &self.config.post_link,
            failure_post_link: &self.config.failure_post_link,
            back_link: &self.config.back_link,
            failure_back_link: &self.config.failure_back_link,
        };

        let response = self
            .client
            .post(&self.config.payment_url)
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        let payload: Value = response.json().await.map_err(|e| {
            ProviderError::Rejected(format!("invoice endpoint returned non-JSON body: {e}"))
        })?;

        match payload.get("invoice_url").and_then(Value::as_str) {
            Some(url) if !url.is_empty() => Ok(url.to_string()),
            _ => {
                warn!(%status, invoice_id = %request.invoice_id, "invoice endpoint response carried no payment URL");
                Err(ProviderError::Rejected(
                    "no payment URL in provider response".to_string(),
                ))
            }
        }
    }
}

fn classify_transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        ProviderError::Unavailable(err.to_string())
    } else {
        ProviderError::Rejected(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base: &str) -> ProviderConfig {
        ProviderConfig {
            token_url: format!("{base}/oauth2/token"),
            payment_url: format!("{base}/invoice"),
            shop_id: "shop-1".to_string(),
            account_id: "acct-1".to_string(),
            timeout_secs: 5,
            ..ProviderConfig::default()
        }
    }

    fn link_request() -> PaymentLinkRequest {
        PaymentLinkRequest {
            invoice_id: "809123456".to_string(),
            amount: dec!(1500),
            description: "Order payment".to_string(),
            contact_email: "customer@example.com".to_string(),
            contact_phone: "+77001234567".to_string(),
        }
    }

    #[tokio::test]
    async fn creates_payment_link_with_bearer_credential() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("grant_type=password"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "access_token": "tok-123",
                    "expires_in": 1200
                })),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/invoice"))
            .and(header("authorization", "Bearer tok-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "invoice_url": "https://pay.example.com/i/809123456"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = EpayGateway::new(test_config(&server.uri())).unwrap();
        let url = gateway.create_payment_link(&link_request()).await.unwrap();
        assert_eq!(url, "https://pay.example.com/i/809123456");
    }

    #[tokio::test]
    async fn rejects_token_response_without_access_token() {
        let server = MockServer::start().await;

        // HTTP 200 with an unusable payload must still be a rejection.
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"error": "invalid_client"})),
            )
            .mount(&server)
            .await;

        let gateway = EpayGateway::new(test_config(&server.uri())).unwrap();
        let err = gateway.create_payment_link(&link_request()).await.unwrap_err();
        assert_matches!(err, ProviderError::Rejected(_));
    }

    #[tokio::test]
    async fn rejects_invoice_response_without_payment_url() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "t"})),
            )
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/invoice"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "queued"})),
            )
            .mount(&server)
            .await;

        let gateway = EpayGateway::new(test_config(&server.uri())).unwrap();
        let err = gateway.create_payment_link(&link_request()).await.unwrap_err();
        assert_matches!(err, ProviderError::Rejected(_));
    }

    #[tokio::test]
    async fn unreachable_provider_is_unavailable() {
        // Port 1 is never listening.
        let gateway = EpayGateway::new(test_config("http://127.0.0.1:1")).unwrap();
        let err = gateway.create_payment_link(&link_request()).await.unwrap_err();
        assert_matches!(err, ProviderError::Unavailable(_));
    }
}
