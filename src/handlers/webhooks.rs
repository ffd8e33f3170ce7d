use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use crate::errors::ServiceError;
use crate::services::settlement::{ProviderCallback, SettlementNotice};
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// POST /api/v1/payments/webhook
///
/// Settlement callback from the payment provider. Idempotent: redelivery of
/// an already-reconciled reference answers 204 again with no further effect.
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body = ProviderCallback,
    responses(
        (status = 204, description = "Settlement applied or already processed"),
        (status = 400, description = "Malformed callback payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Invalid webhook signature", body = crate::errors::ErrorResponse),
        (status = 404, description = "No order matches the invoice", body = crate::errors::ErrorResponse),
        (status = 409, description = "Amount mismatch or settlement race; manual review", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ServiceError> {
    if let Some(secret) = &state.config.webhook.secret {
        if !verify_signature(&headers, &body, secret, state.config.webhook.tolerance_secs) {
            warn!("webhook signature verification failed");
            return Err(ServiceError::Unauthorized(
                "invalid webhook signature".to_string(),
            ));
        }
    }

    let callback: ProviderCallback = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::MalformedCallback(format!("invalid JSON: {e}")))?;
    let notice = SettlementNotice::try_from(callback)?;

    state.services.settlement.reconcile(notice).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// HMAC-SHA256 over `"{timestamp}.{body}"`, hex-encoded, carried in the
/// `x-timestamp` / `x-signature` headers.
fn verify_signature(headers: &HeaderMap, payload: &[u8], secret: &str, tolerance_secs: u64) -> bool {
    let (Some(ts), Some(sig)) = (headers.get("x-timestamp"), headers.get("x-signature")) else {
        return false;
    };
    let (Ok(ts), Ok(sig)) = (ts.to_str(), sig.to_str()) else {
        return false;
    };

    if let Ok(ts_i) = ts.parse::<i64>() {
        let now = chrono::Utc::now().timestamp();
        if (now - ts_i).unsigned_abs() > tolerance_secs {
            return false;
        }
    } else {
        return false;
    }

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(ts.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    constant_time_eq(&expected, sig)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn sign(secret: &str, ts: i64, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{ts}.").as_bytes());
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    fn headers_for(ts: i64, sig: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-timestamp", HeaderValue::from_str(&ts.to_string()).unwrap());
        headers.insert("x-signature", HeaderValue::from_str(sig).unwrap());
        headers
    }

    #[test]
    fn accepts_fresh_valid_signature() {
        let body = br#"{"reference":"r-1"}"#;
        let ts = chrono::Utc::now().timestamp();
        let sig = sign("topsecret", ts, body);
        assert!(verify_signature(&headers_for(ts, &sig), body, "topsecret", 300));
    }

    #[test]
    fn rejects_wrong_secret() {
        let body = br#"{}"#;
        let ts = chrono::Utc::now().timestamp();
        let sig = sign("other", ts, body);
        assert!(!verify_signature(&headers_for(ts, &sig), body, "topsecret", 300));
    }

    #[test]
    fn rejects_stale_timestamp() {
        let body = br#"{}"#;
        let ts = chrono::Utc::now().timestamp() - 10_000;
        let sig = sign("topsecret", ts, body);
        assert!(!verify_signature(&headers_for(ts, &sig), body, "topsecret", 300));
    }

    #[test]
    fn rejects_missing_headers() {
        assert!(!verify_signature(&HeaderMap::new(), b"{}", "topsecret", 300));
    }

    #[test]
    fn constant_time_eq_basics() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "ab"));
    }
}
