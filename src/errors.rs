use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::gateway::ProviderError;

/// Standard error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Conflict")
    #[schema(example = "Not Found")]
    pub error: String,
    /// Human-readable error description
    #[schema(example = "Basket 'fcff9649' not found")]
    pub message: String,
    /// ISO 8601 timestamp when the error occurred
    #[schema(example = "2024-12-09T10:30:00.000Z")]
    pub timestamp: String,
}

/// Error taxonomy for the checkout and settlement services.
///
/// Every failure inside a checkout or reconciliation transaction rolls the
/// whole transaction back; only the HTTP layer translates these kinds into
/// response codes.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Basket items are structurally unusable for pricing (empty basket,
    /// missing quantity, no price for the destination city).
    #[error("Invalid basket structure: {0}")]
    InvalidBasketStructure(String),

    /// Provider callback payload is missing required fields.
    #[error("Malformed callback: {0}")]
    MalformedCallback(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Settled amount differs from the order total. Never auto-corrected;
    /// surfaced for manual reconciliation.
    #[error("Amount mismatch for invoice {invoice_id}: order total {expected}, settled {received}")]
    AmountMismatch {
        invoice_id: String,
        expected: Decimal,
        received: Decimal,
    },

    /// The provider could not produce a usable payment link; the checkout
    /// attempt is rolled back and the caller may retry.
    #[error("Payment link unavailable: {0}")]
    PaymentLinkUnavailable(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_)
            | Self::InvalidBasketStructure(_)
            | Self::MalformedCallback(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) | Self::AmountMismatch { .. } => StatusCode::CONFLICT,
            Self::PaymentLinkUnavailable(_) | Self::ExternalServiceError(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }

    /// Message suitable for HTTP responses. Internal errors return a generic
    /// message to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<ProviderError> for ServiceError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unavailable(msg) | ProviderError::Rejected(msg) => {
                ServiceError::PaymentLinkUnavailable(msg)
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn not_found_maps_to_404() {
        assert_eq!(
            ServiceError::NotFound("basket".into()).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn amount_mismatch_maps_to_conflict() {
        let err = ServiceError::AmountMismatch {
            invoice_id: "123456789".into(),
            expected: dec!(1000),
            received: dec!(900),
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(err.response_message().contains("123456789"));
    }

    #[test]
    fn database_error_message_is_generic() {
        let err = ServiceError::DatabaseError(sea_orm::DbErr::Custom("secret dsn".into()));
        assert_eq!(err.response_message(), "Database error");
    }

    #[test]
    fn provider_errors_become_retryable_payment_link_failures() {
        let err: ServiceError = ProviderError::Unavailable("timed out".into()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }
}
