use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::auth::VerifiedSubject;
use crate::errors::ServiceError;
use crate::services::checkout::CheckoutRequest;
use crate::{ApiResponse, AppState};

/// POST /api/v1/checkout
///
/// Opens an order against a basket and returns the payment link. A repeat
/// of the same intent within the idempotency window returns the original
/// link without creating a second order.
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Order opened, payment link returned", body = crate::services::checkout::CheckoutConfirmation),
        (status = 400, description = "Invalid request or malformed basket", body = crate::errors::ErrorResponse),
        (status = 404, description = "Basket not found or already finalized", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment provider unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn create_checkout(
    State(state): State<AppState>,
    subject: VerifiedSubject,
    Json(request): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let confirmation = state.services.checkout.checkout(subject.0, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(confirmation))))
}
