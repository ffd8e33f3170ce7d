use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Checkout API",
        description = "Basket checkout and payment settlement service"
    ),
    paths(
        crate::handlers::checkout::create_checkout,
        crate::handlers::webhooks::payment_webhook,
        crate::handlers::health::health,
        crate::handlers::health::readiness,
    ),
    components(schemas(
        crate::services::checkout::CheckoutRequest,
        crate::services::checkout::CheckoutConfirmation,
        crate::services::settlement::ProviderCallback,
        crate::errors::ErrorResponse,
    )),
    tags(
        (name = "Checkout", description = "Turn a basket into a payable order"),
        (name = "Payments", description = "Provider settlement callbacks"),
        (name = "Health", description = "Probes")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_builds() {
        let doc = ApiDoc::openapi();
        let json = doc.to_json().expect("serializable document");
        assert!(json.contains("/api/v1/checkout"));
        assert!(json.contains("/api/v1/payments/webhook"));
    }
}
