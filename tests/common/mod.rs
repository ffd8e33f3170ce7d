#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use checkout_api::config::AppConfig;
use checkout_api::entities::{basket, order, settlement};
use checkout_api::events::EventSender;
use checkout_api::gateway::{PaymentLinkRequest, PaymentProvider, ProviderError};
use checkout_api::services::checkout::CheckoutService;
use checkout_api::services::settlement::SettlementService;
use checkout_api::{api, db, AppServices, AppState};

/// In-process payment provider stub: counts calls and either issues a
/// deterministic link or fails like an unreachable provider.
pub struct StubProvider {
    calls: AtomicUsize,
    fail: bool,
}

impl StubProvider {
    pub fn ok() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentProvider for StubProvider {
    async fn create_payment_link(
        &self,
        request: &PaymentLinkRequest,
    ) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProviderError::Unavailable(
                "connection refused".to_string(),
            ));
        }
        Ok(format!("https://pay.example.com/i/{}", request.invoice_id))
    }
}

/// Application harness backed by a throwaway SQLite database.
pub struct TestApp {
    pub state: AppState,
    pub provider: Arc<StubProvider>,
    router: Router,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::build(StubProvider::ok(), |_| {}).await
    }

    pub async fn with_failing_provider() -> Self {
        Self::build(StubProvider::failing(), |_| {}).await
    }

    pub async fn build(provider: StubProvider, tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let db_path = std::env::temp_dir().join(format!("checkout_api_test_{}.db", Uuid::new_v4()));
        let mut cfg = AppConfig::new(format!("sqlite://{}?mode=rwc", db_path.display()));
        tweak(&mut cfg);

        let pool = db::establish_connection(&cfg)
            .await
            .expect("failed to create test database");
        db::ensure_schema(&pool).await.expect("failed to create schema");
        let pool = Arc::new(pool);

        let (event_tx, event_rx) = tokio::sync::mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(checkout_api::events::process_events(event_rx));

        let provider = Arc::new(provider);
        let services = AppServices {
            checkout: Arc::new(CheckoutService::new(
                pool.clone(),
                provider.clone(),
                cfg.checkout.clone(),
                event_sender.clone(),
            )),
            settlement: Arc::new(SettlementService::new(pool.clone(), event_sender.clone())),
        };

        let state = AppState {
            db: pool,
            config: cfg,
            event_sender,
            services,
        };

        Self {
            router: api::create_router(state.clone()),
            state,
            provider,
            _event_task: event_task,
        }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                builder.body(Body::from(json.to_string())).unwrap()
            }
            None => builder.body(Body::empty()).unwrap(),
        };
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn checkout(&self, payload: Value) -> Response {
        self.request(Method::POST, "/api/v1/checkout", Some(payload))
            .await
    }

    pub async fn webhook(&self, payload: Value) -> Response {
        self.request(Method::POST, "/api/v1/payments/webhook", Some(payload))
            .await
    }

    /// Insert a basket with a single line item priced for one city.
    pub async fn seed_basket(
        &self,
        uuid_id: &str,
        city: &str,
        price: Decimal,
        quantity: u32,
    ) -> basket::Model {
        let items = json!([{
            "prod_id": 1,
            "count": quantity,
            "prod": { "name": "Widget", "price": { city: price.to_string() } }
        }]);
        self.seed_basket_raw(uuid_id, items).await
    }

    pub async fn seed_basket_raw(&self, uuid_id: &str, items: Value) -> basket::Model {
        let now = Utc::now();
        basket::ActiveModel {
            id: Set(Uuid::new_v4()),
            uuid_id: Set(uuid_id.to_string()),
            user_id: Set(None),
            completed: Set(false),
            checkout_stage: Set(basket::CheckoutStage::Created),
            basket_items: Set(items),
            gift_items: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed basket")
    }

    pub async fn find_basket(&self, uuid_id: &str) -> basket::Model {
        basket::Entity::find()
            .filter(basket::Column::UuidId.eq(uuid_id))
            .one(&*self.state.db)
            .await
            .unwrap()
            .expect("basket not found")
    }

    pub async fn find_order(&self, account_number: &str) -> order::Model {
        order::Entity::find()
            .filter(order::Column::AccountNumber.eq(account_number))
            .one(&*self.state.db)
            .await
            .unwrap()
            .expect("order not found")
    }

    pub async fn order_count(&self) -> u64 {
        order::Entity::find().count(&*self.state.db).await.unwrap()
    }

    pub async fn settlement_count(&self) -> u64 {
        settlement::Entity::find()
            .count(&*self.state.db)
            .await
            .unwrap()
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

pub fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(
        response.status(),
        expected,
        "unexpected status for response"
    );
}

/// A well-formed ONLINE checkout payload against `basket_id`.
pub fn checkout_payload(basket_id: &str, city: &str) -> Value {
    json!({
        "basket_id": basket_id,
        "phone_number": "+77001234567",
        "email": "customer@example.com",
        "shipping_city": city,
        "delivery_address": "8/4 Dostyk street",
        "delivery_type": "DELIVERY",
        "payment_type": "ONLINE",
        "comment": "Call before delivery"
    })
}

/// A settlement webhook payload for `invoice_id` over `amount`.
pub fn webhook_payload(reference: &str, invoice_id: &str, amount: i64) -> Value {
    json!({
        "reference": reference,
        "invoiceId": invoice_id,
        "amount": amount,
        "currency": "KZT",
        "code": "ok",
        "cardMask": "440043...0128",
        "issuerBankCountry": "KAZ",
        "ip": "203.0.113.7",
        "ipCountry": "KAZ",
        "ipCity": "Astana"
    })
}
