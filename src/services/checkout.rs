use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::config::CheckoutConfig;
use crate::entities::{basket, order};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::gateway::{PaymentLinkRequest, PaymentProvider};
use crate::services::pricing;

/// One checkout intent: basket reference, contact fields, delivery and
/// payment selection.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CheckoutRequest {
    /// Client-generated basket identifier.
    #[validate(length(min = 1, message = "Basket identifier is required"))]
    pub basket_id: String,

    #[validate(length(min = 5, message = "Phone number is required"))]
    pub phone_number: String,

    #[validate(email(message = "A valid email is required"))]
    pub email: String,

    #[validate(length(min = 1, message = "Shipping city is required"))]
    pub shipping_city: String,

    pub delivery_address: Option<String>,

    #[schema(value_type = String, example = "DELIVERY")]
    pub delivery_type: order::DeliveryType,

    #[schema(value_type = String, example = "ONLINE")]
    pub payment_type: order::PaymentType,

    pub comment: Option<String>,
}

/// Result of a checkout attempt: the order and the link the customer pays
/// on. An idempotent retry returns the original order's values.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutConfirmation {
    pub order_id: Uuid,
    pub account_number: String,
    pub total_amount: Decimal,
    pub payment_link: String,
}

/// State machine that turns a basket into a payable order.
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    provider: Arc<dyn PaymentProvider>,
    config: CheckoutConfig,
    event_sender: EventSender,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        provider: Arc<dyn PaymentProvider>,
        config: CheckoutConfig,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            provider,
            config,
            event_sender,
        }
    }

    /// Run one checkout attempt.
    ///
    /// The basket lookup, idempotency check, order creation and basket-stage
    /// flip share one transaction; it commits only after a usable payment
    /// link exists, so a provider failure leaves no order behind.
    #[instrument(skip(self, request), fields(basket_id = %request.basket_id))]
    pub async fn checkout(
        &self,
        subject: Option<Uuid>,
        request: CheckoutRequest,
    ) -> Result<CheckoutConfirmation, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let txn = self.db.begin().await?;

        // A completed basket is indistinguishable from an absent one here:
        // both must never take another order.
        let basket_model = basket::Entity::find()
            .filter(basket::Column::UuidId.eq(&request.basket_id))
            .filter(basket::Column::Completed.eq(false))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Basket {:?} not found", request.basket_id))
            })?;

        let items = pricing::parse_line_items(&basket_model.basket_items)?;
        let total = pricing::compute_total(&request.shipping_city, &items)?;

        // Idempotency: a repeat of the same intent within the recency window
        // answers with the prior link instead of opening a second invoice.
        if let Some(existing) = self.find_recent_duplicate(&txn, subject, total, &request).await? {
            if let Some(link) = existing.payment_link.clone() {
                info!(
                    order_id = %existing.id,
                    account_number = %existing.account_number,
                    "repeat checkout intent within window; returning existing payment link"
                );
                txn.commit().await?;
                return Ok(CheckoutConfirmation {
                    order_id: existing.id,
                    account_number: existing.account_number,
                    total_amount: existing.total_amount,
                    payment_link: link,
                });
            }
        }

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let account_number = generate_account_number();

        let order_model = order::ActiveModel {
            id: Set(order_id),
            basket_id: Set(basket_model.uuid_id.clone()),
            user_id: Set(subject),
            account_number: Set(account_number.clone()),
            total_amount: Set(total),
            order_status: Set(order::OrderStatus::New),
            payment_status: Set(order::PaymentStatus::Unpaid),
            payment_type: Set(request.payment_type),
            payment_link: Set(None),
            phone_number: Set(request.phone_number.clone()),
            email: Set(request.email.clone()),
            shipping_city: Set(request.shipping_city.clone()),
            delivery_address: Set(request.delivery_address.clone()),
            delivery_type: Set(request.delivery_type),
            comment: Set(request.comment.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut basket_update: basket::ActiveModel = basket_model.into();
        basket_update.checkout_stage = Set(basket::CheckoutStage::InProgress);
        basket_update.updated_at = Set(now);
        basket_update.update(&txn).await?;

        let payment_link = match request.payment_type {
            order::PaymentType::Online => {
                let link_request = PaymentLinkRequest {
                    invoice_id: account_number.clone(),
                    amount: total,
                    description: self.config.invoice_description.clone(),
                    contact_email: request.email.clone(),
                    contact_phone: request.phone_number.clone(),
                };
                match self.provider.create_payment_link(&link_request).await {
                    Ok(url) => url,
                    Err(e) => {
                        warn!(
                            error = %e,
                            account_number = %account_number,
                            "provider call failed; rolling back checkout attempt"
                        );
                        txn.rollback().await.ok();
                        return Err(e.into());
                    }
                }
            }
            order::PaymentType::Offline => self.config.offline_payment_link.clone(),
        };

        let mut order_update: order::ActiveModel = order_model.into();
        order_update.payment_link = Set(Some(payment_link.clone()));
        order_update.updated_at = Set(Utc::now());
        let order_model = order_update.update(&txn).await?;

        txn.commit().await?;

        info!(
            order_id = %order_model.id,
            account_number = %order_model.account_number,
            total = %order_model.total_amount,
            "order created"
        );

        self.event_sender
            .send(Event::OrderCreated {
                order_id: order_model.id,
                account_number: order_model.account_number.clone(),
            })
            .await;

        Ok(CheckoutConfirmation {
            order_id: order_model.id,
            account_number: order_model.account_number,
            total_amount: order_model.total_amount,
            payment_link,
        })
    }

    /// Look for an order matching this intent (owner, total, phone, email)
    /// created inside the idempotency window.
    async fn find_recent_duplicate(
        &self,
        txn: &sea_orm::DatabaseTransaction,
        subject: Option<Uuid>,
        total: Decimal,
        request: &CheckoutRequest,
    ) -> Result<Option<order::Model>, ServiceError> {
        let cutoff = Utc::now() - Duration::seconds(self.config.idempotency_window_secs as i64);

        let query = order::Entity::find()
            .filter(order::Column::TotalAmount.eq(total))
            .filter(order::Column::PhoneNumber.eq(&request.phone_number))
            .filter(order::Column::Email.eq(&request.email))
            .filter(order::Column::CreatedAt.gte(cutoff));

        // `eq(NULL)` never matches; anonymous intents need an explicit null
        // filter to dedupe against other anonymous attempts.
        let query = match subject {
            Some(user_id) => query.filter(order::Column::UserId.eq(user_id)),
            None => query.filter(order::Column::UserId.is_null()),
        };

        let existing = query
            .order_by_desc(order::Column::CreatedAt)
            .one(txn)
            .await?;

        Ok(existing)
    }
}

/// Random 9-digit invoice number; uniqueness is enforced by the database
/// constraint on `orders.account_number`.
fn generate_account_number() -> String {
    rand::thread_rng()
        .gen_range(100_000_000u64..=999_999_999)
        .to_string()
}
