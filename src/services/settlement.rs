use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, SqlErr,
    TransactionTrait,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::{basket, order, settlement};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Raw webhook payload as the provider sends it. Everything is optional at
/// the wire level; required fields are enforced when converting to a
/// [`SettlementNotice`].
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCallback {
    /// Provider-issued transaction reference.
    pub reference: Option<String>,
    /// Order account number this settlement pays.
    pub invoice_id: Option<String>,
    #[schema(value_type = Option<String>, example = "1000")]
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub code: Option<String>,
    pub card_mask: Option<String>,
    pub issuer_bank_country: Option<String>,
    pub ip: Option<String>,
    pub ip_country: Option<String>,
    pub ip_city: Option<String>,
}

/// A validated settlement callback.
#[derive(Debug, Clone)]
pub struct SettlementNotice {
    pub reference: String,
    pub invoice_id: String,
    pub amount: Decimal,
    /// Diagnostic fields carried through as opaque payload.
    pub details: serde_json::Value,
}

impl TryFrom<ProviderCallback> for SettlementNotice {
    type Error = ServiceError;

    fn try_from(cb: ProviderCallback) -> Result<Self, Self::Error> {
        let reference = cb
            .reference
            .filter(|r| !r.is_empty())
            .ok_or_else(|| ServiceError::MalformedCallback("missing reference".to_string()))?;
        let invoice_id = cb
            .invoice_id
            .filter(|i| !i.is_empty())
            .ok_or_else(|| ServiceError::MalformedCallback("missing invoiceId".to_string()))?;
        let amount = cb
            .amount
            .ok_or_else(|| ServiceError::MalformedCallback("missing amount".to_string()))?;

        let details = json!({
            "currency": cb.currency,
            "code": cb.code,
            "cardMask": cb.card_mask,
            "issuerBankCountry": cb.issuer_bank_country,
            "ip": cb.ip,
            "ipCountry": cb.ip_country,
            "ipCity": cb.ip_city,
        });

        Ok(Self {
            reference,
            invoice_id,
            amount,
            details,
        })
    }
}

/// Result of one reconciliation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// Settlement recorded, order marked paid, basket finalized.
    Applied { order_id: Uuid },
    /// This provider reference was already reconciled; redelivery is a
    /// success with no further effect.
    AlreadyProcessed,
}

/// Consumes provider settlement webhooks and advances order and basket
/// state exactly once per provider reference.
pub struct SettlementService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl SettlementService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Reconcile one settlement callback against its order.
    ///
    /// Safe under at-least-once delivery: the settlement insert, the order
    /// payment flip and the basket completion flip commit as one atomic
    /// unit, and every write is guarded so only the first delivery applies.
    #[instrument(skip(self, notice), fields(reference = %notice.reference, invoice_id = %notice.invoice_id))]
    pub async fn reconcile(
        &self,
        notice: SettlementNotice,
    ) -> Result<SettlementOutcome, ServiceError> {
        let txn = self.db.begin().await?;

        // Duplicate-delivery fast path.
        let already = settlement::Entity::find()
            .filter(settlement::Column::ProviderReference.eq(&notice.reference))
            .one(&txn)
            .await?;
        if already.is_some() {
            info!("settlement reference already recorded; treating redelivery as success");
            return Ok(SettlementOutcome::AlreadyProcessed);
        }

        let insert = settlement::ActiveModel {
            id: Set(Uuid::new_v4()),
            provider_reference: Set(notice.reference.clone()),
            invoice_id: Set(notice.invoice_id.clone()),
            amount: Set(notice.amount),
            details: Set(Some(notice.details.clone())),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await;

        // Two deliveries racing past the fast path land here; the unique
        // constraint decides, and the loser is a duplicate, not a failure.
        if let Err(e) = insert {
            return match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    info!("settlement reference inserted concurrently; treating as duplicate");
                    Ok(SettlementOutcome::AlreadyProcessed)
                }
                _ => Err(e.into()),
            };
        }

        let order_model = match order::Entity::find()
            .filter(order::Column::AccountNumber.eq(&notice.invoice_id))
            .one(&txn)
            .await?
        {
            Some(m) => m,
            None => {
                // Money moved with no matching order. Reject so the provider
                // redelivers once the order commit lands, or a human looks.
                warn!("settlement references unknown invoice");
                return Err(ServiceError::NotFound(format!(
                    "Order with account number {:?} not found",
                    notice.invoice_id
                )));
            }
        };

        // Exact fixed-point equality, no tolerance.
        if order_model.total_amount != notice.amount {
            self.event_sender
                .send(Event::SettlementRejected {
                    provider_reference: notice.reference.clone(),
                    reason: format!(
                        "amount mismatch: order total {}, settled {}",
                        order_model.total_amount, notice.amount
                    ),
                })
                .await;
            return Err(ServiceError::AmountMismatch {
                invoice_id: notice.invoice_id,
                expected: order_model.total_amount,
                received: notice.amount,
            });
        }

        // Guarded flip: only an UNPAID order can become PAID, exactly once.
        let order_flip = order::Entity::update_many()
            .col_expr(
                order::Column::PaymentStatus,
                Expr::value(order::PaymentStatus::Paid),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(order_model.id))
            .filter(order::Column::PaymentStatus.eq(order::PaymentStatus::Unpaid))
            .exec(&txn)
            .await?;
        if order_flip.rows_affected == 0 {
            self.event_sender
                .send(Event::SettlementRejected {
                    provider_reference: notice.reference.clone(),
                    reason: format!("order {} is already paid", order_model.account_number),
                })
                .await;
            return Err(ServiceError::Conflict(format!(
                "Order {} is already paid",
                order_model.account_number
            )));
        }

        // Conditional basket flip: succeeds only while the basket is still
        // unfinalized and mid-checkout, so two settlements racing on orders
        // tied to one basket cannot both win.
        let basket_flip = basket::Entity::update_many()
            .col_expr(basket::Column::Completed, Expr::value(true))
            .col_expr(basket::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(basket::Column::UuidId.eq(&order_model.basket_id))
            .filter(basket::Column::Completed.eq(false))
            .filter(basket::Column::CheckoutStage.eq(basket::CheckoutStage::InProgress))
            .exec(&txn)
            .await?;
        if basket_flip.rows_affected == 0 {
            self.event_sender
                .send(Event::SettlementRejected {
                    provider_reference: notice.reference.clone(),
                    reason: format!(
                        "basket {} was already finalized by another settlement",
                        order_model.basket_id
                    ),
                })
                .await;
            return Err(ServiceError::Conflict(format!(
                "Basket {} was already finalized",
                order_model.basket_id
            )));
        }

        txn.commit().await?;

        info!(order_id = %order_model.id, "settlement applied; order paid");

        self.event_sender
            .send(Event::OrderPaid {
                order_id: order_model.id,
                basket_id: order_model.basket_id.clone(),
            })
            .await;

        Ok(SettlementOutcome::Applied {
            order_id: order_model.id,
        })
    }
}
