use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One row per provider settlement callback. Insert-only: reconciliation
/// either accepts or rejects a callback, it never mutates a stored record.
///
/// The unique `provider_reference` is the duplicate-delivery guard for the
/// provider's at-least-once webhook redelivery.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transaction_payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Provider-issued transaction reference.
    #[sea_orm(unique)]
    pub provider_reference: String,

    /// Order `account_number` the settlement claims to pay. A logical
    /// reference resolved at reconciliation time, not a foreign key.
    pub invoice_id: String,

    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub amount: Decimal,

    /// Opaque diagnostic payload: card mask, issuer country, IP geolocation,
    /// provider result code. Stored as received, never interpreted.
    #[sea_orm(column_type = "Json", nullable)]
    pub details: Option<Json>,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
