use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Customer basket. Line items are embedded as JSON, priced per city by an
/// upstream catalog service before they reach this service.
///
/// A basket with `completed = true` is finalized: nothing may mutate it
/// except the settlement reconciler's guarded flip (which is what set it).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "baskets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Client-generated opaque identifier, unique and immutable.
    #[sea_orm(unique)]
    pub uuid_id: String,

    /// Owner, when the basket was assembled by an authenticated user.
    #[sea_orm(nullable)]
    pub user_id: Option<Uuid>,

    /// Flips to true exactly once, on confirmed settlement.
    pub completed: bool,

    pub checkout_stage: CheckoutStage,

    /// Embedded line items: product reference, quantity, city-keyed prices.
    #[sea_orm(column_type = "Json")]
    pub basket_items: Json,

    #[sea_orm(column_type = "Json", nullable)]
    pub gift_items: Option<Json>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Checkout stage: distinguishes "not yet ordered" from "an order is in
/// flight against this basket".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckoutStage {
    #[sea_orm(string_value = "CREATED")]
    Created,
    #[sea_orm(string_value = "IN_PROGRESS")]
    InProgress,
}
