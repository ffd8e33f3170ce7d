use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

/// Product data attached to a line item by the upstream catalog service.
/// Prices are city-scoped; the map key is the destination city name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub price: HashMap<String, Decimal>,
    #[serde(default)]
    pub name: Option<String>,
}

/// One position in a basket, as embedded in `baskets.basket_items`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(rename = "prod_id")]
    pub product_id: i64,
    #[serde(rename = "count")]
    pub quantity: u32,
    #[serde(rename = "prod")]
    pub product: ProductSnapshot,
    #[serde(default, rename = "gift_id")]
    pub gift_id: Option<i64>,
}

/// Parse the embedded basket items JSON into typed line items.
pub fn parse_line_items(items: &serde_json::Value) -> Result<Vec<LineItem>, ServiceError> {
    serde_json::from_value(items.clone())
        .map_err(|e| ServiceError::InvalidBasketStructure(format!("unreadable basket items: {e}")))
}

/// Compute the total amount of a basket for a destination city.
///
/// Pure function over the price data already attached to the line items:
/// unit price for the city times quantity, summed in fixed-point decimal
/// arithmetic and rounded to 2 decimal places. Fails if the basket is empty,
/// a position has no quantity, or a position has no price for the city.
pub fn compute_total(destination_city: &str, items: &[LineItem]) -> Result<Decimal, ServiceError> {
    if items.is_empty() {
        return Err(ServiceError::InvalidBasketStructure(
            "basket has no line items".to_string(),
        ));
    }

    let mut total = Decimal::ZERO;
    for item in items {
        if item.quantity == 0 {
            return Err(ServiceError::InvalidBasketStructure(format!(
                "line item {} has no quantity",
                item.product_id
            )));
        }
        let unit_price = item.product.price.get(destination_city).ok_or_else(|| {
            ServiceError::InvalidBasketStructure(format!(
                "line item {} has no price for city {destination_city:?}",
                item.product_id
            ))
        })?;
        total += *unit_price * Decimal::from(item.quantity);
    }

    Ok(total.round_dp(2))
}
