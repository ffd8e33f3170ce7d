//! Basket checkout and payment settlement service.
//!
//! Turns a customer's basket into a provider-invoiced order and reconciles
//! the provider's asynchronous settlement webhook against that order
//! exactly once, under retries, duplicate deliveries and out-of-order
//! arrival.

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use serde::Serialize;
use utoipa::ToSchema;

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod handlers;
pub mod openapi;
pub mod services;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: AppServices,
}

/// Service singletons built once at startup.
#[derive(Clone)]
pub struct AppServices {
    pub checkout: Arc<services::checkout::CheckoutService>,
    pub settlement: Arc<services::settlement::SettlementService>,
}

/// Common success envelope.
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
        }
    }
}
