use std::time::Duration;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Schema};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::entities::{basket, order, settlement};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Establishes a connection pool to the database.
pub async fn establish_connection(config: &AppConfig) -> Result<DbPool, DbErr> {
    debug!(url = %config.database_url, "configuring database connection");

    let mut opt = ConnectOptions::new(config.database_url.clone());
    opt.max_connections(config.db_max_connections)
        .min_connections(config.db_min_connections)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(600))
        .sqlx_logging(false);

    let pool = Database::connect(opt).await?;

    info!(
        max_connections = config.db_max_connections,
        "database connection established"
    );

    Ok(pool)
}

/// Creates missing tables (with their unique constraints) from the entity
/// definitions. Used for development and test bootstrap; production schemas
/// are managed externally.
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut stmt = schema.create_table_from_entity(basket::Entity);
    stmt.if_not_exists();
    db.execute(backend.build(&stmt)).await?;

    let mut stmt = schema.create_table_from_entity(order::Entity);
    stmt.if_not_exists();
    db.execute(backend.build(&stmt)).await?;

    let mut stmt = schema.create_table_from_entity(settlement::Entity);
    stmt.if_not_exists();
    db.execute(backend.build(&stmt)).await?;

    info!("database schema ensured");
    Ok(())
}
