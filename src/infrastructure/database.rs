use crate::entities::{media_conversions, media_items, media_usages};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, Schema,
    Statement,
};
use std::env;
use std::time::Duration;
use tracing::{info, warn};

/// Secondary indexes for backends migrated from the entities. The Postgres
/// migrations under `migrations/` create the same set.
const INDEXES: &[&str] = &[
    "CREATE UNIQUE INDEX IF NOT EXISTS media_usage_unique ON media_usages(model_type, model_id, field_key, COALESCE(group_name, ''), position)",
    "CREATE INDEX IF NOT EXISTS idx_media_usages_owner ON media_usages(model_type, model_id)",
    "CREATE INDEX IF NOT EXISTS idx_media_usages_field_key ON media_usages(field_key)",
    "CREATE INDEX IF NOT EXISTS idx_media_usages_media_item ON media_usages(media_item_id)",
    "CREATE UNIQUE INDEX IF NOT EXISTS media_conversions_unique ON media_conversions(media_item_id, name)",
    "CREATE UNIQUE INDEX IF NOT EXISTS media_items_disk_path_unique ON media_items(disk, path)",
    "CREATE INDEX IF NOT EXISTS idx_media_items_mime_type ON media_items(mime_type)",
    "CREATE INDEX IF NOT EXISTS idx_media_items_created_by ON media_items(created_by)",
];

pub async fn setup_database() -> anyhow::Result<DatabaseConnection> {
    let db_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    info!("📂 Database: {}", db_url);

    let mut opt = ConnectOptions::new(&db_url);
    opt.max_connections(20)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(opt).await?;

    info!("✅ Database connected successfully");

    run_migrations(&db).await?;

    Ok(db)
}

/// Single-connection in-memory SQLite database, migrated and ready to use
pub async fn connect_in_memory() -> anyhow::Result<DatabaseConnection> {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1).sqlx_logging(false);

    let db = Database::connect(opt).await?;
    run_migrations(&db).await?;
    Ok(db)
}

pub async fn run_migrations(db: &DatabaseConnection) -> anyhow::Result<()> {
    let backend = db.get_database_backend();

    if backend == DatabaseBackend::Postgres {
        info!("🔄 Running SQLx migrations for PostgreSQL...");
        sqlx::migrate!("./migrations")
            .run(db.get_postgres_connection_pool())
            .await?;
        return Ok(());
    }

    info!("🔄 Running SeaORM auto-migrations for SQLite/Other...");
    let schema = Schema::new(backend);

    let stmts = vec![
        schema
            .create_table_from_entity(media_items::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(media_usages::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(media_conversions::Entity)
            .if_not_exists()
            .to_owned(),
    ];

    for stmt in stmts {
        db.execute(backend.build(&stmt)).await?;
    }

    for sql in INDEXES {
        if let Err(e) = db
            .execute(Statement::from_string(backend, sql.to_string()))
            .await
        {
            warn!("⚠️ Index creation failed ({}): {}", sql, e);
            return Err(e.into());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{EntityTrait, PaginatorTrait};

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = connect_in_memory().await.unwrap();
        run_migrations(&db).await.unwrap();
        assert_eq!(media_items::Entity::find().count(&db).await.unwrap(), 0);
    }
}
