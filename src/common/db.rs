use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use anyhow::Result;
use std::time::Duration;
use crate::common::config::AppConfig;

pub async fn create_database_pool(config: &AppConfig) -> Result<PgPool> {
    tracing::info!(
        "connecting to PostgreSQL at {}",
        config.database.connection_string.replace("postgres://", "postgres://[user]:[pass]@")
    );

    let mut attempt = 0;
    const MAX_ATTEMPTS: usize = 3;

    while attempt < MAX_ATTEMPTS {
        attempt += 1;
        tracing::info!("PostgreSQL connection attempt #{}", attempt);

        match PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .min_connections(config.database.min_connections)
            .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.database.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.database.max_lifetime_secs))
            .connect(&config.database.connection_string)
            .await {
                Ok(pool) => {
                    match sqlx::query("SELECT 1").execute(&pool).await {
                        Ok(_) => {
                            tracing::info!("PostgreSQL connection established");

                            let migration_check = sqlx::query("SELECT EXISTS (SELECT 1 FROM pg_tables WHERE schemaname = 'auth' AND tablename = 'users')")
                                .fetch_one(&pool)
                                .await;

                            match migration_check {
                                Ok(row) => {
                                    let tables_exist: bool = row.get(0);
                                    if !tables_exist {
                                        tracing::warn!("database tables do not exist yet, run migrations with: cargo run --bin migrate --features migrations");
                                    }
                                },
                                Err(_) => {
                                    tracing::warn!("could not check migration state, run migrations with: cargo run --bin migrate --features migrations");
                                }
                            }

                            return Ok(pool);
                        },
                        Err(e) => {
                            tracing::error!("connection check failed: {}", e);
                            tracing::warn!("the database does not appear to be set up, run migrations with: cargo run --bin migrate --features migrations");
                            if attempt >= MAX_ATTEMPTS {
                                return Err(anyhow::anyhow!("failed to verify PostgreSQL connection: {}", e));
                            }
                        }
                    }
                },
                Err(e) => {
                    tracing::error!("failed to connect to PostgreSQL: {}", e);
                    if attempt >= MAX_ATTEMPTS {
                        return Err(anyhow::anyhow!("error connecting to PostgreSQL: {}", e));
                    }
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
    }

    Err(anyhow::anyhow!("could not establish a PostgreSQL connection after {} attempts", MAX_ATTEMPTS))
}
