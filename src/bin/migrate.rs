use sqlx::postgres::PgPoolOptions;
use std::env;
use std::path::Path;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    if let Ok(path) = env::var("DOTENV_PATH") {
        dotenv::from_path(Path::new(&path)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::dotenv().ok();
    }

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    println!("connecting to the database...");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&database_url)
        .await?;

    println!("running migrations...");

    let migrations_dir = env::var("MIGRATIONS_DIR").unwrap_or_else(|_| "./migrations".to_string());
    println!("migrations directory: {}", migrations_dir);

    let migrator = sqlx::migrate::Migrator::new(Path::new(&migrations_dir))
        .await
        .expect("could not load migrator");

    migrator.run(&pool).await?;

    println!("migrations applied successfully");

    Ok(())
}
