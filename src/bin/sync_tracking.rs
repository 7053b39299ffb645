use chrono::Utc;
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::env;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sales_tracker_backend::config::AppConfig;
use sales_tracker_backend::services::tracking_sync::TrackingSyncScope;
use sales_tracker_backend::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sales_tracker_backend=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Usage: sync_tracking [--user-id <id>] [--force]
    let args: Vec<String> = env::args().skip(1).collect();
    let mut scope = TrackingSyncScope::default();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--user-id" => {
                let value = iter.next().ok_or("--user-id needs a value")?;
                scope.user_id = Some(value.parse()?);
            }
            "--force" => scope.force = true,
            other => {
                eprintln!("Unknown argument: {}", other);
                eprintln!("Usage: cargo run --bin sync_tracking -- [--user-id <id>] [--force]");
                std::process::exit(1);
            }
        }
    }

    let config = AppConfig::from_env();
    let database_url = config.database_url.clone().ok_or("DATABASE_URL must be set")?;

    tracing::info!("Connecting to database...");
    let db = Database::connect(&database_url).await?;
    migration::Migrator::up(&db, None).await?;

    let state = AppState::new(db, config);
    let result = state.tracking_sync().sync(Utc::now(), scope).await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
