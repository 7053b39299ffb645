use chrono::Utc;
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::env;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sales_tracker_backend::config::AppConfig;
use sales_tracker_backend::services::notification_scheduler::NotificationScope;
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

    // Usage: run_notifications [--user-id <id>] [--force-weekly] [--test]
    let args: Vec<String> = env::args().skip(1).collect();
    let mut scope = NotificationScope::default();
    let mut test_mode = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--user-id" => {
                let value = iter.next().ok_or("--user-id needs a value")?;
                scope.user_id = Some(value.parse()?);
            }
            "--force-weekly" => scope.force_weekly = true,
            "--test" => test_mode = true,
            other => {
                eprintln!("Unknown argument: {}", other);
                eprintln!("Usage: cargo run --bin run_notifications -- [--user-id <id>] [--force-weekly] [--test]");
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
    let scheduler = state.scheduler();

    let result = if test_mode {
        scheduler.run_test(Utc::now(), scope.user_id).await?
    } else {
        scheduler.run(Utc::now(), scope).await?
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
