pub use sea_orm_migration::prelude::*;

mod m20250101_000001_create_users;
mod m20250101_000002_create_sales;
mod m20250101_000003_create_notification_recipients;
mod m20250101_000004_create_notification_logs;
mod m20250101_000005_create_tracking_check_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_users::Migration),
            Box::new(m20250101_000002_create_sales::Migration),
            Box::new(m20250101_000003_create_notification_recipients::Migration),
            Box::new(m20250101_000004_create_notification_logs::Migration),
            Box::new(m20250101_000005_create_tracking_check_logs::Migration),
        ]
    }
}
