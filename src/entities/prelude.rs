//! `SeaORM` Entity prelude

pub use super::notification_logs::Entity as NotificationLogs;
pub use super::notification_recipients::Entity as NotificationRecipients;
pub use super::sales::Entity as Sales;
pub use super::tracking_check_logs::Entity as TrackingCheckLogs;
pub use super::users::Entity as Users;
