mod common;

use chrono::Duration;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use std::sync::Arc;

use common::{local, seed_sale, seed_telegram_recipient, setup_test_db, FakeTracker, RecordingNotifier, SaleSeed};
use sales_tracker_backend::config::TrackingConfig;
use sales_tracker_backend::entities::{prelude::*, sales, tracking_check_logs};
use sales_tracker_backend::services::tracking_client::Track17Client;
use sales_tracker_backend::services::tracking_sync::{TrackingSyncScope, TrackingSyncService};

struct Harness {
    db: DatabaseConnection,
    tracker: Arc<FakeTracker>,
    notifier: Arc<RecordingNotifier>,
    service: TrackingSyncService,
}

async fn harness_with(tracker: FakeTracker, config: TrackingConfig) -> Harness {
    let db = setup_test_db().await.unwrap();
    let tracker = Arc::new(tracker);
    let notifier = Arc::new(RecordingNotifier::default());
    let service = TrackingSyncService::new(db.clone(), tracker.clone(), notifier.clone(), config);
    Harness {
        db,
        tracker,
        notifier,
        service,
    }
}

async fn harness() -> Harness {
    harness_with(FakeTracker::default(), TrackingConfig::default()).await
}

async fn reload(db: &DatabaseConnection, id: i32) -> sales::Model {
    Sales::find_by_id(id).one(db).await.unwrap().unwrap()
}

const FORCE: TrackingSyncScope = TrackingSyncScope {
    user_id: None,
    force: true,
};

fn tracked(client: &'static str, number: &'static str, created_at: chrono::DateTime<chrono::Utc>) -> SaleSeed<'static> {
    let mut seed = SaleSeed::new(client, created_at);
    seed.tracking_number = Some(number);
    seed
}

#[tokio::test]
async fn test_first_check_waits_for_delay_then_registers_and_checks() {
    let h = harness().await;
    let sale = seed_sale(&h.db, tracked("Aziz", "LX123", local(2025, 1, 1, 12, 0))).await;

    let early = h
        .service
        .sync(local(2025, 1, 1, 13, 0), TrackingSyncScope::default())
        .await
        .unwrap();
    assert!(early.enabled);
    assert_eq!(early.candidates, 1);
    assert_eq!(early.groups, 1);
    assert_eq!(early.skipped, 1);
    assert_eq!(early.checked, 0);
    assert!(h.tracker.status_calls().is_empty());
    assert!(h.tracker.register_calls().is_empty());

    let now = local(2025, 1, 3, 13, 0);
    let due = h.service.sync(now, TrackingSyncScope::default()).await.unwrap();
    assert_eq!(due.checked, 1);
    assert_eq!(due.updated, 1);
    assert_eq!(due.registered, 1);
    assert_eq!(h.tracker.register_calls(), vec!["LX123".to_string()]);
    assert_eq!(h.tracker.status_calls(), vec!["LX123".to_string()]);

    let sale = reload(&h.db, sale.id).await;
    assert_eq!(sale.tracking_status.as_deref(), Some("InTransit"));
    assert_eq!(sale.tracking_provider.as_deref(), Some("17track"));
    assert_eq!(sale.tracking_registered_at, Some(now));
    assert_eq!(sale.tracking_synced_at, Some(now));
    assert_eq!(sale.tracking_next_check_at, Some(now + Duration::days(4)));
    assert_eq!(sale.tracking_arrived_at, None);
}

#[tokio::test]
async fn test_shared_tracking_number_is_one_group() {
    let h = harness().await;
    seed_telegram_recipient(&h.db, "1001", None).await;
    h.tracker.respond("LX999", "InTransit", "Departed from Guangzhou");

    let first = seed_sale(&h.db, tracked("First", "LX999", local(2025, 1, 1, 9, 0))).await;
    let second = seed_sale(&h.db, tracked("Second", "LX999", local(2025, 1, 1, 10, 0))).await;

    let result = h.service.sync(local(2025, 1, 5, 9, 0), TrackingSyncScope::default()).await.unwrap();

    assert_eq!(result.candidates, 2);
    assert_eq!(result.groups, 1);
    assert_eq!(result.checked, 1);
    assert_eq!(result.updated, 1);
    assert_eq!(h.tracker.status_calls(), vec!["LX999".to_string()]);

    for id in [first.id, second.id] {
        let sale = reload(&h.db, id).await;
        assert_eq!(sale.tracking_last_event.as_deref(), Some("Departed from Guangzhou"));
    }

    assert_eq!(result.notified, 1);
    let texts = h.notifier.texts();
    assert!(texts[0].contains("LX999"));
    assert!(texts[0].contains("First") && texts[0].contains("Second"));
}

#[tokio::test]
async fn test_failed_check_backs_off_and_keeps_status() {
    let h = harness().await;
    seed_telegram_recipient(&h.db, "1001", None).await;
    let sale = seed_sale(&h.db, tracked("Aziz", "LX500", local(2025, 1, 1, 9, 0))).await;

    h.tracker.respond("LX500", "InTransit", "Accepted by carrier");
    h.service.sync(local(2025, 1, 4, 9, 0), FORCE).await.unwrap();
    h.notifier.clear();

    h.tracker.fail("LX500", "upstream unavailable");
    let now = local(2025, 1, 8, 9, 0);
    let result = h.service.sync(now, TrackingSyncScope::default()).await.unwrap();

    assert_eq!(result.checked, 1);
    assert_eq!(result.failed, 1);
    assert_eq!(result.updated, 0);
    assert_eq!(h.notifier.count(), 0);

    let sale = reload(&h.db, sale.id).await;
    assert_eq!(sale.tracking_status.as_deref(), Some("InTransit"));
    assert_eq!(sale.tracking_last_event.as_deref(), Some("Accepted by carrier"));
    assert_eq!(sale.tracking_synced_at, Some(now));
    assert_eq!(sale.tracking_next_check_at, Some(now + Duration::days(4)));

    let last_log = TrackingCheckLogs::find()
        .filter(tracking_check_logs::Column::TrackingNumber.eq("LX500"))
        .order_by_desc(tracking_check_logs::Column::Id)
        .one(&h.db)
        .await
        .unwrap()
        .unwrap();
    assert!(!last_log.success);
    assert!(last_log.error.unwrap().contains("upstream unavailable"));
}

#[tokio::test]
async fn test_arrival_is_terminal_unless_forced() {
    let h = harness().await;
    let sale = seed_sale(&h.db, tracked("Aziz", "LX777", local(2025, 1, 1, 9, 0))).await;
    h.tracker.respond("LX777", "InTransit", "Arrived at Tashkent sorting center");

    let now = local(2025, 1, 5, 9, 0);
    h.service.sync(now, TrackingSyncScope::default()).await.unwrap();

    let stored = reload(&h.db, sale.id).await;
    assert_eq!(stored.tracking_arrived_at, Some(now));
    assert_eq!(stored.tracking_next_check_at, None);

    let later = h
        .service
        .sync(local(2025, 2, 1, 9, 0), TrackingSyncScope::default())
        .await
        .unwrap();
    assert_eq!(later.checked, 0);
    assert_eq!(later.skipped, 1);

    let forced = h.service.sync(local(2025, 2, 1, 9, 5), FORCE).await.unwrap();
    assert_eq!(forced.checked, 1);
    assert_eq!(h.tracker.status_calls().len(), 2);

    // First arrival time is kept
    assert_eq!(reload(&h.db, sale.id).await.tracking_arrived_at, Some(now));
}

#[tokio::test]
async fn test_batch_limit_services_most_overdue_first() {
    let config = TrackingConfig {
        batch_limit: 2,
        ..TrackingConfig::default()
    };
    let h = harness_with(FakeTracker::default(), config).await;

    seed_sale(&h.db, tracked("Newest", "LXC", local(2025, 1, 3, 9, 0))).await;
    seed_sale(&h.db, tracked("Oldest", "LXA", local(2025, 1, 1, 9, 0))).await;
    seed_sale(&h.db, tracked("Middle", "LXB", local(2025, 1, 2, 9, 0))).await;

    let result = h.service.sync(local(2025, 1, 10, 9, 0), TrackingSyncScope::default()).await.unwrap();

    assert_eq!(result.groups, 3);
    assert_eq!(result.checked, 2);
    assert_eq!(result.skipped, 1);
    assert_eq!(h.tracker.status_calls(), vec!["LXA".to_string(), "LXB".to_string()]);
}

#[tokio::test]
async fn test_registration_failure_does_not_block_status_check() {
    let tracker = FakeTracker {
        fail_register: true,
        ..FakeTracker::default()
    };
    let h = harness_with(tracker, TrackingConfig::default()).await;
    let sale = seed_sale(&h.db, tracked("Aziz", "LX321", local(2025, 1, 1, 9, 0))).await;

    let result = h.service.sync(local(2025, 1, 5, 9, 0), TrackingSyncScope::default()).await.unwrap();

    assert_eq!(result.registered, 0);
    assert_eq!(result.updated, 1);
    assert_eq!(h.tracker.status_calls(), vec!["LX321".to_string()]);
    assert_eq!(reload(&h.db, sale.id).await.tracking_registered_at, None);
}

#[tokio::test]
async fn test_unchanged_status_keeps_last_changed_at() {
    let h = harness().await;
    let sale = seed_sale(&h.db, tracked("Aziz", "LX888", local(2025, 1, 1, 9, 0))).await;
    h.tracker.respond("LX888", "InTransit", "Departed");

    let first = local(2025, 1, 4, 9, 0);
    h.service.sync(first, FORCE).await.unwrap();
    h.service.sync(local(2025, 1, 9, 9, 0), FORCE).await.unwrap();

    let stored = reload(&h.db, sale.id).await;
    assert_eq!(stored.tracking_last_changed_at, Some(first));
    assert_eq!(stored.tracking_synced_at, Some(local(2025, 1, 9, 9, 0)));

    let logs = TrackingCheckLogs::find().all(&h.db).await.unwrap();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|log| log.success));
}

#[tokio::test]
async fn test_sync_disabled_without_api_key() {
    let db = setup_test_db().await.unwrap();
    let provider = Arc::new(Track17Client::new(&TrackingConfig::default(), std::time::Duration::from_secs(10)));
    let service = TrackingSyncService::new(
        db.clone(),
        provider,
        Arc::new(RecordingNotifier::default()),
        TrackingConfig::default(),
    );
    seed_sale(&db, tracked("Aziz", "LX123", local(2025, 1, 1, 9, 0))).await;

    let result = service.sync(local(2025, 1, 9, 9, 0), FORCE).await.unwrap();
    assert!(!result.enabled);
    assert_eq!(result.checked, 0);
}

#[tokio::test]
async fn test_one_failing_group_does_not_stop_the_batch() {
    let h = harness().await;
    let failing = seed_sale(&h.db, tracked("First", "LXA", local(2025, 1, 1, 9, 0))).await;
    let healthy = seed_sale(&h.db, tracked("Second", "LXB", local(2025, 1, 2, 9, 0))).await;
    h.tracker.fail("LXA", "timeout");
    h.tracker.respond("LXB", "InTransit", "Departed from Urumqi");

    let now = local(2025, 1, 10, 9, 0);
    let result = h.service.sync(now, TrackingSyncScope::default()).await.unwrap();

    assert_eq!(result.checked, 2);
    assert_eq!(result.failed, 1);
    assert_eq!(result.updated, 1);
    assert_eq!(h.tracker.status_calls(), vec!["LXA".to_string(), "LXB".to_string()]);

    let healthy = reload(&h.db, healthy.id).await;
    assert_eq!(healthy.tracking_last_event.as_deref(), Some("Departed from Urumqi"));
    assert_eq!(healthy.tracking_synced_at, Some(now));

    let failing = reload(&h.db, failing.id).await;
    assert_eq!(failing.tracking_status, None);
    assert_eq!(failing.tracking_next_check_at, Some(now + Duration::days(4)));

    let logs = TrackingCheckLogs::find()
        .order_by_asc(tracking_check_logs::Column::Id)
        .all(&h.db)
        .await
        .unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs.iter().filter(|log| !log.success).count(), 1);
    assert!(logs.iter().any(|log| log.success && log.tracking_number == "LXB"));
    assert!(logs.iter().any(|log| !log.success && log.tracking_number == "LXA"));
}
