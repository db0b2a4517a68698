use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use daikin_onecta::{CloudClient, Device, Error, RateLimitStatus, Result, SyncService};
use serde_json::{Value, json};

#[derive(Clone, Copy)]
enum FailMode {
    None,
    Api(u16),
    InvalidGrant,
}

#[derive(Clone)]
struct MockCloud {
    update_attempts: Arc<AtomicU32>,
    updates: Arc<AtomicU32>,
    device_fetches: Arc<AtomicU32>,
    writes: Arc<AtomicU32>,
    invalidations: Arc<AtomicU32>,
    fail: FailMode,
}

impl MockCloud {
    fn new() -> Self {
        Self::failing(FailMode::None)
    }

    fn failing(fail: FailMode) -> Self {
        Self {
            update_attempts: Arc::new(AtomicU32::new(0)),
            updates: Arc::new(AtomicU32::new(0)),
            device_fetches: Arc::new(AtomicU32::new(0)),
            writes: Arc::new(AtomicU32::new(0)),
            invalidations: Arc::new(AtomicU32::new(0)),
            fail,
        }
    }

    fn failure(&self) -> Option<Error> {
        match self.fail {
            FailMode::None => None,
            FailMode::Api(status) => Some(Error::classify_remote(Some(status), "remote rejected")),
            FailMode::InvalidGrant => {
                Some(Error::classify_remote(None, "token refresh failed: invalid_grant"))
            }
        }
    }

    fn updates(&self) -> u32 {
        self.updates.load(Ordering::SeqCst)
    }
}

impl CloudClient for MockCloud {
    async fn get_cloud_devices(&self) -> Result<Vec<Device>> {
        self.device_fetches.fetch_add(1, Ordering::SeqCst);
        match self.failure() {
            Some(err) => Err(err),
            None => Ok(vec![Device::new(json!({
                "id": "dev-1",
                "managementPoints": [],
            }))]),
        }
    }

    async fn update_all_device_data(&self) -> Result<()> {
        self.update_attempts.fetch_add(1, Ordering::SeqCst);
        match self.failure() {
            Some(err) => Err(err),
            None => {
                self.updates.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    async fn set_device_data(
        &self,
        _device_id: &str,
        _management_point: &str,
        _key: &str,
        _path: Option<&str>,
        _value: &Value,
    ) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        match self.failure() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn invalidate_credentials(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}

fn day_service(cloud: MockCloud) -> SyncService<MockCloud> {
    SyncService::builder(cloud).hour_source(|| 10).build()
}

/// Let woken tasks run to their next await point.
async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await;
    settle().await;
}

fn status(remaining_day: u32) -> RateLimitStatus {
    RateLimitStatus {
        remaining_day: Some(remaining_day),
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn polling_runs_on_the_configured_interval() {
    let cloud = MockCloud::new();
    let service = day_service(cloud.clone());

    service.start_polling(Duration::from_secs(60));
    assert!(service.is_polling());
    assert_eq!(cloud.updates(), 0);

    sleep(Duration::from_secs(61)).await;
    assert_eq!(cloud.updates(), 1);

    sleep(Duration::from_secs(60)).await;
    assert_eq!(cloud.updates(), 2);
}

#[tokio::test(start_paused = true)]
async fn restart_cancels_the_pending_timer() {
    let cloud = MockCloud::new();
    let service = day_service(cloud.clone());

    // Restarting repeatedly must never stack timers.
    service.start_polling(Duration::from_secs(60));
    service.start_polling(Duration::from_secs(60));
    service.start_polling(Duration::from_secs(60));

    sleep(Duration::from_secs(61)).await;
    assert_eq!(cloud.updates(), 1);
}

#[tokio::test(start_paused = true)]
async fn night_window_stretches_the_first_delay() {
    let cloud = MockCloud::new();
    let service = SyncService::builder(cloud.clone()).hour_source(|| 2).build();

    // One minute interval at 02:00 local: the first delay becomes an hour.
    service.start_polling(Duration::from_millis(60_000));

    sleep(Duration::from_secs(59 * 60)).await;
    assert_eq!(cloud.updates(), 0);

    sleep(Duration::from_secs(2 * 60)).await;
    assert_eq!(cloud.updates(), 1);
}

#[tokio::test(start_paused = true)]
async fn scheduled_poll_skipped_inside_debounce_window() {
    let cloud = MockCloud::new();
    let service = day_service(cloud.clone());
    service.start_polling(Duration::from_secs(60));

    sleep(Duration::from_secs(50)).await;
    service.notify_user_interaction();

    // The poll at t=60 lands 10s after the write and is suppressed.
    sleep(Duration::from_secs(11)).await;
    assert_eq!(cloud.updates(), 0);

    // The next one at t=120 is well past the window and proceeds.
    sleep(Duration::from_secs(60)).await;
    assert_eq!(cloud.updates(), 1);
}

#[tokio::test(start_paused = true)]
async fn forced_update_bypasses_debounce() {
    let cloud = MockCloud::new();
    let service = day_service(cloud.clone());

    service.notify_user_interaction();
    service.update_all_device_data(false).await;
    assert_eq!(cloud.updates(), 0);

    service.update_all_device_data(true).await;
    assert_eq!(cloud.updates(), 1);
}

#[tokio::test(start_paused = true)]
async fn force_update_supersedes_pending_poll_then_resumes() {
    let cloud = MockCloud::new();
    let service = day_service(cloud.clone());
    service.start_polling(Duration::from_secs(60));

    sleep(Duration::from_secs(30)).await;
    service.force_update_after(Duration::from_secs(5));

    // Forced one-shot fires at t=35; the original t=60 timer is gone.
    sleep(Duration::from_secs(6)).await;
    assert_eq!(cloud.updates(), 1);

    // Normal cadence resumes from the forced update: next poll at t=95.
    sleep(Duration::from_secs(61)).await;
    assert_eq!(cloud.updates(), 2);
}

#[tokio::test(start_paused = true)]
async fn stop_polling_halts_the_cadence() {
    let cloud = MockCloud::new();
    let service = day_service(cloud.clone());
    service.start_polling(Duration::from_secs(60));

    sleep(Duration::from_secs(61)).await;
    assert_eq!(cloud.updates(), 1);

    service.stop_polling();
    assert!(!service.is_polling());

    sleep(Duration::from_secs(600)).await;
    assert_eq!(cloud.updates(), 1);
}

#[tokio::test(start_paused = true)]
async fn critical_budget_stops_polling() {
    let cloud = MockCloud::new();
    let service = day_service(cloud.clone());
    service.start_polling(Duration::from_secs(60));

    service.handle_rate_limit_status(&status(10));
    assert!(!service.is_polling());

    sleep(Duration::from_secs(600)).await;
    assert_eq!(cloud.updates(), 0);
}

#[tokio::test(start_paused = true)]
async fn low_budget_warns_but_keeps_polling() {
    let cloud = MockCloud::new();
    let service = day_service(cloud.clone());
    service.start_polling(Duration::from_secs(60));

    service.handle_rate_limit_status(&status(19));
    assert!(service.is_polling());

    sleep(Duration::from_secs(61)).await;
    assert_eq!(cloud.updates(), 1);
}

#[tokio::test(start_paused = true)]
async fn status_snapshot_caps_subsequent_calls() {
    let cloud = MockCloud::new();
    let service = day_service(cloud.clone());

    service.handle_rate_limit_status(&status(12));
    for _ in 0..13 {
        service.update_all_device_data(true).await;
    }
    // The 13th call was blocked locally before reaching the client.
    assert_eq!(cloud.updates(), 12);
    assert_eq!(cloud.update_attempts.load(Ordering::SeqCst), 12);
}

#[tokio::test(start_paused = true)]
async fn exhausted_budget_blocks_before_the_client() {
    let cloud = MockCloud::new();
    let service = SyncService::builder(cloud.clone())
        .hour_source(|| 10)
        .request_budget(0)
        .build();

    service.update_all_device_data(true).await;
    assert_eq!(cloud.update_attempts.load(Ordering::SeqCst), 0);

    assert!(service.get_cloud_devices().await.is_empty());
    assert_eq!(cloud.device_fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn invalid_grant_requests_credential_invalidation() {
    let cloud = MockCloud::failing(FailMode::InvalidGrant);
    let service = day_service(cloud.clone());

    service.update_all_device_data(true).await;
    assert_eq!(cloud.invalidations.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_poll_does_not_kill_the_cadence() {
    let cloud = MockCloud::failing(FailMode::Api(503));
    let service = day_service(cloud.clone());
    service.start_polling(Duration::from_secs(60));

    sleep(Duration::from_secs(61)).await;
    sleep(Duration::from_secs(60)).await;
    // Both polls failed, were logged, and the scheduler kept going.
    assert_eq!(cloud.update_attempts.load(Ordering::SeqCst), 2);
    assert!(service.is_polling());
}

#[tokio::test(start_paused = true)]
async fn get_cloud_devices_degrades_to_empty_on_failure() {
    let cloud = MockCloud::failing(FailMode::Api(500));
    let service = day_service(cloud.clone());
    assert!(service.get_cloud_devices().await.is_empty());
    assert_eq!(cloud.device_fetches.load(Ordering::SeqCst), 1);

    let cloud = MockCloud::new();
    let service = day_service(cloud.clone());
    assert_eq!(service.get_cloud_devices().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn write_field_schedules_a_forced_confirmation() {
    let cloud = MockCloud::new();
    let service = day_service(cloud.clone());
    let device = Device::new(json!({ "id": "dev-1", "managementPoints": [] }));

    service
        .write_field(&device, "climateControl", "onOffMode", None, &json!("on"))
        .await;
    assert_eq!(cloud.writes.load(Ordering::SeqCst), 1);

    // The confirmation fires after the default force-update delay and gets
    // through even though the write armed the debounce gate.
    sleep(Duration::from_secs(61)).await;
    assert_eq!(cloud.updates(), 1);
}

#[tokio::test(start_paused = true)]
async fn write_field_swallows_failures() {
    let cloud = MockCloud::failing(FailMode::Api(400));
    let service = day_service(cloud.clone());
    let device = Device::new(json!({ "id": "dev-1", "managementPoints": [] }));

    // Must log and return, never panic or propagate.
    service
        .write_field(
            &device,
            "climateControl",
            "temperatureControl",
            Some("/operationModes/heating/setpoints/roomTemperature"),
            &json!(21.5),
        )
        .await;
    assert_eq!(cloud.writes.load(Ordering::SeqCst), 1);
}
