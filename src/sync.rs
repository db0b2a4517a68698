use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Local, Timelike};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::debounce::{DEFAULT_DEBOUNCE_WINDOW, DebounceGate};
use crate::device::Device;
use crate::ratelimit::{BudgetSignal, DEFAULT_REQUEST_BUDGET, RateLimitGovernor};
use crate::remote::CloudClient;
use crate::types::RateLimitStatus;
use crate::{Error, Result};

const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(15 * 60);
const DEFAULT_FORCE_UPDATE_DELAY: Duration = Duration::from_secs(60);

/// Local hours during which polling slows down to conserve the call budget.
const NIGHT_WINDOW: std::ops::Range<u32> = 1..5;
const NIGHT_MINIMUM_DELAY: Duration = Duration::from_secs(60 * 60);

/// Next poll delay: inside the night window, four times the interval but at
/// least an hour; otherwise the interval unchanged.
fn compute_delay(interval: Duration, hour: u32) -> Duration {
    if NIGHT_WINDOW.contains(&hour) {
        (interval * 4).max(NIGHT_MINIMUM_DELAY)
    } else {
        interval
    }
}

type HourSource = Box<dyn Fn() -> u32 + Send + Sync>;

pub struct SyncServiceBuilder<C> {
    client: C,
    force_update_delay: Duration,
    debounce_window: Duration,
    request_budget: i64,
    hour_source: Option<HourSource>,
}

impl<C: CloudClient> SyncServiceBuilder<C> {
    fn new(client: C) -> Self {
        Self {
            client,
            force_update_delay: DEFAULT_FORCE_UPDATE_DELAY,
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
            request_budget: DEFAULT_REQUEST_BUDGET,
            hour_source: None,
        }
    }

    /// Delay between a user write and the forced refresh it schedules.
    pub fn force_update_delay(mut self, delay: Duration) -> Self {
        self.force_update_delay = delay;
        self
    }

    pub fn debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    /// Initial daily-call estimate used until the first status snapshot.
    pub fn request_budget(mut self, calls: i64) -> Self {
        self.request_budget = calls;
        self
    }

    /// Override the local-hour source (the night-window check). Tests use
    /// this to pin the clock to a known hour.
    pub fn hour_source(mut self, source: impl Fn() -> u32 + Send + Sync + 'static) -> Self {
        self.hour_source = Some(Box::new(source));
        self
    }

    pub fn build(self) -> SyncService<C> {
        SyncService {
            inner: Arc::new(Inner {
                client: self.client,
                governor: Mutex::new(RateLimitGovernor::new(self.request_budget)),
                debounce: DebounceGate::new(self.debounce_window),
                poll: Mutex::new(PollState::default()),
                force_update_delay: self.force_update_delay,
                hour_source: self.hour_source,
            }),
        }
    }
}

struct PollState {
    task: Option<JoinHandle<()>>,
    stop_tx: Option<watch::Sender<bool>>,
    interval: Duration,
    stopped: bool,
}

impl Default for PollState {
    fn default() -> Self {
        Self {
            task: None,
            stop_tx: None,
            interval: DEFAULT_UPDATE_INTERVAL,
            stopped: false,
        }
    }
}

struct Inner<C> {
    client: C,
    governor: Mutex<RateLimitGovernor>,
    debounce: DebounceGate,
    poll: Mutex<PollState>,
    force_update_delay: Duration,
    hour_source: Option<HourSource>,
}

/// Orchestrates cloud syncing for a device fleet: adaptive polling with night
/// backoff, debounce around user writes, rate governance, and classification
/// of remote failures. Performs no network I/O itself; everything goes
/// through the [`CloudClient`].
pub struct SyncService<C: CloudClient> {
    inner: Arc<Inner<C>>,
}

impl<C: CloudClient> SyncService<C> {
    pub fn builder(client: C) -> SyncServiceBuilder<C> {
        SyncServiceBuilder::new(client)
    }

    /// Begin background polling at the given interval. Any pending timer is
    /// cancelled first; only one is ever live.
    pub fn start_polling(&self, interval: Duration) {
        {
            let mut poll = self.inner.poll.lock().expect("poll state poisoned");
            poll.stopped = false;
            poll.interval = interval;
        }
        let first_delay = self.inner.next_delay(interval);
        self.spawn_run(first_delay, false);
    }

    /// Stop background polling. A pending timer is cancelled; an in-flight
    /// remote call is left to finish but nothing is rescheduled after it.
    pub fn stop_polling(&self) {
        let mut poll = self.inner.poll.lock().expect("poll state poisoned");
        poll.stopped = true;
        if let Some(tx) = poll.stop_tx.as_ref() {
            let _ = tx.send(true);
        }
        poll.task = None;
    }

    /// Whether a poll run is currently live.
    pub fn is_polling(&self) -> bool {
        let poll = self.inner.poll.lock().expect("poll state poisoned");
        !poll.stopped && poll.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Schedule a one-shot forced refresh after the configured delay,
    /// superseding any pending scheduled poll, then resume the normal
    /// cadence. Called after user writes so the optimistic local state gets
    /// confirmed once the cloud has caught up.
    pub fn force_update(&self) {
        self.force_update_after(self.inner.force_update_delay);
    }

    pub fn force_update_after(&self, delay: Duration) {
        debug!(delay_ms = delay.as_millis() as u64, "force update scheduled");
        self.spawn_run(delay, true);
    }

    /// One immediate sync pass. Non-forced passes are debounced around
    /// recent user interaction; all failures are classified, logged and
    /// swallowed so a bad poll never kills the cadence.
    pub async fn update_all_device_data(&self, force: bool) {
        self.inner.sync_once(force).await;
    }

    /// Record that a user-initiated write just happened, suppressing
    /// non-forced polls for the debounce window.
    pub fn notify_user_interaction(&self) {
        self.inner.debounce.record_interaction();
    }

    /// Entry point for the remote client's `rate_limit_status` push. Resyncs
    /// the governor and stops polling when the budget turns critical, so the
    /// leftover calls stay available for manual control.
    pub fn handle_rate_limit_status(&self, status: &RateLimitStatus) {
        let signal = self
            .inner
            .governor
            .lock()
            .expect("governor poisoned")
            .sync(status);
        match signal {
            BudgetSignal::Critical(remaining) => {
                error!(
                    remaining,
                    "rate limit critical, stopping polling to preserve manual control"
                );
                self.stop_polling();
            }
            BudgetSignal::Low(remaining) => {
                warn!(remaining, "rate limit almost reached for today");
            }
            BudgetSignal::Ok => {}
        }
    }

    /// Entry point for the remote client's `authorization_request` push.
    pub fn handle_authorization_request(&self, url: &str) {
        warn!(
            "navigate to {url} to start the authorisation flow; make sure the configured redirect URI matches this address"
        );
    }

    /// Fetch the device list. Token-gated; on failure the error is
    /// classified and logged and an empty list is returned, so a transient
    /// cloud problem degrades to "no devices" instead of propagating.
    pub async fn get_cloud_devices(&self) -> Vec<Device> {
        let gated = self
            .inner
            .governor
            .lock()
            .expect("governor poisoned")
            .consume_token();
        let outcome = match gated {
            Ok(()) => self.inner.client.get_cloud_devices().await,
            Err(err) => Err(err),
        };
        match outcome {
            Ok(devices) => devices,
            Err(err) => {
                self.inner
                    .report_remote_failure("failed to get cloud devices", &err)
                    .await;
                Vec::new()
            }
        }
    }

    /// Best-effort write of one field. Failures are logged with the full
    /// context (key, path, attempted value) and never propagated; the
    /// periodic resync corrects any drift. Records the user interaction and
    /// schedules a forced refresh to confirm the write.
    pub async fn write_field(
        &self,
        device: &Device,
        management_point: &str,
        key: &str,
        path: Option<&str>,
        value: &Value,
    ) {
        let gated = self
            .inner
            .governor
            .lock()
            .expect("governor poisoned")
            .consume_token();
        let outcome = match gated {
            Ok(()) => {
                self.inner
                    .client
                    .set_device_data(device.id(), management_point, key, path, value)
                    .await
            }
            Err(err) => Err(err),
        };
        if let Err(err) = outcome {
            error!(
                device = device.id(),
                management_point,
                key,
                path = path.unwrap_or(""),
                value = %value,
                "failed to set field: {}",
                err.user_message()
            );
            debug!(description = %device.masked_description(), "device state at write failure");
        }
        self.notify_user_interaction();
        self.force_update();
    }

    /// Cancel the current run (if any) and start a new one with the given
    /// first delay. The abort only ever lands on a pending sleep or a run
    /// being superseded; graceful stop goes through the watch channel.
    fn spawn_run(&self, first_delay: Duration, first_forced: bool) {
        let mut poll = self.inner.poll.lock().expect("poll state poisoned");
        if let Some(task) = poll.task.take() {
            task.abort();
        }
        let (tx, rx) = watch::channel(false);
        poll.stop_tx = Some(tx);
        poll.task = Some(tokio::spawn(run_poll_loop(
            Arc::clone(&self.inner),
            rx,
            first_delay,
            first_forced,
        )));
    }
}

impl<C: CloudClient> Drop for SyncService<C> {
    fn drop(&mut self) {
        let mut poll = self.inner.poll.lock().expect("poll state poisoned");
        poll.stopped = true;
        if let Some(task) = poll.task.take() {
            task.abort();
        }
    }
}

async fn run_poll_loop<C: CloudClient>(
    inner: Arc<Inner<C>>,
    mut stop_rx: watch::Receiver<bool>,
    first_delay: Duration,
    first_forced: bool,
) {
    let mut delay = first_delay;
    let mut forced = first_forced;
    loop {
        tokio::select! {
            _ = sleep(delay) => {}
            _ = stop_rx.changed() => return,
        }
        inner.sync_once(forced).await;
        if inner.is_stopped() || *stop_rx.borrow() {
            return;
        }
        forced = false;
        delay = inner.next_delay(inner.interval());
    }
}

impl<C: CloudClient> Inner<C> {
    fn interval(&self) -> Duration {
        self.poll.lock().expect("poll state poisoned").interval
    }

    fn is_stopped(&self) -> bool {
        self.poll.lock().expect("poll state poisoned").stopped
    }

    fn current_hour(&self) -> u32 {
        match &self.hour_source {
            Some(source) => source(),
            None => Local::now().hour(),
        }
    }

    fn next_delay(&self, interval: Duration) -> Duration {
        let delay = compute_delay(interval, self.current_hour());
        if delay > interval {
            debug!(
                minutes = delay.as_secs() / 60,
                "night window active (01:00-05:00), reducing polling frequency"
            );
        } else {
            debug!(minutes = delay.as_secs() / 60, "scheduling next update");
        }
        delay
    }

    async fn sync_once(&self, forced: bool) {
        if self.debounce.should_skip(forced) {
            debug!("skipping cloud update, recent user interaction inside the debounce window");
            return;
        }
        let gated: Result<()> = self
            .governor
            .lock()
            .expect("governor poisoned")
            .consume_token();
        let outcome = match gated {
            Ok(()) => self.client.update_all_device_data().await,
            Err(err) => Err(err),
        };
        if let Err(err) = outcome {
            self.report_remote_failure("failed to update device data", &err)
                .await;
        }
    }

    async fn report_remote_failure(&self, context: &str, err: &Error) {
        match err {
            Error::Api { .. } => error!("{context}: {}", err.user_message()),
            Error::AuthorizationExpired => {
                warn!(
                    "{context}: token set is no longer valid, requesting credential invalidation so a fresh authorisation flow can start"
                );
                self.client.invalidate_credentials().await;
            }
            Error::RateLimitExceeded => warn!("{context}: {err}"),
            other => error!("{context}: {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIFTEEN_MIN: Duration = Duration::from_millis(900_000);
    const ONE_HOUR: Duration = Duration::from_millis(3_600_000);

    #[test]
    fn night_hours_stretch_to_an_hour_minimum() {
        for hour in 1..5 {
            assert_eq!(compute_delay(FIFTEEN_MIN, hour), ONE_HOUR);
        }
    }

    #[test]
    fn night_hours_keep_quadrupled_interval_when_longer() {
        // 4 x 20 min exceeds the one-hour floor.
        let twenty_min = Duration::from_secs(20 * 60);
        assert_eq!(compute_delay(twenty_min, 3), Duration::from_secs(80 * 60));
    }

    #[test]
    fn day_hours_pass_interval_through() {
        for hour in [0, 5, 10, 23] {
            assert_eq!(compute_delay(FIFTEEN_MIN, hour), FIFTEEN_MIN);
        }
        assert_eq!(compute_delay(Duration::from_secs(60), 12), Duration::from_secs(60));
    }
}
