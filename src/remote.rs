use std::future::Future;

use serde_json::Value;

use crate::Result;
use crate::device::Device;

/// The opaque remote client this core orchestrates. Implemented outside the
/// crate by whatever performs the actual Onecta HTTP traffic and token
/// handling; the sync core never does network I/O itself.
///
/// The client is also expected to push `RateLimitStatus` snapshots and
/// authorization-request URLs back into the service through
/// [`SyncService::handle_rate_limit_status`](crate::SyncService::handle_rate_limit_status)
/// and
/// [`SyncService::handle_authorization_request`](crate::SyncService::handle_authorization_request).
pub trait CloudClient: Send + Sync + 'static {
    /// Fetch the full device list with fresh descriptions.
    fn get_cloud_devices(&self) -> impl Future<Output = Result<Vec<Device>>> + Send;

    /// Refresh the data of all known devices in place.
    fn update_all_device_data(&self) -> impl Future<Output = Result<()>> + Send;

    /// Write one field of a management point.
    fn set_device_data(
        &self,
        device_id: &str,
        management_point: &str,
        key: &str,
        path: Option<&str>,
        value: &Value,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Discard persisted credentials so a fresh authorization flow can begin.
    /// Called after an `invalid_grant` failure.
    fn invalidate_credentials(&self) -> impl Future<Output = ()> + Send;
}
