mod capabilities;
mod debounce;
mod device;
mod error;
mod ratelimit;
mod remote;
mod sync;
mod types;

pub use capabilities::{ClimateControl, resolve_setpoint_field};
pub use debounce::DebounceGate;
pub use device::{Device, DeviceData};
pub use error::{Error, Result};
pub use ratelimit::{BudgetSignal, RateLimitGovernor};
pub use remote::CloudClient;
pub use sync::{SyncService, SyncServiceBuilder};
pub use types::*;
