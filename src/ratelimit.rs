use tracing::{debug, warn};

use crate::types::RateLimitStatus;
use crate::{Error, Result};

/// Conservative starting estimate until the first status snapshot arrives.
pub(crate) const DEFAULT_REQUEST_BUDGET: i64 = 200;

/// At or below this many remaining daily calls, polling must stop so the
/// leftover budget stays available for manual control.
const CRITICAL_REMAINING: u32 = 10;

/// At or below this many remaining daily calls, warn but keep polling.
const LOW_REMAINING: u32 = 20;

/// Budget assessment derived from a status snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetSignal {
    Ok,
    /// Warn only; background polling continues.
    Low(u32),
    /// The caller must stop background polling.
    Critical(u32),
}

/// Best-effort local estimate of the remaining daily call budget. The
/// estimate is decremented optimistically per outgoing call and overwritten
/// whenever the remote client pushes an authoritative snapshot.
#[derive(Debug)]
pub struct RateLimitGovernor {
    bucket: i64,
}

impl RateLimitGovernor {
    pub fn new(initial_budget: i64) -> Self {
        Self {
            bucket: initial_budget,
        }
    }

    pub fn remaining(&self) -> i64 {
        self.bucket
    }

    /// Gate one outgoing call. The decrement is optimistic; the next
    /// `rate_limit_status` snapshot corrects any drift.
    pub fn consume_token(&mut self) -> Result<()> {
        if self.bucket <= 0 {
            warn!("request bucket empty, blocking call to prevent an API ban");
            return Err(Error::RateLimitExceeded);
        }
        self.bucket -= 1;
        Ok(())
    }

    /// Resync from an authoritative snapshot and classify the remaining
    /// budget. A snapshot without `remainingDay` leaves the estimate alone.
    pub fn sync(&mut self, status: &RateLimitStatus) -> BudgetSignal {
        debug!(
            remaining_day = ?status.remaining_day,
            limit_day = ?status.limit_day,
            remaining_minute = ?status.remaining_minute,
            limit_minute = ?status.limit_minute,
            "rate limit status"
        );

        let Some(remaining) = status.remaining_day else {
            return BudgetSignal::Ok;
        };
        self.bucket = i64::from(remaining);

        if remaining <= CRITICAL_REMAINING {
            BudgetSignal::Critical(remaining)
        } else if remaining <= LOW_REMAINING {
            BudgetSignal::Low(remaining)
        } else {
            BudgetSignal::Ok
        }
    }
}

impl Default for RateLimitGovernor {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_BUDGET)
    }
}
