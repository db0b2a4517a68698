use std::fmt;

use crate::types::{ControlMode, OperatingMode, SetpointMode};

#[derive(Debug)]
pub enum Error {
    /// The remote call was rejected with an HTTP-status-bearing error.
    Api { status: u16, message: String },
    /// The remote client reported an `invalid_grant` failure: the persisted
    /// token set is no longer usable and must be re-authorized.
    AuthorizationExpired,
    /// The local call budget is exhausted; the call was blocked before it
    /// reached the cloud.
    RateLimitExceeded,
    /// The (operating mode, setpoint mode, control mode) combination has no
    /// defined setpoint field. Guessing here risks writing to the wrong
    /// physical quantity, so this is a hard failure.
    SetpointResolution {
        operating_mode: OperatingMode,
        setpoint_mode: Option<SetpointMode>,
        control_mode: ControlMode,
    },
    /// Any other failure reported by the remote client.
    Remote(String),
}

impl Error {
    /// Classify a raw failure from the remote client: an HTTP status makes it
    /// an API error, an `invalid_grant` marker an authorization failure,
    /// everything else a generic remote failure.
    pub fn classify_remote(status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        if let Some(status) = status {
            return Error::Api { status, message };
        }
        if message.contains("invalid_grant") {
            return Error::AuthorizationExpired;
        }
        Error::Remote(message)
    }

    /// User-actionable description for API errors; falls back to the raw
    /// message for statuses without a dedicated explanation.
    pub fn user_message(&self) -> String {
        match self {
            Error::Api { status, message } => match status {
                400 => "Bad Request: The request to Daikin Cloud was invalid.".to_string(),
                401 => "Authentication Expired: Please re-authenticate.".to_string(),
                403 => "Access Denied: You do not have permission to access this resource."
                    .to_string(),
                429 => "Rate Limit Exceeded: Too many requests to Daikin Cloud. Polling paused."
                    .to_string(),
                500 => "Daikin Cloud Error: Internal server error.".to_string(),
                502 | 503 | 504 => {
                    "Daikin Cloud Unavailable: The service is temporarily down or under maintenance."
                        .to_string()
                }
                _ => message.clone(),
            },
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Api { status, message } => write!(f, "API error ({status}): {message}"),
            Error::AuthorizationExpired => write!(f, "authorization expired (invalid_grant)"),
            Error::RateLimitExceeded => write!(f, "rate limit exceeded: daily call budget empty"),
            Error::SetpointResolution {
                operating_mode,
                setpoint_mode,
                control_mode,
            } => write!(
                f,
                "could not determine the setpoint field for operationMode: {}, setpointMode: {}, controlMode: {}",
                operating_mode.as_str(),
                setpoint_mode.map_or("none", |m| m.as_str()),
                control_mode.as_str(),
            ),
            Error::Remote(msg) => write!(f, "remote client error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
