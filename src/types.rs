use serde::Deserialize;
use serde_json::Value;

/// Operation mode reported by a climate control management point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    Auto,
    Heating,
    Cooling,
    Dry,
    FanOnly,
}

impl OperatingMode {
    pub const ALL: [OperatingMode; 5] = [
        OperatingMode::Auto,
        OperatingMode::Heating,
        OperatingMode::Cooling,
        OperatingMode::Dry,
        OperatingMode::FanOnly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperatingMode::Auto => "auto",
            OperatingMode::Heating => "heating",
            OperatingMode::Cooling => "cooling",
            OperatingMode::Dry => "dry",
            OperatingMode::FanOnly => "fanOnly",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(OperatingMode::Auto),
            "heating" => Some(OperatingMode::Heating),
            "cooling" => Some(OperatingMode::Cooling),
            "dry" => Some(OperatingMode::Dry),
            "fanOnly" => Some(OperatingMode::FanOnly),
            _ => None,
        }
    }
}

/// Which physical quantity the device regulates. Only Altherma heat pumps
/// report this; split units have an implicit `roomTemperature`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    RoomTemperature,
    LeavingWaterTemperature,
    ExternalRoomTemperature,
}

impl ControlMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlMode::RoomTemperature => "roomTemperature",
            ControlMode::LeavingWaterTemperature => "leavingWaterTemperature",
            ControlMode::ExternalRoomTemperature => "externalRoomTemperature",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "roomTemperature" => Some(ControlMode::RoomTemperature),
            "leavingWaterTemperature" => Some(ControlMode::LeavingWaterTemperature),
            "externalRoomTemperature" => Some(ControlMode::ExternalRoomTemperature),
            _ => None,
        }
    }
}

/// Whether the setpoint is an absolute target or a weather-compensation
/// offset. Absent on simple split units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetpointMode {
    Fixed,
    WeatherDependent,
    WeatherDependentHeatingFixedCooling,
}

impl SetpointMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetpointMode::Fixed => "fixed",
            SetpointMode::WeatherDependent => "weatherDependent",
            SetpointMode::WeatherDependentHeatingFixedCooling => {
                "weatherDependentHeatingFixedCooling"
            }
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "fixed" => Some(SetpointMode::Fixed),
            "weatherDependent" => Some(SetpointMode::WeatherDependent),
            "weatherDependentHeatingFixedCooling" => {
                Some(SetpointMode::WeatherDependentHeatingFixedCooling)
            }
            _ => None,
        }
    }
}

/// The concrete data field that holds the actionable temperature target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetpointField {
    RoomTemperature,
    LeavingWaterTemperature,
    LeavingWaterOffset,
}

impl SetpointField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetpointField::RoomTemperature => "roomTemperature",
            SetpointField::LeavingWaterTemperature => "leavingWaterTemperature",
            SetpointField::LeavingWaterOffset => "leavingWaterOffset",
        }
    }
}

/// One named, optionally path-qualified property of a management point.
/// Read-only view; writes go through the remote client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPoint {
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub settable: bool,
    #[serde(default)]
    pub step_value: Option<f64>,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    #[serde(default, rename = "values")]
    pub allowed_values: Option<Vec<String>>,
}

impl DataPoint {
    /// Whether `value` is listed in this data point's allowed values.
    pub fn allows(&self, value: &str) -> bool {
        self.allowed_values
            .as_deref()
            .is_some_and(|values| values.iter().any(|v| v == value))
    }

    pub fn as_str(&self) -> Option<&str> {
        self.value.as_str()
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.value.as_f64()
    }
}

/// Snapshot pushed by the remote client after each cloud call. Authoritative
/// over any locally estimated budget.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    #[serde(default)]
    pub remaining_day: Option<u32>,
    #[serde(default)]
    pub limit_day: Option<u32>,
    #[serde(default)]
    pub remaining_minute: Option<u32>,
    #[serde(default)]
    pub limit_minute: Option<u32>,
}
