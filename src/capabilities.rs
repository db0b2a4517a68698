use serde_json::Value;
use tracing::debug;

use crate::device::DeviceData;
use crate::types::{ControlMode, DataPoint, OperatingMode, SetpointField, SetpointMode};
use crate::{Error, Result};

/// Fan speed value advertised by units with a quiet indoor mode.
const FAN_SPEED_QUIET: &str = "quiet";

/// Resolve which field holds the actionable setpoint for the given mode
/// triple. Pure and total over the defined combinations; the combinations the
/// device data model leaves undefined fail hard rather than guessing, because
/// a wrong guess would target the wrong physical quantity.
pub fn resolve_setpoint_field(
    operating_mode: OperatingMode,
    setpoint_mode: Option<SetpointMode>,
    control_mode: ControlMode,
) -> Result<SetpointField> {
    use ControlMode::*;
    use SetpointMode::*;

    match (setpoint_mode, control_mode) {
        // Simple split units carry no setpointMode: everything is an absolute
        // room target except leaving-water control, which only exposes the
        // weather-compensation offset.
        (None, LeavingWaterTemperature) => Ok(SetpointField::LeavingWaterOffset),
        (None, RoomTemperature | ExternalRoomTemperature) => Ok(SetpointField::RoomTemperature),

        (Some(Fixed), LeavingWaterTemperature) => Ok(SetpointField::LeavingWaterTemperature),
        (Some(Fixed), RoomTemperature | ExternalRoomTemperature) => {
            Ok(SetpointField::RoomTemperature)
        }

        (Some(WeatherDependent), LeavingWaterTemperature) => {
            Ok(SetpointField::LeavingWaterOffset)
        }
        (Some(WeatherDependent), RoomTemperature | ExternalRoomTemperature) => {
            Ok(SetpointField::RoomTemperature)
        }

        (Some(WeatherDependentHeatingFixedCooling), RoomTemperature) => {
            Ok(SetpointField::RoomTemperature)
        }
        (Some(WeatherDependentHeatingFixedCooling), LeavingWaterTemperature) => {
            match operating_mode {
                OperatingMode::Heating => Ok(SetpointField::LeavingWaterOffset),
                OperatingMode::Cooling => Ok(SetpointField::LeavingWaterTemperature),
                // auto/dry/fanOnly have no defined setpoint here.
                _ => Err(Error::SetpointResolution {
                    operating_mode,
                    setpoint_mode,
                    control_mode,
                }),
            }
        }
        (Some(WeatherDependentHeatingFixedCooling), ExternalRoomTemperature) => {
            Err(Error::SetpointResolution {
                operating_mode,
                setpoint_mode,
                control_mode,
            })
        }
    }
}

/// Capability view over one climate-control management point. Every check
/// re-derives from the raw device data on each call: capabilities can change
/// between polls (swing availability is mode-dependent, for example), so
/// nothing here is cached.
pub struct ClimateControl<'a, D: DeviceData> {
    data: &'a D,
    management_point: &'a str,
    name: &'a str,
}

impl<'a, D: DeviceData> ClimateControl<'a, D> {
    pub fn new(data: &'a D, management_point: &'a str, name: &'a str) -> Self {
        Self {
            data,
            management_point,
            name,
        }
    }

    pub fn get(&self, key: &str, path: Option<&str>) -> Option<DataPoint> {
        self.data.get_field(self.management_point, key, path)
    }

    /// Raw field value with a fallback for data points the unit may not
    /// carry at all.
    pub fn value_or(&self, key: &str, path: Option<&str>, default: Value) -> Value {
        self.get(key, path).map(|dp| dp.value).unwrap_or(default)
    }

    pub fn operating_mode(&self) -> OperatingMode {
        self.get("operationMode", None)
            .and_then(|dp| dp.as_str().and_then(OperatingMode::from_str))
            .unwrap_or(OperatingMode::Auto)
    }

    /// Only Altherma devices report a controlMode; everything else regulates
    /// room temperature.
    pub fn control_mode(&self) -> ControlMode {
        self.get("controlMode", None)
            .and_then(|dp| dp.as_str().and_then(ControlMode::from_str))
            .unwrap_or(ControlMode::RoomTemperature)
    }

    pub fn setpoint_mode(&self) -> Option<SetpointMode> {
        self.get("setpointMode", None)
            .and_then(|dp| dp.as_str().and_then(SetpointMode::from_str))
    }

    pub fn setpoint_field(&self, operating_mode: OperatingMode) -> Result<SetpointField> {
        resolve_setpoint_field(operating_mode, self.setpoint_mode(), self.control_mode())
    }

    /// Pointer path of the actionable setpoint for the given operating mode,
    /// ready to hand to the accessor or a write call.
    pub fn setpoint_path(&self, operating_mode: OperatingMode) -> Result<String> {
        Ok(format!(
            "/operationModes/{}/setpoints/{}",
            operating_mode.as_str(),
            self.setpoint_field(operating_mode)?.as_str()
        ))
    }

    pub fn has_swing_vertical(&self) -> bool {
        let path = format!(
            "/operationModes/{}/fanDirection/vertical/currentMode",
            self.operating_mode().as_str()
        );
        let present = self.get("fanControl", Some(&path)).is_some();
        debug!(name = self.name, present, "swing vertical feature check");
        present
    }

    pub fn has_swing_horizontal(&self) -> bool {
        let path = format!(
            "/operationModes/{}/fanDirection/horizontal/currentMode",
            self.operating_mode().as_str()
        );
        let present = self.get("fanControl", Some(&path)).is_some();
        debug!(name = self.name, present, "swing horizontal feature check");
        present
    }

    pub fn has_swing(&self) -> bool {
        self.has_swing_vertical() || self.has_swing_horizontal()
    }

    pub fn has_powerful_mode(&self) -> bool {
        let present = self.get("powerfulMode", None).is_some();
        debug!(name = self.name, present, "powerful mode feature check");
        present
    }

    pub fn has_econo_mode(&self) -> bool {
        let present = self.get("econoMode", None).is_some();
        debug!(name = self.name, present, "econo mode feature check");
        present
    }

    pub fn has_streamer_mode(&self) -> bool {
        let present = self.get("streamerMode", None).is_some();
        debug!(name = self.name, present, "streamer mode feature check");
        present
    }

    pub fn has_outdoor_silent_mode(&self) -> bool {
        let present = self.get("outdoorSilentMode", None).is_some();
        debug!(name = self.name, present, "outdoor silent mode feature check");
        present
    }

    /// Indoor silent mode exists when the fan speed of the current operating
    /// mode offers the quiet value.
    pub fn has_indoor_silent_mode(&self) -> bool {
        let path = format!(
            "/operationModes/{}/fanSpeed/currentMode",
            self.operating_mode().as_str()
        );
        let present = self
            .get("fanControl", Some(&path))
            .is_some_and(|dp| dp.allows(FAN_SPEED_QUIET));
        debug!(name = self.name, present, "indoor silent mode feature check");
        present
    }

    pub fn has_operating_mode(&self, mode: OperatingMode) -> bool {
        let present = self
            .get("operationMode", None)
            .is_some_and(|dp| dp.allows(mode.as_str()));
        debug!(name = self.name, mode = mode.as_str(), present, "operating mode check");
        present
    }

    pub fn has_dry_mode(&self) -> bool {
        self.has_operating_mode(OperatingMode::Dry)
    }

    pub fn has_fan_only_mode(&self) -> bool {
        self.has_operating_mode(OperatingMode::FanOnly)
    }
}
