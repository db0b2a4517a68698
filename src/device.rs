use serde_json::Value;
use tracing::{debug, warn};

use crate::types::DataPoint;

const REDACTED: &str = "REDACTED";

/// Data-point fields whose `value` never belongs in a log line.
const SENSITIVE_VALUE_FIELDS: &[&str] = &[
    "ipAddress",
    "macAddress",
    "ssid",
    "serialNumber",
    "wifiConnectionSSID",
];

/// Whole sub-trees that are dropped from logged descriptions.
const SENSITIVE_SUBTREES: &[&str] = &["consumptionData", "schedule"];

/// Read access to one device's capability data. The capability resolver only
/// ever sees this view; writes go through the remote client.
pub trait DeviceData {
    /// Look up a named field of a management point, optionally at a JSON
    /// pointer below it. Returns `None` when the field or path is absent.
    fn get_field(&self, management_point: &str, key: &str, path: Option<&str>) -> Option<DataPoint>;
}

/// A cloud device snapshot: the raw JSON description with its
/// `managementPoints` array, as delivered by the remote client.
#[derive(Debug, Clone)]
pub struct Device {
    description: Value,
}

impl Device {
    pub fn new(description: Value) -> Self {
        Self { description }
    }

    pub fn id(&self) -> &str {
        self.description.get("id").and_then(|v| v.as_str()).unwrap_or("")
    }

    pub fn description(&self) -> &Value {
        &self.description
    }

    fn management_points(&self) -> &[Value] {
        match self.description.get("managementPoints") {
            Some(Value::Array(points)) => points,
            _ => &[],
        }
    }

    fn management_point(&self, embedded_id: &str) -> Option<&Value> {
        self.management_points().iter().find(|point| {
            point.get("embeddedId").and_then(|v| v.as_str()) == Some(embedded_id)
        })
    }

    /// Resolve the embedded id of the management point with the given type
    /// (e.g. `climateControl`, `domesticHotWaterTank`, `gateway`). A device
    /// is expected to carry at most one point per type; duplicates are an
    /// anomaly that is logged, and the first match wins.
    pub fn management_point_of_type(&self, point_type: &str) -> Option<&str> {
        let mut matches = self.management_points().iter().filter_map(|point| {
            (point.get("managementPointType").and_then(|v| v.as_str()) == Some(point_type))
                .then(|| point.get("embeddedId").and_then(|v| v.as_str()))
                .flatten()
        });

        let first = matches.next();
        match first {
            None => {
                debug!(
                    device = self.id(),
                    point_type, "no management point of requested type"
                );
                None
            }
            Some(id) => {
                let extra = matches.count();
                if extra > 0 {
                    warn!(
                        device = self.id(),
                        point_type,
                        duplicates = extra,
                        "multiple management points of the same type, using the first"
                    );
                }
                Some(id)
            }
        }
    }

    /// Copy of the description with network identifiers and bulky private
    /// sub-trees redacted, safe to include in diagnostics.
    pub fn masked_description(&self) -> Value {
        let mut masked = self.description.clone();
        if let Some(Value::Array(points)) = masked.get_mut("managementPoints") {
            for point in points {
                let Some(point) = point.as_object_mut() else {
                    continue;
                };
                for field in SENSITIVE_VALUE_FIELDS {
                    if let Some(Value::Object(data)) = point.get_mut(*field) {
                        data.insert("value".to_string(), Value::String(REDACTED.to_string()));
                    }
                }
                for field in SENSITIVE_SUBTREES {
                    if point.contains_key(*field) {
                        point.insert(field.to_string(), Value::String(REDACTED.to_string()));
                    }
                }
            }
        }
        masked
    }
}

impl DeviceData for Device {
    fn get_field(&self, management_point: &str, key: &str, path: Option<&str>) -> Option<DataPoint> {
        let node = self.management_point(management_point)?.get(key)?;
        let node = match path {
            // Nested data points live inside the field's value tree on the
            // wire, so pointer paths are resolved there.
            Some(path) => node.get("value").unwrap_or(node).pointer(path)?,
            None => node,
        };
        serde_json::from_value(node.clone()).ok()
    }
}
