use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[cfg_attr(feature = "docs", derive(utoipa::ToSchema))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorType {
    #[default]
    Water,
    Smoke,
    Temperature,
    Current,
}

impl Display for SensorType {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            SensorType::Water => write!(f, "water"),
            SensorType::Smoke => write!(f, "smoke"),
            SensorType::Temperature => write!(f, "temperature"),
            SensorType::Current => write!(f, "current"),
        }
    }
}

#[cfg_attr(feature = "docs", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Reading identifier
    pub id: Uuid,
    /// Reporting device
    pub device_id: Uuid,
    /// Sensor kind
    pub sensor_type: SensorType,
    /// Numeric reading value
    pub value: f64,
    /// Unit of the value
    #[serde(default)]
    pub unit: Option<String>,
    /// Raw sensor payload
    #[cfg_attr(feature = "docs", schema(value_type = Option<Object>))]
    #[serde(default)]
    pub raw: Option<serde_json::Map<String, serde_json::Value>>,
    /// Server receive time
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

#[cfg_attr(feature = "docs", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSensorReadingRequest {
    pub device_id: Uuid,
    pub sensor_type: SensorType,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[cfg_attr(feature = "docs", schema(value_type = Option<Object>))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestReadingQuery {
    pub device_id: Uuid,
    #[serde(default)]
    pub sensor_type: SensorType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_type_wire_names() {
        assert_eq!(serde_json::to_string(&SensorType::Water).unwrap(), "\"water\"");
        assert_eq!(
            serde_json::from_str::<SensorType>("\"temperature\"").unwrap(),
            SensorType::Temperature
        );
        assert_eq!(SensorType::Smoke.to_string(), "smoke");
    }
}
