use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A registered power strip.
#[cfg_attr(feature = "docs", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Server assigned identifier
    pub id: Uuid,
    /// Owning workspace
    pub workspace_id: Uuid,
    /// Display name
    pub device_name: String,
    /// Short optional label
    #[serde(default)]
    pub device_label: Option<String>,
    /// Reported status, open ended
    #[serde(default)]
    pub status: Option<String>,
    /// Last time the strip checked in
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_seen_at: Option<OffsetDateTime>,
    /// Registration time
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

impl Device {
    pub fn status(&self) -> DeviceStatus {
        DeviceStatus::from(self.status.as_deref())
    }
}

#[cfg_attr(feature = "docs", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDeviceRequest {
    /// Parent workspace identifier
    pub workspace_id: Uuid,
    /// Device name
    pub device_name: String,
    /// Optional short label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_label: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceQuery {
    /// Restrict to one workspace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<Uuid>,
}

/// Display classification of the free-form device status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceStatus {
    Online,
    Offline,
    Warning,
    Other(String),
    Unknown,
}

impl DeviceStatus {
    /// Upper-cased badge text.
    pub fn label(&self) -> String {
        match self {
            DeviceStatus::Online => "ONLINE".to_string(),
            DeviceStatus::Offline => "OFFLINE".to_string(),
            DeviceStatus::Warning => "WARNING".to_string(),
            DeviceStatus::Other(status) => status.to_uppercase(),
            DeviceStatus::Unknown => "UNKNOWN".to_string(),
        }
    }
}

impl From<Option<&str>> for DeviceStatus {
    fn from(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => DeviceStatus::Unknown,
            Some(status) => match status.to_ascii_lowercase().as_str() {
                "online" => DeviceStatus::Online,
                "offline" => DeviceStatus::Offline,
                "warning" => DeviceStatus::Warning,
                _ => DeviceStatus::Other(status.to_string()),
            },
        }
    }
}

impl Display for DeviceStatus {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            DeviceStatus::Online => write!(f, "online"),
            DeviceStatus::Offline => write!(f, "offline"),
            DeviceStatus::Warning => write!(f, "warning"),
            DeviceStatus::Other(status) => write!(f, "{status}"),
            DeviceStatus::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(DeviceStatus::from(Some("online")), DeviceStatus::Online);
        assert_eq!(DeviceStatus::from(Some("OFFLINE")), DeviceStatus::Offline);
        assert_eq!(DeviceStatus::from(None), DeviceStatus::Unknown);
        assert_eq!(DeviceStatus::from(Some("  ")), DeviceStatus::Unknown);
        assert_eq!(
            DeviceStatus::from(Some("tripped")),
            DeviceStatus::Other("tripped".to_string())
        );
    }

    #[test]
    fn test_status_label() {
        assert_eq!(DeviceStatus::from(Some("warning")).label(), "WARNING");
        assert_eq!(DeviceStatus::from(Some("tripped")).label(), "TRIPPED");
        assert_eq!(DeviceStatus::Unknown.label(), "UNKNOWN");
    }

    #[test]
    fn test_device_without_label_and_times() {
        let json = r#"{
            "id": "6f1c2d4e-8a5b-4c3d-9e7f-0a1b2c3d4e5f",
            "workspace_id": "1b2c3d4e-5f60-4718-8293-a4b5c6d7e8f9",
            "device_name": "Desk strip",
            "status": "online",
            "last_seen_at": "2025-03-01T10:15:30.123456+00:00",
            "created_at": null
        }"#;

        let device: Device = serde_json::from_str(json).unwrap();

        assert_eq!(device.device_name, "Desk strip");
        assert_eq!(device.device_label, None);
        assert_eq!(device.status(), DeviceStatus::Online);
        assert!(device.last_seen_at.is_some());
        assert!(device.created_at.is_none());
    }
}
