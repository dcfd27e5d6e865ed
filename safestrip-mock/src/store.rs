use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use safestrip_api::models::{
    CreateDeviceRequest, CreateSensorReadingRequest, CreateWorkspaceRequest, Device, Id,
    SensorReading, SensorType, Workspace,
};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::ApiError;

/// Row plus insertion sequence, so listings stay newest first even when
/// two rows share a timestamp.
#[derive(Debug, Clone)]
struct Entry<T> {
    seq: u64,
    value: T,
}

type Table<T> = Arc<RwLock<HashMap<Id, Entry<T>>>>;

fn newest_first<T: Clone>(entries: impl Iterator<Item = Entry<T>>) -> Vec<T> {
    let mut entries: Vec<Entry<T>> = entries.collect();
    entries.sort_by(|a, b| b.seq.cmp(&a.seq));
    entries.into_iter().map(|entry| entry.value).collect()
}

/// In-memory tables behind the mock backend.
#[derive(Debug, Clone, Default)]
pub struct MockStore {
    workspaces: Table<Workspace>,
    devices: Table<Device>,
    readings: Table<SensorReading>,
    seq: Arc<AtomicU64>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn list_workspaces(&self, created_by: Option<Id>) -> Vec<Workspace> {
        let workspaces = self.workspaces.read().await;

        newest_first(
            workspaces
                .values()
                .filter(|entry| created_by.is_none() || entry.value.created_by == created_by)
                .cloned(),
        )
    }

    pub async fn create_workspace(&self, request: CreateWorkspaceRequest) -> Workspace {
        let workspace = Workspace {
            id: Uuid::new_v4(),
            name: request.name,
            created_by: request.created_by,
            created_at: Some(OffsetDateTime::now_utc()),
        };

        self.workspaces.write().await.insert(
            workspace.id,
            Entry {
                seq: self.next_seq(),
                value: workspace.clone(),
            },
        );

        tracing::info!("created workspace {} ({})", workspace.name, workspace.id);
        workspace
    }

    pub async fn workspace_exists(&self, id: Id) -> bool {
        self.workspaces.read().await.contains_key(&id)
    }

    pub async fn list_devices(&self, workspace_id: Option<Id>) -> Vec<Device> {
        let devices = self.devices.read().await;

        newest_first(
            devices
                .values()
                .filter(|entry| workspace_id.is_none_or(|id| entry.value.workspace_id == id))
                .cloned(),
        )
    }

    pub async fn create_device(&self, request: CreateDeviceRequest) -> Result<Device, ApiError> {
        if !self.workspace_exists(request.workspace_id).await {
            return Err(ApiError::WorkspaceNotFound);
        }

        let device = Device {
            id: Uuid::new_v4(),
            workspace_id: request.workspace_id,
            device_name: request.device_name,
            device_label: request.device_label,
            status: Some("offline".to_string()),
            last_seen_at: None,
            created_at: Some(OffsetDateTime::now_utc()),
        };

        self.devices.write().await.insert(
            device.id,
            Entry {
                seq: self.next_seq(),
                value: device.clone(),
            },
        );

        tracing::info!("created device {} ({})", device.device_name, device.id);
        Ok(device)
    }

    pub async fn create_reading(
        &self,
        request: CreateSensorReadingRequest,
    ) -> Result<SensorReading, ApiError> {
        let now = OffsetDateTime::now_utc();

        {
            let mut devices = self.devices.write().await;
            let device = devices
                .get_mut(&request.device_id)
                .ok_or(ApiError::DeviceNotFound)?;
            device.value.last_seen_at = Some(now);
            device.value.status = Some("online".to_string());
        }

        let reading = SensorReading {
            id: Uuid::new_v4(),
            device_id: request.device_id,
            sensor_type: request.sensor_type,
            value: request.value,
            unit: request.unit,
            raw: request.raw,
            created_at: Some(now),
        };

        self.readings.write().await.insert(
            reading.id,
            Entry {
                seq: self.next_seq(),
                value: reading.clone(),
            },
        );

        Ok(reading)
    }

    pub async fn latest_reading(&self, device_id: Id, sensor_type: SensorType) -> Option<SensorReading> {
        self.readings
            .read()
            .await
            .values()
            .filter(|entry| {
                entry.value.device_id == device_id && entry.value.sensor_type == sensor_type
            })
            .max_by_key(|entry| entry.seq)
            .map(|entry| entry.value.clone())
    }
}
