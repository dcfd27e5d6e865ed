use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use safestrip_api::models::{
    CreateDeviceRequest, CreateWorkspaceRequest, Device, Id, LatestReadingQuery, SensorReading,
    SensorType, Workspace, WorkspaceQuery,
};
use tokio::sync::{RwLock, RwLockReadGuard};

use crate::api::BackendApi;
use crate::error::{ClientError, ValidationError, required_name};

/// Locally mirrored workspaces and devices, newest first.
#[derive(Debug, Clone, Default)]
pub struct DirectoryCache {
    workspaces: Vec<Workspace>,
    devices: Vec<Device>,
    error: Option<String>,
}

impl DirectoryCache {
    pub fn from_parts(workspaces: Vec<Workspace>, devices: Vec<Device>) -> Self {
        Self {
            workspaces,
            devices,
            error: None,
        }
    }

    pub fn workspaces(&self) -> &[Workspace] {
        &self.workspaces
    }

    pub fn workspace(&self, id: Id) -> Option<&Workspace> {
        self.workspaces.iter().find(|workspace| workspace.id == id)
    }

    pub fn first_workspace(&self) -> Option<&Workspace> {
        self.workspaces.first()
    }

    /// A device is only reachable while its workspace is known.
    pub fn device(&self, id: Id) -> Option<&Device> {
        self.devices
            .iter()
            .find(|device| device.id == id)
            .filter(|device| self.workspace(device.workspace_id).is_some())
    }

    pub fn devices_for(&self, workspace_id: Id) -> Vec<&Device> {
        if self.workspace(workspace_id).is_none() {
            return Vec::new();
        }

        self.devices
            .iter()
            .filter(|device| device.workspace_id == workspace_id)
            .collect()
    }

    /// Last user-facing failure message.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn replace_devices_for(&mut self, workspace_id: Id, devices: Vec<Device>) {
        self.devices.retain(|device| device.workspace_id != workspace_id);

        let mut scoped = devices;
        scoped.append(&mut self.devices);
        self.devices = scoped;
    }

    fn prepend_workspace(&mut self, workspace: Workspace) {
        self.workspaces.retain(|existing| existing.id != workspace.id);
        self.workspaces.insert(0, workspace);
    }

    fn prepend_device(&mut self, device: Device) {
        self.devices.retain(|existing| existing.id != device.id);
        self.devices.insert(0, device);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListWorkspaces,
    CreateWorkspace,
    ListDevices,
    CreateDevice,
    LatestReading,
}

impl Operation {
    const COUNT: usize = 5;

    fn index(self) -> usize {
        self as usize
    }

    /// Generic message recorded when the backend call fails.
    pub fn failure_message(self) -> &'static str {
        match self {
            Operation::ListWorkspaces => "Failed to load workspaces",
            Operation::CreateWorkspace => "Failed to create workspace",
            Operation::ListDevices => "Failed to load devices",
            Operation::CreateDevice => "Failed to create device",
            Operation::LatestReading => "Failed to load sensor reading",
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Operation::ListWorkspaces => write!(f, "list workspaces"),
            Operation::CreateWorkspace => write!(f, "create workspace"),
            Operation::ListDevices => write!(f, "list devices"),
            Operation::CreateDevice => write!(f, "create device"),
            Operation::LatestReading => write!(f, "latest reading"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0} is already in progress")]
    Busy(Operation),

    #[error("Workspace not found")]
    WorkspaceNotFound(Id),

    #[error("Select a workspace first")]
    NoWorkspaceSelected,

    #[error("{message}")]
    Backend {
        message: &'static str,
        #[source]
        source: ClientError,
    },
}

impl DirectoryError {
    pub fn is_busy(&self) -> bool {
        matches!(self, DirectoryError::Busy(_))
    }
}

pub type Result<T, E = DirectoryError> = std::result::Result<T, E>;

#[derive(Debug, Default)]
struct InFlight {
    flags: [AtomicBool; Operation::COUNT],
}

impl InFlight {
    fn acquire(&self, operation: Operation) -> Result<InFlightGuard<'_>> {
        let flag = &self.flags[operation.index()];

        if flag.swap(true, Ordering::AcqRel) {
            tracing::debug!("rejecting concurrent {}", operation);
            return Err(DirectoryError::Busy(operation));
        }

        Ok(InFlightGuard { flag })
    }

    fn any(&self) -> bool {
        self.flags.iter().any(|flag| flag.load(Ordering::Acquire))
    }
}

struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Workspace and device directory backed by the REST API.
///
/// Failed backend calls keep the cache as it was and record a generic
/// message readable through [`Directory::error`].
pub struct Directory {
    api: Arc<dyn BackendApi>,
    cache: Arc<RwLock<DirectoryCache>>,
    in_flight: InFlight,
}

impl Directory {
    pub fn new(api: Arc<dyn BackendApi>) -> Self {
        Self {
            api,
            cache: Arc::new(RwLock::new(DirectoryCache::default())),
            in_flight: InFlight::default(),
        }
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, DirectoryCache> {
        self.cache.read().await
    }

    pub async fn snapshot(&self) -> DirectoryCache {
        self.cache.read().await.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.any()
    }

    pub async fn error(&self) -> Option<String> {
        self.cache.read().await.error.clone()
    }

    pub async fn clear_error(&self) {
        self.cache.write().await.error = None;
    }

    /// Forgets everything, used when the session ends.
    pub async fn reset(&self) {
        *self.cache.write().await = DirectoryCache::default();
    }

    async fn fail(&self, operation: Operation, source: ClientError) -> DirectoryError {
        let message = operation.failure_message();
        tracing::warn!("{}: {}", message, source);

        self.cache.write().await.error = Some(message.to_string());
        DirectoryError::Backend { message, source }
    }

    pub async fn list_workspaces(&self) -> Result<Vec<Workspace>> {
        let _guard = self.in_flight.acquire(Operation::ListWorkspaces)?;

        match self.api.list_workspaces(&WorkspaceQuery::default()).await {
            Ok(workspaces) => {
                tracing::debug!("loaded {} workspaces", workspaces.len());
                self.cache.write().await.workspaces = workspaces.clone();
                Ok(workspaces)
            }
            Err(e) => Err(self.fail(Operation::ListWorkspaces, e).await),
        }
    }

    pub async fn create_workspace(&self, name: &str) -> Result<Workspace> {
        let name = required_name(name)?;
        let _guard = self.in_flight.acquire(Operation::CreateWorkspace)?;

        let request = CreateWorkspaceRequest {
            name: name.to_string(),
            created_by: None,
        };

        match self.api.create_workspace(&request).await {
            Ok(workspace) => {
                tracing::info!("created workspace {} ({})", workspace.name, workspace.id);
                self.cache.write().await.prepend_workspace(workspace.clone());
                Ok(workspace)
            }
            Err(e) => Err(self.fail(Operation::CreateWorkspace, e).await),
        }
    }

    pub async fn list_devices_for_workspace(&self, workspace_id: Id) -> Result<Vec<Device>> {
        let _guard = self.in_flight.acquire(Operation::ListDevices)?;

        match self.api.list_devices_for_workspace(workspace_id).await {
            Ok(devices) => {
                let received = devices.len();
                let devices: Vec<Device> = devices
                    .into_iter()
                    .filter(|device| device.workspace_id == workspace_id)
                    .collect();
                if devices.len() < received {
                    tracing::warn!(
                        "dropped {} devices outside workspace {}",
                        received - devices.len(),
                        workspace_id
                    );
                }

                tracing::debug!("loaded {} devices for {}", devices.len(), workspace_id);
                self.cache
                    .write()
                    .await
                    .replace_devices_for(workspace_id, devices.clone());
                Ok(devices)
            }
            Err(e) => Err(self.fail(Operation::ListDevices, e).await),
        }
    }

    pub async fn create_device(
        &self,
        workspace_id: Id,
        name: &str,
        label: Option<&str>,
    ) -> Result<Device> {
        if self.cache.read().await.workspace(workspace_id).is_none() {
            return Err(DirectoryError::WorkspaceNotFound(workspace_id));
        }
        let name = required_name(name)?;
        let _guard = self.in_flight.acquire(Operation::CreateDevice)?;

        let request = CreateDeviceRequest {
            workspace_id,
            device_name: name.to_string(),
            device_label: label
                .map(str::trim)
                .filter(|label| !label.is_empty())
                .map(str::to_string),
        };

        match self.api.create_device(&request).await {
            Ok(device) => {
                tracing::info!("created device {} ({})", device.device_name, device.id);
                self.cache.write().await.prepend_device(device.clone());
                Ok(device)
            }
            Err(e) => Err(self.fail(Operation::CreateDevice, e).await),
        }
    }

    /// Loads workspaces, then the devices of the first one. Returns the
    /// workspace to select by default, even when its devices failed to
    /// load; that failure stays readable through [`Directory::error`].
    pub async fn load(&self) -> Result<Option<Id>> {
        self.list_workspaces().await?;

        let first = self.cache.read().await.first_workspace().map(|w| w.id);
        if let Some(workspace_id) = first {
            if let Err(e) = self.list_devices_for_workspace(workspace_id).await {
                tracing::debug!("devices of {} not loaded: {}", workspace_id, e);
            }
        }

        Ok(first)
    }

    pub async fn latest_reading(
        &self,
        device_id: Id,
        sensor_type: SensorType,
    ) -> Result<Option<SensorReading>> {
        let _guard = self.in_flight.acquire(Operation::LatestReading)?;

        let query = LatestReadingQuery {
            device_id,
            sensor_type,
        };

        match self.api.latest_reading(&query).await {
            Ok(reading) => Ok(reading),
            Err(e) => Err(self.fail(Operation::LatestReading, e).await),
        }
    }
}
