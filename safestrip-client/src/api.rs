use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use safestrip_api::models::{
    CreateDeviceRequest, CreateSensorReadingRequest, CreateWorkspaceRequest, Device, DeviceQuery,
    Id, LatestReadingQuery, SensorReading, Workspace, WorkspaceQuery,
};
use serde::de::DeserializeOwned;

use crate::config::normalize_base_url;
use crate::error::{ClientError, Result};
use crate::session::SessionMirror;

/// REST surface of the SafeStrip backend.
#[async_trait]
pub trait BackendApi: Send + Sync {
    async fn list_workspaces(&self, query: &WorkspaceQuery) -> Result<Vec<Workspace>>;

    async fn create_workspace(&self, request: &CreateWorkspaceRequest) -> Result<Workspace>;

    async fn list_devices_for_workspace(&self, workspace_id: Id) -> Result<Vec<Device>>;

    async fn list_devices(&self, query: &DeviceQuery) -> Result<Vec<Device>>;

    async fn create_device(&self, request: &CreateDeviceRequest) -> Result<Device>;

    /// `None` when the device has no reading of that type yet.
    async fn latest_reading(&self, query: &LatestReadingQuery) -> Result<Option<SensorReading>>;

    async fn create_reading(&self, request: &CreateSensorReadingRequest) -> Result<SensorReading>;
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Option<SessionMirror>,
}

impl ApiClient {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, Self::DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: normalize_base_url(base_url),
            session: None,
        }
    }

    /// Attaches the access token of the mirrored session to every request.
    pub fn with_session(mut self, session: SessionMirror) -> Self {
        self.session = Some(session);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.as_ref().and_then(SessionMirror::access_token) {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.authorize(request).send().await?;
        Self::parse(response).await
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!("backend error {}: {}", status, body);
            return Err(ClientError::from_body(status.as_u16(), &body));
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl BackendApi for ApiClient {
    async fn list_workspaces(&self, query: &WorkspaceQuery) -> Result<Vec<Workspace>> {
        tracing::debug!("GET /api/workspaces");
        self.send(self.http.get(self.url("/api/workspaces")).query(query))
            .await
    }

    async fn create_workspace(&self, request: &CreateWorkspaceRequest) -> Result<Workspace> {
        tracing::debug!("POST /api/workspaces");
        self.send(self.http.post(self.url("/api/workspaces")).json(request))
            .await
    }

    async fn list_devices_for_workspace(&self, workspace_id: Id) -> Result<Vec<Device>> {
        let path = format!("/api/workspaces/{workspace_id}/devices");
        tracing::debug!("GET {}", path);
        self.send(self.http.get(self.url(&path))).await
    }

    async fn list_devices(&self, query: &DeviceQuery) -> Result<Vec<Device>> {
        tracing::debug!("GET /api/devices");
        self.send(self.http.get(self.url("/api/devices")).query(query))
            .await
    }

    async fn create_device(&self, request: &CreateDeviceRequest) -> Result<Device> {
        tracing::debug!("POST /api/devices");
        self.send(self.http.post(self.url("/api/devices")).json(request))
            .await
    }

    async fn latest_reading(&self, query: &LatestReadingQuery) -> Result<Option<SensorReading>> {
        tracing::debug!("GET /sensor-readings/latest");
        self.send(self.http.get(self.url("/sensor-readings/latest")).query(query))
            .await
    }

    async fn create_reading(&self, request: &CreateSensorReadingRequest) -> Result<SensorReading> {
        tracing::debug!("POST /sensor-readings");
        self.send(self.http.post(self.url("/sensor-readings")).json(request))
            .await
    }
}
