use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use safestrip_api::models::{CreateDeviceRequest, Device, DeviceQuery};

use crate::errors::{ApiError, check_length};
use crate::store::MockStore;

pub const DEVICE_NAME_MAX: usize = 160;
pub const DEVICE_LABEL_MAX: usize = 160;

#[utoipa::path(
    get,
    path = "/api/devices",
    tag = "device",
    params(
        ("workspace_id" = Option<uuid::Uuid>, Query, description = "Restrict to one workspace")
    ),
    responses(
        (status = 200, description = "Devices, newest first", body = [Device])
    )
)]
pub async fn list_devices(
    State(store): State<MockStore>,
    Query(query): Query<DeviceQuery>,
) -> Json<Vec<Device>> {
    Json(store.list_devices(query.workspace_id).await)
}

#[utoipa::path(
    post,
    path = "/api/devices",
    tag = "device",
    request_body = CreateDeviceRequest,
    responses(
        (status = 201, description = "Device created", body = Device),
        (status = 404, description = "Workspace not found"),
        (status = 422, description = "Invalid device name or label")
    )
)]
pub async fn create_device(
    State(store): State<MockStore>,
    Json(body): Json<CreateDeviceRequest>,
) -> Result<(StatusCode, Json<Device>), ApiError> {
    check_length("device_name", &body.device_name, 1, DEVICE_NAME_MAX)?;
    if let Some(label) = &body.device_label {
        check_length("device_label", label, 0, DEVICE_LABEL_MAX)?;
    }

    let device = store.create_device(body).await?;

    Ok((StatusCode::CREATED, Json(device)))
}
