use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use safestrip_api::models::{CreateWorkspaceRequest, Device, Id, Workspace, WorkspaceQuery};

use crate::errors::{ApiError, check_length};
use crate::store::MockStore;

pub const WORKSPACE_NAME_MAX: usize = 120;

#[utoipa::path(
    get,
    path = "/api/workspaces",
    tag = "workspace",
    params(
        ("created_by" = Option<uuid::Uuid>, Query, description = "Only workspaces created by this user")
    ),
    responses(
        (status = 200, description = "Workspaces, newest first", body = [Workspace])
    )
)]
pub async fn list_workspaces(
    State(store): State<MockStore>,
    Query(query): Query<WorkspaceQuery>,
) -> Json<Vec<Workspace>> {
    Json(store.list_workspaces(query.created_by).await)
}

#[utoipa::path(
    post,
    path = "/api/workspaces",
    tag = "workspace",
    request_body = CreateWorkspaceRequest,
    responses(
        (status = 201, description = "Workspace created", body = Workspace),
        (status = 422, description = "Invalid workspace name")
    )
)]
pub async fn create_workspace(
    State(store): State<MockStore>,
    Json(body): Json<CreateWorkspaceRequest>,
) -> Result<(StatusCode, Json<Workspace>), ApiError> {
    check_length("name", &body.name, 1, WORKSPACE_NAME_MAX)?;

    Ok((StatusCode::CREATED, Json(store.create_workspace(body).await)))
}

#[utoipa::path(
    get,
    path = "/api/workspaces/{workspace_id}/devices",
    tag = "workspace",
    params(
        ("workspace_id" = uuid::Uuid, Path, description = "Workspace ID")
    ),
    responses(
        (status = 200, description = "Devices of the workspace, newest first; empty for an unknown workspace", body = [Device])
    )
)]
pub async fn list_workspace_devices(
    State(store): State<MockStore>,
    Path(workspace_id): Path<Id>,
) -> Json<Vec<Device>> {
    Json(store.list_devices(Some(workspace_id)).await)
}
