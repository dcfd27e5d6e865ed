use axum::Json;
use axum::Router;
use axum::routing::get;
use utoipa::OpenApi;

use crate::handles::*;
use crate::store::MockStore;

#[derive(OpenApi)]
#[openapi(
    paths(
        list_workspaces,
        create_workspace,
        list_workspace_devices,
        list_devices,
        create_device,
        create_reading,
        latest_reading
    ),
    tags(
        (name = "workspace", description = "Workspaces group devices"),
        (name = "device", description = "Registered power strips"),
        (name = "sensor", description = "Sensor readings")
    )
)]
pub struct ApiDoc;

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn create_app(store: MockStore) -> Router {
    let workspaces = Router::new()
        .route("/", get(list_workspaces).post(create_workspace))
        .route("/:workspace_id/devices", get(list_workspace_devices));

    let devices = Router::new().route("/", get(list_devices).post(create_device));

    let readings = Router::new()
        .route("/", axum::routing::post(create_reading))
        .route("/latest", get(latest_reading));

    Router::new()
        .nest("/api/workspaces", workspaces)
        .nest("/api/devices", devices)
        .nest("/sensor-readings", readings)
        .route("/api-docs/openapi.json", get(openapi))
        .with_state(store)
}
