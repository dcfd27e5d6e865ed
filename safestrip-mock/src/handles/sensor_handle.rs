use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use safestrip_api::models::{CreateSensorReadingRequest, LatestReadingQuery, SensorReading};

use crate::errors::ApiError;
use crate::store::MockStore;

#[utoipa::path(
    post,
    path = "/sensor-readings",
    tag = "sensor",
    request_body = CreateSensorReadingRequest,
    responses(
        (status = 201, description = "Reading stored", body = SensorReading),
        (status = 404, description = "Device not found")
    )
)]
pub async fn create_reading(
    State(store): State<MockStore>,
    Json(body): Json<CreateSensorReadingRequest>,
) -> Result<(StatusCode, Json<SensorReading>), ApiError> {
    let reading = store.create_reading(body).await?;

    Ok((StatusCode::CREATED, Json(reading)))
}

#[utoipa::path(
    get,
    path = "/sensor-readings/latest",
    tag = "sensor",
    params(
        ("device_id" = uuid::Uuid, Query, description = "Device ID"),
        ("sensor_type" = Option<safestrip_api::models::SensorType>, Query, description = "Defaults to water")
    ),
    responses(
        (status = 200, description = "Latest reading, or null when there is none", body = SensorReading)
    )
)]
pub async fn latest_reading(
    State(store): State<MockStore>,
    Query(query): Query<LatestReadingQuery>,
) -> Json<Option<SensorReading>> {
    Json(store.latest_reading(query.device_id, query.sensor_type).await)
}
