use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, FromRequest, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use compost_control::{
    ControlParameters, ControlService, DeviceService, ErrorKind, NewSample, Rotation,
    TelemetryService,
};

// Shared state between the HTTP handlers
#[derive(Clone)]
pub struct WebState {
    pub telemetry: Arc<TelemetryService>,
    pub control: Arc<ControlService>,
    pub device: Arc<DeviceService>,
}

/// `{status, data, message}` wrapper used by every endpoint.
#[derive(Serialize)]
pub struct Envelope<T> {
    pub status: u16,
    pub data: Option<T>,
    pub message: String,
}

fn respond<T: Serialize>(status: StatusCode, data: Option<T>, message: &str) -> Response {
    let body = Envelope {
        status: status.as_u16(),
        data,
        message: message.to_string(),
    };
    (status, axum::Json(body)).into_response()
}

fn ok<T: Serialize>(data: T, message: &str) -> Response {
    respond(StatusCode::OK, Some(data), message)
}

pub enum ApiError {
    Control(compost_control::Error),
    /// The request body could not be read as the expected JSON.
    Body(JsonRejection),
}

impl From<compost_control::Error> for ApiError {
    fn from(err: compost_control::Error) -> Self {
        ApiError::Control(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Body(rejection)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Control(err) => {
                let status = match err.kind() {
                    ErrorKind::Configuration | ErrorKind::BusinessRule => StatusCode::BAD_REQUEST,
                    ErrorKind::Storage | ErrorKind::Transport => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                if status.is_server_error() {
                    error!("request failed: {err}");
                }
                respond::<()>(status, None, &err.to_string())
            }
            ApiError::Body(rejection) => {
                respond::<()>(StatusCode::BAD_REQUEST, None, &rejection.body_text())
            }
        }
    }
}

/// `axum::Json` whose rejection is answered inside the envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct Json<T>(pub T);

type ApiResult = std::result::Result<Response, ApiError>;

#[derive(Deserialize)]
pub struct RotationRequest {
    #[serde(default)]
    log: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
pub enum TemperatureRequest {
    Phases {
        mesophilic_temp: f64,
        thermophilic_temp: f64,
    },
    Breakpoints(ControlParameters),
}

#[derive(Deserialize)]
pub struct MoistureRequest {
    moist_min: f64,
    moist_max: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuzzyRequest {
    current_temperature: f64,
    target_temperature: f64,
}

#[derive(Serialize)]
pub struct Days {
    days: i64,
}

pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/data/realtime", get(get_realtime).post(post_realtime))
        .route("/data/records", get(get_records).post(post_records))
        .route("/control", get(get_control))
        .route("/control/temperature", put(put_control_temperature))
        .route("/control/moisture", put(put_control_moisture))
        .route("/state", get(get_state))
        .route("/state/days", get(get_days))
        .route("/state/activate", put(activate_device))
        .route("/state/deactivate", put(deactivate_device))
        .route("/fuzzy", post(calculate_fuzzy).get(get_fuzzy))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn create_web_server(state: WebState, bind: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    info!("Starting web server on http://{bind}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn get_realtime(State(state): State<WebState>) -> ApiResult {
    let latest = state.telemetry.latest().await?;
    Ok(ok(latest.into_iter().collect::<Vec<_>>(), "Latest data retrieved"))
}

async fn post_realtime(State(state): State<WebState>, Json(sample): Json<NewSample>) -> ApiResult {
    let ingested = state.telemetry.ingest(sample).await?;
    match &ingested.rotation {
        Rotation::Archived { record, .. } => {
            info!(record = record.id, "buffer rotated during ingest")
        }
        Rotation::Deferred { reason } => {
            warn!(id = ingested.sample.id, "rotation deferred: {reason}")
        }
        Rotation::NotEnoughData { .. } => {}
    }
    // The notice task runs on its own; dropping the handle detaches it.
    Ok(ok(ingested.sample, "Data inserted"))
}

async fn post_records(
    State(state): State<WebState>,
    Json(request): Json<RotationRequest>,
) -> ApiResult {
    if request.log.as_deref() != Some("MCU") {
        return Ok(respond::<()>(StatusCode::BAD_REQUEST, None, "Log false"));
    }
    match state.telemetry.rotate().await? {
        Rotation::Archived { record, .. } => Ok(ok(record, "Data inserted")),
        Rotation::NotEnoughData { .. } => {
            Ok(respond::<()>(StatusCode::OK, None, "Not enough data"))
        }
        Rotation::Deferred { reason } => {
            Ok(respond::<()>(StatusCode::INTERNAL_SERVER_ERROR, None, &reason))
        }
    }
}

async fn get_records(State(state): State<WebState>) -> ApiResult {
    Ok(ok(state.telemetry.records().await?, "Data retrieved"))
}

async fn get_control(State(state): State<WebState>) -> ApiResult {
    Ok(ok(state.control.settings().await?, "Control settings retrieved"))
}

async fn put_control_temperature(
    State(state): State<WebState>,
    Json(request): Json<TemperatureRequest>,
) -> ApiResult {
    let settings = match request {
        TemperatureRequest::Phases {
            mesophilic_temp,
            thermophilic_temp,
        } => {
            state
                .control
                .set_phase_temperatures(mesophilic_temp, thermophilic_temp)
                .await?
        }
        TemperatureRequest::Breakpoints(params) => state.control.set_parameters(params).await?,
    };
    Ok(ok(settings, "Setting updated"))
}

async fn put_control_moisture(
    State(state): State<WebState>,
    Json(request): Json<MoistureRequest>,
) -> ApiResult {
    let settings = state
        .control
        .set_moisture(request.moist_min, request.moist_max)
        .await?;
    Ok(ok(settings, "Setting updated"))
}

async fn get_state(State(state): State<WebState>) -> ApiResult {
    Ok(ok(state.device.state().await?, "State retrieved"))
}

async fn get_days(State(state): State<WebState>) -> ApiResult {
    let days = state.device.days_elapsed().await?;
    Ok(ok(Days { days }, "Elapsed days counted"))
}

async fn activate_device(State(state): State<WebState>) -> ApiResult {
    Ok(ok(state.device.activate().await?, "State updated"))
}

async fn deactivate_device(State(state): State<WebState>) -> ApiResult {
    Ok(ok(state.device.deactivate().await?, "State updated"))
}

async fn calculate_fuzzy(
    State(state): State<WebState>,
    Json(request): Json<FuzzyRequest>,
) -> ApiResult {
    let actuator = state
        .control
        .regulate(request.current_temperature, request.target_temperature)
        .await?;
    Ok(ok(actuator, "Fuzzy output calculated"))
}

async fn get_fuzzy(State(state): State<WebState>) -> ApiResult {
    Ok(ok(state.control.actuator().await?, "PWM value retrieved"))
}
