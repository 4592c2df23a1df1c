//! HTTP route definitions

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::{header, HeaderName, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::debug;

use crate::app::AppState;
use crate::catalog::{Car, Track};
use crate::game::{RaceResults, RaceSummary, RegistryError};
use crate::util::time::uptime_secs;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PUT,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            header::ACCEPT,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-requested-with"),
        ]);

    let api_routes = Router::new()
        .route("/cars", get(list_cars_handler))
        .route("/tracks", get(list_tracks_handler))
        .route("/races", get(list_races_handler).post(create_race_handler))
        .route("/races/:race_id", get(get_race_handler))
        .route("/races/:race_id/start", post(start_race_handler))
        .route("/races/:race_id/accelerate", post(accelerate_handler))
        .route("/races/:race_id/finish", post(finish_race_handler));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api_routes)
        .fallback(not_found_handler)
        .layer(TimeoutLayer::new(state.config.request_timeout))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    total_races: usize,
    active_races: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        total_races: state.race_registry.total_races(),
        active_races: state.race_registry.active_races(),
    })
}

// ============================================================================
// Catalog endpoints
// ============================================================================

async fn list_cars_handler(State(state): State<AppState>) -> Json<Vec<Car>> {
    Json(state.catalog.cars().to_vec())
}

async fn list_tracks_handler(State(state): State<AppState>) -> Json<Vec<Track>> {
    Json(
        state
            .catalog
            .tracks()
            .iter()
            .map(|track| track.as_ref().clone())
            .collect(),
    )
}

// ============================================================================
// Race endpoints
// ============================================================================

#[derive(Deserialize)]
struct CreateRaceRequest {
    player_id: u32,
    // Older clients send the misspelled key
    #[serde(alias = "tack_id")]
    track_id: u32,
}

#[derive(Serialize)]
struct CreateRaceResponse {
    id: u64,
    player_id: u32,
    track: Track,
    results: RaceResults,
}

async fn list_races_handler(State(state): State<AppState>) -> Json<Vec<RaceSummary>> {
    Json(state.race_registry.list())
}

async fn create_race_handler(
    State(state): State<AppState>,
    req: Result<Json<CreateRaceRequest>, JsonRejection>,
) -> Result<Json<CreateRaceResponse>, AppError> {
    let Json(req) = req?;
    let race = state
        .race_registry
        .create_race(req.player_id, req.track_id)?;

    Ok(Json(CreateRaceResponse {
        id: race.id(),
        player_id: race.player_id(),
        track: race.track().as_ref().clone(),
        results: race.results(),
    }))
}

async fn get_race_handler(
    State(state): State<AppState>,
    race_id: Result<Path<u64>, PathRejection>,
) -> Result<Json<RaceResults>, AppError> {
    let Path(race_id) = race_id?;
    Ok(Json(state.race_registry.results(race_id)?))
}

async fn start_race_handler(
    State(state): State<AppState>,
    race_id: Result<Path<u64>, PathRejection>,
) -> Result<Json<RaceResults>, AppError> {
    let Path(race_id) = race_id?;
    state.race_registry.start(race_id)?;
    Ok(Json(state.race_registry.results(race_id)?))
}

async fn accelerate_handler(
    State(state): State<AppState>,
    race_id: Result<Path<u64>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(race_id) = race_id?;
    if !state.accelerate_limiter.check(race_id) {
        debug!(race_id, "Accelerate rate limited");
        return Err(AppError::TooManyRequests);
    }

    state.race_registry.accelerate(race_id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn finish_race_handler(
    State(state): State<AppState>,
    race_id: Result<Path<u64>, PathRejection>,
) -> Result<Json<RaceResults>, AppError> {
    let Path(race_id) = race_id?;
    state.race_registry.finish(race_id)?;
    Ok(Json(state.race_registry.results(race_id)?))
}

async fn not_found_handler() -> AppError {
    AppError::NotFound("No such route".to_string())
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Too many requests")]
    TooManyRequests,
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::RaceNotFound(_)
            | RegistryError::TrackNotFound(_)
            | RegistryError::CarNotFound(_) => AppError::NotFound(err.to_string()),
            RegistryError::Race(_) => AppError::Conflict(err.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::TooManyRequests => {
                (StatusCode::TOO_MANY_REQUESTS, "Too many requests".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
