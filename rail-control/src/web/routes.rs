//! HTTP route handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::control::{ControlError, Player};
use crate::domain::Train;
use crate::handoff::{HandoffError, MotionCommand, TrainState};
use crate::service::{CallError, StationStatus, StationSummary};

use super::dto::*;
use super::socket::ws_upgrade;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_upgrade))
        .route("/api/stations", get(list_stations))
        .route("/api/stations/:id", get(station_status))
        .route("/api/players", get(list_players))
        .route("/api/trains", get(list_trains).post(register_train))
        .route(
            "/api/trains/:number",
            get(train_state).delete(remove_train),
        )
        .route("/api/trains/:number/entry", post(request_entry))
        .route("/api/trains/:number/clearance", get(clearance))
        .route("/api/trains/:number/collision", post(report_collision))
        .route("/api/motion/poll", post(poll_motion))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Stations in display order with their control status.
async fn list_stations(State(state): State<AppState>) -> Json<Vec<StationSummary>> {
    Json(state.service.station_order())
}

async fn station_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StationStatus>, AppError> {
    Ok(Json(state.service.station_status(&id)?))
}

async fn list_players(State(state): State<AppState>) -> Json<Vec<Player>> {
    Json(state.service.active_players())
}

async fn list_trains(State(state): State<AppState>) -> Json<Vec<TrainState>> {
    Json(state.service.trains())
}

/// Register a train, or replace its record if already known.
async fn register_train(
    State(state): State<AppState>,
    Json(train): Json<Train>,
) -> (StatusCode, Json<RegisterTrainResponse>) {
    let created = state.service.register_train(train);
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    (status, Json(RegisterTrainResponse { created }))
}

async fn train_state(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<Json<TrainState>, AppError> {
    Ok(Json(state.service.train_state(&number)?))
}

async fn remove_train(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<Json<TrainState>, AppError> {
    state
        .service
        .remove_train(&number)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound {
            message: format!("unknown train {}", number.trim()),
        })
}

/// The simulation asks for a train to enter a section.
async fn request_entry(
    State(state): State<AppState>,
    Path(number): Path<String>,
    Json(req): Json<EntryRequest>,
) -> Result<Json<EntryResponse>, AppError> {
    let outcome = state.service.request_entry(&number, &req.from, &req.to)?;
    Ok(Json(EntryResponse { outcome }))
}

#[derive(Debug, Deserialize)]
struct ClearanceQuery {
    from: String,
    to: String,
}

#[derive(Debug, Serialize)]
struct ClearanceResponse {
    cleared: bool,
}

/// Whether the simulation may move a train into a section.
async fn clearance(
    State(state): State<AppState>,
    Path(number): Path<String>,
    Query(q): Query<ClearanceQuery>,
) -> Result<Json<ClearanceResponse>, AppError> {
    let cleared = state.service.may_enter(&number, &q.from, &q.to)?;
    Ok(Json(ClearanceResponse { cleared }))
}

async fn report_collision(
    State(state): State<AppState>,
    Path(number): Path<String>,
    Json(req): Json<CollisionRequest>,
) -> Result<Json<OutcomeResponse>, AppError> {
    let outcome = state
        .service
        .report_collision(&number, &req.other, &req.station)?;
    Ok(Json(OutcomeResponse { outcome }))
}

/// Hand every buffered motion command to the simulation.
async fn poll_motion(State(state): State<AppState>) -> Json<Vec<MotionCommand>> {
    Json(state.motion.take_all())
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    NotFound { message: String },
    Conflict { message: String },
    Forbidden { message: String },
}

impl From<CallError> for AppError {
    fn from(e: CallError) -> Self {
        let message = e.to_string();
        match e {
            CallError::InvalidStation(_) | CallError::InvalidIdentifier(_) => {
                AppError::BadRequest { message }
            }
            CallError::Control(ControlError::StationControlled { .. }) => {
                AppError::Conflict { message }
            }
            CallError::Handoff(HandoffError::UnknownStation(_))
            | CallError::Handoff(HandoffError::UnknownTrain(_)) => AppError::NotFound { message },
            CallError::Control(ControlError::NoStation(_))
            | CallError::Control(ControlError::NotController { .. }) => {
                AppError::Forbidden { message }
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message),
            AppError::Conflict { message } => (StatusCode::CONFLICT, message),
            AppError::Forbidden { message } => (StatusCode::FORBIDDEN, message),
        };

        warn!(%status, %message, "request refused");

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}
