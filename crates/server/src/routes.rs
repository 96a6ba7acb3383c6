use std::time::Duration;

use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::http::{StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use qed_core::CoachRequest;
use qed_core::advisor::{
    AdvisorError, CritiqueRequest, CritiqueResponse, PlanResponse,
    PlannerRequest,
};
use qed_core::emitter::{Emitter, ErrorBody, ResponseStart};
use qed_core::event::StreamEvent;
use qed_core::visualize::VisualizeRequest;
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::StreamExt as _;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Comment frames are written this often while an orchestrator is busy.
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

type ApiError = (StatusCode, Json<ErrorBody>);

/// Builds the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/coach", post(coach).fallback(method_not_allowed))
        .route("/api/visualize", post(visualize).fallback(method_not_allowed))
        .route("/api/critique", post(critique).fallback(method_not_allowed))
        .route("/api/planner", post(planner).fallback(method_not_allowed))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn method_not_allowed() -> ApiError {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ErrorBody::new(
            "Method not allowed",
            "Only POST requests are allowed",
        )),
    )
}

async fn coach(
    State(state): State<AppState>,
    payload: Result<Json<CoachRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return invalid_json(rejection).into_response(),
    };
    let (emitter, head_rx) = Emitter::new();
    tokio::spawn(async move { state.coach.handle(req, emitter).await });
    respond(head_rx).await
}

async fn visualize(
    State(state): State<AppState>,
    payload: Result<Json<VisualizeRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return invalid_json(rejection).into_response(),
    };
    let (emitter, head_rx) = Emitter::new();
    tokio::spawn(async move { state.visualizer.handle(req, emitter).await });
    respond(head_rx).await
}

async fn critique(
    State(state): State<AppState>,
    payload: Result<Json<CritiqueRequest>, JsonRejection>,
) -> Result<Json<CritiqueResponse>, ApiError> {
    let Json(req) = payload.map_err(invalid_json)?;
    state
        .advisor
        .critique(req)
        .await
        .map(Json)
        .map_err(advisor_error)
}

async fn planner(
    State(state): State<AppState>,
    payload: Result<Json<PlannerRequest>, JsonRejection>,
) -> Result<Json<PlanResponse>, ApiError> {
    let Json(req) = payload.map_err(invalid_json)?;
    state.advisor.plan(req).await.map(Json).map_err(advisor_error)
}

fn invalid_json(rejection: JsonRejection) -> ApiError {
    debug!("rejected request body: {rejection}");
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody::new("Invalid request", rejection.body_text())),
    )
}

fn advisor_error(err: AdvisorError) -> ApiError {
    match err {
        AdvisorError::InvalidRequest(reason) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody::new("Invalid request", reason)),
        ),
        AdvisorError::Model(err) => {
            error!("advisor failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody::new("An error occurred", err.message())),
            )
        }
    }
}

/// Waits for the orchestrator to commit to a response shape.
async fn respond(head_rx: oneshot::Receiver<ResponseStart>) -> Response {
    match head_rx.await {
        Ok(ResponseStart::Stream(event_rx)) => event_stream(event_rx),
        Ok(ResponseStart::Error { status, body }) => {
            let status = StatusCode::from_u16(status)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(body)).into_response()
        }
        Err(_) => {
            error!("request task ended without a response");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody::new(
                    "An error occurred",
                    "Request ended without a response",
                )),
            )
                .into_response()
        }
    }
}

fn event_stream(event_rx: mpsc::Receiver<StreamEvent>) -> Response {
    let events = ReceiverStream::new(event_rx)
        .map(|event| Event::default().json_data(event));
    let sse = Sse::new(events)
        .keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL));
    ([(header::CONNECTION, "keep-alive")], sse).into_response()
}
