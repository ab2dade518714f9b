use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use leaseflake::{Error, IdService, MemoryLeaseStore, SnowflakeId, WallClock};
use serde::{Deserialize, Serialize};

/// The service type this binary runs: the in-memory lease store on the
/// system clock.
pub type Service = IdService<MemoryLeaseStore, WallClock>;

#[derive(Clone)]
pub struct AppState {
    service: Arc<Service>,
    max_batch: usize,
}

impl AppState {
    pub fn new(service: Arc<Service>, max_batch: usize) -> Self {
        Self { service, max_batch }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/id", get(next_id))
        .route("/ids", get(next_ids))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Deserialize)]
struct BatchParams {
    count: Option<usize>,
}

/// IDs go out as strings so JavaScript clients keep every bit.
#[derive(Serialize)]
#[serde(transparent)]
struct DecimalId(#[serde(with = "leaseflake::as_decimal_string")] SnowflakeId);

async fn next_id(State(state): State<AppState>) -> Result<String, ApiError> {
    let id = state.service.next_id_async().await?;
    Ok(id.to_string())
}

async fn next_ids(
    State(state): State<AppState>,
    Query(params): Query<BatchParams>,
) -> Result<Json<Vec<DecimalId>>, ApiError> {
    let count = params.count.unwrap_or(1);
    if count == 0 || count > state.max_batch {
        return Err(ApiError::BadRequest(format!(
            "count must be between 1 and {}",
            state.max_batch
        )));
    }

    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        ids.push(DecimalId(state.service.next_id_async().await?));
    }
    Ok(Json(ids))
}

async fn health(State(state): State<AppState>) -> StatusCode {
    match state.service.generator().identity().check() {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    Id(Error),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Id(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            Self::Id(err) if err.is_fatal() => {
                tracing::error!("refusing id request: {err}");
                (StatusCode::SERVICE_UNAVAILABLE, err.to_string()).into_response()
            }
            Self::Id(err) => {
                tracing::warn!("id request failed, client may retry: {err}");
                let mut response =
                    (StatusCode::SERVICE_UNAVAILABLE, err.to_string()).into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
                response
            }
        }
    }
}
