use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::AuthUser,
    error::ApiError,
    expressions::{
        dto::{CalculateRequest, CalculateResponse, ExpressionView},
        services::SubmitError,
    },
    state::AppState,
    storage::StoreError,
};

pub fn expression_routes() -> Router<AppState> {
    Router::new()
        .route("/calculate", post(calculate))
        .route("/expressions", get(list_expressions))
        .route("/expressions/:id", get(get_expression))
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Empty => ApiError::Unprocessable("Expression is required".into()),
            SubmitError::Invalid(e) => ApiError::Unprocessable(format!("Invalid expression: {e}")),
            // The token outlived its user, e.g. after a memory store restart.
            SubmitError::Store(StoreError::UserNotFound) => {
                ApiError::Unauthorized("Unknown user".into())
            }
            SubmitError::Store(e) => ApiError::internal(e),
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn calculate(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<CalculateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CalculateResponse>), ApiError> {
    let Json(payload) = payload?;
    let job = state
        .jobs
        .submit(user_id, &payload.expression)
        .await
        .inspect_err(|e| warn!(error = %e, "submission rejected"))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(CalculateResponse {
            id: job.id,
            status: job.status,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn list_expressions(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<ExpressionView>>, ApiError> {
    let jobs = state.jobs.list(user_id).await.map_err(ApiError::internal)?;
    Ok(Json(jobs.into_iter().map(ExpressionView::from).collect()))
}

#[instrument(skip(state, id))]
pub async fn get_expression(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<ExpressionView>, ApiError> {
    let Path(id) = id.map_err(|_| ApiError::BadRequest("Invalid expression id".into()))?;
    match state.jobs.get(user_id, id).await {
        Ok(job) => Ok(Json(job.into())),
        Err(StoreError::JobNotFound) => Err(ApiError::NotFound("Expression not found".into())),
        Err(e) => Err(ApiError::internal(e)),
    }
}
