use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{CredentialsRequest, RegisterResponse, TokenResponse},
        jwt::JwtKeys,
        password::{hash_password, verify_password},
    },
    error::ApiError,
    state::AppState,
    storage::StoreError,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Trims the login and rejects empty fields.
fn credentials(payload: CredentialsRequest) -> Result<(String, String), ApiError> {
    let login = payload.login.trim().to_string();
    if login.is_empty() || payload.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Login and password are required".into(),
        ));
    }
    Ok((login, payload.password))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let Json(payload) = payload?;
    let (login, password) = credentials(payload)?;

    // Argon2 runs on the blocking pool.
    let hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(ApiError::internal)?
        .map_err(ApiError::internal)?;

    match state.store.create_user(&login, &hash).await {
        Ok(user_id) => {
            info!(user_id, login = %login, "user registered");
            Ok((
                StatusCode::CREATED,
                Json(RegisterResponse { status: "success" }),
            ))
        }
        Err(StoreError::UserExists) => {
            warn!(login = %login, "login already registered");
            Err(ApiError::Conflict("User already exists".into()))
        }
        Err(e) => Err(ApiError::internal(e)),
    }
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(payload) = payload?;
    let (login, password) = credentials(payload)?;

    let user = match state.store.get_user_by_login(&login).await {
        Ok(user) => user,
        Err(StoreError::UserNotFound) => {
            warn!(login = %login, "login unknown user");
            return Err(ApiError::Unauthorized("Invalid credentials".into()));
        }
        Err(e) => return Err(ApiError::internal(e)),
    };

    let hash = user.password_hash.clone();
    let ok = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(ApiError::internal)?
        .map_err(ApiError::internal)?;

    if !ok {
        warn!(login = %login, user_id = user.id, "login invalid password");
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    let token = JwtKeys::from_ref(&state)
        .sign(user.id)
        .map_err(ApiError::internal)?;

    info!(user_id = user.id, "user logged in");
    Ok(Json(TokenResponse { token }))
}
