use axum::{extract::State, routing::get, routing::post, Json, Router};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::{security, state::AppState};
use crate::repositories;
use crate::schemas::auth::{LoginRequest, TokenResponse, UserResponse};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/login", post(login)).route("/me", get(me))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = repositories::users::find_by_username(state.db(), &payload.username)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user"))?;

    let Some(user) = user else {
        return Err(ApiError::Unauthorized("Incorrect username or password"));
    };

    let verified = security::verify_password(&payload.password, &user.hashed_password)
        .map_err(|e| ApiError::internal(e, "Failed to verify password"))?;

    if !verified || !user.is_active {
        return Err(ApiError::Unauthorized("Incorrect username or password"));
    }

    let access_token = security::create_access_token(&user.id, state.settings(), None)
        .map_err(|e| ApiError::internal(e, "Failed to issue access token"))?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
        user: UserResponse::from(&user),
    }))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from(&user))
}
