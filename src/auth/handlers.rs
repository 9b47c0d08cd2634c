use axum::{
    extract::{rejection::JsonRejection, State},
    middleware,
    routing::post,
    Extension, Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, SignupRequest},
        middleware::require_basic,
        password::hash_password,
        repo_types::User,
        services::{is_valid_username, issue_token, SignedIn},
    },
    error::{not_found, ApiError},
    state::AppState,
};

pub fn auth_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup).fallback(not_found))
        .route(
            "/signin",
            post(signin)
                .route_layer(middleware::from_fn_with_state(state, require_basic))
                .fallback(not_found),
        )
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(mut payload) = payload?;
    payload.username = payload.username.trim().to_string();

    if !is_valid_username(&payload.username) {
        warn!(username = %payload.username, "invalid username");
        return Err(ApiError::Validation("Invalid username".into()));
    }

    let hash = hash_password(&payload.password)?;

    // Ensure username is not taken
    if User::find_by_username(&state.db, &payload.username).await?.is_some() {
        warn!(username = %payload.username, "username already registered");
        return Err(ApiError::Conflict("Username already registered".into()));
    }

    let user = User::create(&state.db, &payload.username, &hash, payload.role)
        .await?
        .ok_or_else(|| ApiError::Conflict("Username already registered".into()))?;

    let token = issue_token(&state, &user).await?;

    info!(user_id = %user.id, username = %user.username, role = ?user.role, "user signed up");
    Ok(Json(AuthResponse::new(user, token)))
}

#[instrument(skip(signed_in))]
pub async fn signin(Extension(signed_in): Extension<SignedIn>) -> Json<AuthResponse> {
    let SignedIn { user, token } = signed_in;
    info!(user_id = %user.id, username = %user.username, "user signed in");
    Json(AuthResponse::new(user, token))
}
