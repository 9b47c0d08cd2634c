use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{acl::Role, password::check_password, repo_types::User};
use crate::{error::ApiError, state::AppState};

/// Identity resolved from a bearer token, attached to v2 requests.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

/// A successful Basic login together with the token it was issued.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub user: User,
    pub token: String,
}

/// Usernames may not contain `:` (it separates Basic credentials) or whitespace.
pub(crate) fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[^:\s]{1,64}$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

/// Signs a token for `user` and stores it as the user's only valid token.
pub async fn issue_token(state: &AppState, user: &User) -> anyhow::Result<String> {
    let token = state.jwt.sign(user.id, user.role)?;
    User::set_token(&state.db, user.id, &token).await?;
    debug!(user_id = %user.id, "token issued");
    Ok(token)
}

/// Resolves a bearer token to the user it was last issued to.
pub async fn verify_token(state: &AppState, token: &str) -> Result<Identity, ApiError> {
    let claims = state.jwt.verify(token).map_err(|e| {
        warn!(error = %e, "invalid token");
        ApiError::unauthorized("Invalid or expired token")
    })?;

    let user = User::find_by_id(&state.db, claims.sub).await?.ok_or_else(|| {
        warn!(user_id = %claims.sub, "token for unknown user");
        ApiError::unauthorized("Invalid or expired token")
    })?;

    if user.token.as_deref() != Some(token) {
        warn!(user_id = %user.id, "superseded token");
        return Err(ApiError::unauthorized("Token is no longer valid"));
    }

    Ok(Identity {
        id: user.id,
        username: user.username,
        role: user.role,
    })
}

/// Checks a username/password pair and issues a fresh token on success.
pub async fn sign_in(state: &AppState, username: &str, password: &str) -> Result<SignedIn, ApiError> {
    let user = match User::find_by_username(&state.db, username).await? {
        Some(u) => u,
        None => {
            warn!(username = %username, "signin unknown username");
            return Err(ApiError::unauthorized("Invalid credentials"));
        }
    };

    if !check_password(&user, password) {
        warn!(user_id = %user.id, "signin invalid password");
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let token = issue_token(state, &user).await?;
    Ok(SignedIn { user, token })
}
