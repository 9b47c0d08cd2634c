use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use base64ct::{Base64, Encoding};
use tracing::{debug, warn};

use super::{
    acl::Capability,
    services::{sign_in, verify_token},
};
use crate::{error::ApiError, state::AppState};

/// Credentials carried by an `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic { username: String, password: String },
    Bearer(String),
}

impl Credentials {
    /// `Ok(None)` when the header is absent.
    pub fn from_headers(headers: &HeaderMap) -> Result<Option<Self>, ApiError> {
        let Some(value) = headers.get(AUTHORIZATION) else {
            return Ok(None);
        };
        let value = value
            .to_str()
            .map_err(|_| ApiError::unauthorized("Invalid Authorization header"))?;
        Self::parse(value).map(Some)
    }

    pub fn parse(value: &str) -> Result<Self, ApiError> {
        let (scheme, rest) = value
            .trim()
            .split_once(' ')
            .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header"))?;
        let rest = rest.trim();

        if scheme.eq_ignore_ascii_case("basic") {
            let decoded = Base64::decode_vec(rest)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
                .ok_or_else(|| ApiError::unauthorized("Malformed basic credentials"))?;
            let (username, password) = decoded
                .split_once(':')
                .ok_or_else(|| ApiError::unauthorized("Malformed basic credentials"))?;
            Ok(Credentials::Basic {
                username: username.to_string(),
                password: password.to_string(),
            })
        } else if scheme.eq_ignore_ascii_case("bearer") && !rest.is_empty() {
            Ok(Credentials::Bearer(rest.to_string()))
        } else {
            Err(ApiError::unauthorized("Unsupported authorization scheme"))
        }
    }
}

/// Guards signin: requires Basic credentials and attaches the signed-in user.
pub async fn require_basic(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (username, password) = match Credentials::from_headers(req.headers())? {
        Some(Credentials::Basic { username, password }) => (username, password),
        Some(Credentials::Bearer(_)) => {
            return Err(ApiError::unauthorized("Basic credentials required"))
        }
        None => return Err(ApiError::unauthorized("Missing Authorization header")),
    };

    let signed_in = sign_in(&state, &username, &password).await?;
    req.extensions_mut().insert(signed_in);
    Ok(next.run(req).await)
}

/// Guards v2 routes: requires a current bearer token whose role allows the method.
pub async fn require_bearer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = match Credentials::from_headers(req.headers())? {
        Some(Credentials::Bearer(token)) => token,
        Some(Credentials::Basic { .. }) => {
            return Err(ApiError::unauthorized("Bearer token required"))
        }
        None => return Err(ApiError::unauthorized("Missing Authorization header")),
    };

    let identity = verify_token(&state, &token).await?;
    let needed = Capability::for_method(req.method());
    if !identity.role.can(needed) {
        warn!(user_id = %identity.id, role = ?identity.role, capability = ?needed, "access denied");
        return Err(ApiError::Forbidden(format!(
            "Role lacks the {needed:?} capability"
        )));
    }

    debug!(user_id = %identity.id, username = %identity.username, capability = ?needed, "access granted");
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
