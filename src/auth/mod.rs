use crate::state::AppState;
use axum::Router;

pub mod acl;
mod dto;
pub mod handlers;
pub mod jwt;
pub(crate) mod middleware;
mod password;
pub mod repo;
pub mod repo_types;
pub mod services;

pub use middleware::require_bearer;

pub fn router(state: AppState) -> Router<AppState> {
    handlers::auth_routes(state)
}
