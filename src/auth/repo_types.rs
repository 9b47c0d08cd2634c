use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::acl::Role;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,                     // unique user ID
    pub username: String,             // unique login name
    #[serde(skip_serializing)]
    pub password_hash: String,        // Argon2 hash, not exposed in JSON
    pub role: Role,                   // access-control tag
    #[serde(skip_serializing)]
    pub token: Option<String>,        // last issued bearer token
}
