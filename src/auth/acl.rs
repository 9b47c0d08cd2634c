use axum::http::Method;
use serde::{Deserialize, Serialize};

/// Access-control tag stored on every user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Read,
    Create,
    Update,
    Delete,
}

impl Capability {
    /// Capability needed to call a resource route with this method.
    pub fn for_method(method: &Method) -> Self {
        match *method {
            Method::POST => Capability::Create,
            Method::PUT | Method::PATCH => Capability::Update,
            Method::DELETE => Capability::Delete,
            _ => Capability::Read,
        }
    }
}

impl Role {
    pub fn capabilities(self) -> &'static [Capability] {
        match self {
            Role::Admin => &[
                Capability::Read,
                Capability::Create,
                Capability::Update,
                Capability::Delete,
            ],
            Role::User => &[Capability::Read],
        }
    }

    pub fn can(self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}
