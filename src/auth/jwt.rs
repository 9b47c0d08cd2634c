use std::time::Duration;

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use super::{acl::Role, dto::Claims};
use crate::config::JwtConfig;

/// Holds JWT signing and verification keys with config data. Built once per
/// process and shared through `AppState`.
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Option<Duration>,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: cfg
                .ttl_minutes
                .and_then(|minutes| u64::try_from(minutes).ok())
                .map(|minutes| Duration::from_secs(minutes.saturating_mul(60))),
        }
    }

    pub fn sign(&self, user_id: Uuid, role: Role) -> anyhow::Result<String> {
        let now = usize::try_from(OffsetDateTime::now_utc().unix_timestamp())?;
        let claims = Claims {
            sub: user_id,
            role,
            iat: now,
            exp: self.ttl.map(|ttl| {
                now.saturating_add(usize::try_from(ttl.as_secs()).unwrap_or(usize::MAX))
            }),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: Uuid::new_v4(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, role = ?role, "jwt signed");
        Ok(token)
    }

    /// Checks signature, issuer, audience and (when present) expiry.
    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.required_spec_claims.clear();
        if self.ttl.is_some() {
            validation.required_spec_claims.insert("exp".to_string());
        }
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}
