//! Admin credential verification
//!
//! Credentials are HS256 JWTs presented as `Authorization: Bearer <token>`.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::audit::entry::Actor;
use crate::config::AuthConfig;

/// Claims carried by an operator credential
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Principal id
    pub sub: String,
    /// Display name
    pub name: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// Authorization refusal. Deliberately carries no reason.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("access denied")]
pub struct Denied;

/// Operator identity proven by the gate, passed explicitly to every
/// query and retraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminPrincipal {
    pub id: String,
    pub display_name: String,
    pub role: String,
}

impl AdminPrincipal {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            role: role.into(),
        }
    }

    /// Audit actor for actions this operator performs
    pub fn as_actor(&self) -> Actor {
        Actor::new(self.id.clone(), self.display_name.clone()).with_role(self.role.clone())
    }
}

#[derive(Clone)]
pub struct AccessGate {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    admin_roles: Vec<String>,
}

impl AccessGate {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.issuer.clone(),
            admin_roles: config.admin_roles.clone(),
        }
    }

    /// Resolve a raw `Authorization` header value to an admin principal.
    ///
    /// Missing, malformed, expired, forged and non-admin credentials all
    /// yield the same `Denied`. The gate has no side effects.
    pub fn authorize(&self, credential: Option<&str>) -> Result<AdminPrincipal, Denied> {
        let header = credential.ok_or_else(|| {
            debug!("Access denied: no credential");
            Denied
        })?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                debug!("Access denied: credential is not a bearer token");
                Denied
            })?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| {
                debug!("Access denied: {}", e);
                Denied
            })?
            .claims;

        if claims.sub.trim().is_empty() {
            debug!("Access denied: empty subject");
            return Err(Denied);
        }

        if !self.admin_roles.iter().any(|r| r == &claims.role) {
            debug!("Access denied: role {} is not administrative", claims.role);
            return Err(Denied);
        }

        Ok(AdminPrincipal {
            id: claims.sub,
            display_name: claims.name,
            role: claims.role,
        })
    }

    /// Mint a credential for `principal` valid for `ttl`
    pub fn issue_token(
        &self,
        principal: &AdminPrincipal,
        ttl: Duration,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: principal.id.clone(),
            name: principal.display_name.clone(),
            role: principal.role.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            iss: self.issuer.clone(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_config(secret: &str) -> AuthConfig {
        AuthConfig {
            jwt_secret: secret.to_string(),
            issuer: "audit-trail".to_string(),
            admin_roles: vec!["admin".to_string()],
        }
    }

    fn gate() -> AccessGate {
        AccessGate::new(&auth_config("test-secret-that-is-long-enough-123456"))
    }

    fn bearer(token: &str) -> String {
        format!("Bearer {}", token)
    }

    #[test]
    fn test_admin_token_is_authorized() {
        let gate = gate();
        let admin = AdminPrincipal::new("admin-1", "Ada", "admin");
        let token = gate.issue_token(&admin, Duration::minutes(10)).unwrap();

        let principal = gate.authorize(Some(&bearer(&token))).unwrap();
        assert_eq!(principal, admin);
    }

    #[test]
    fn test_denials_are_uniform() {
        let gate = gate();
        let student = AdminPrincipal::new("u-7", "Sam", "student");
        let admin = AdminPrincipal::new("admin-1", "Ada", "admin");

        let wrong_role = gate.issue_token(&student, Duration::minutes(10)).unwrap();
        let expired = gate.issue_token(&admin, Duration::minutes(-10)).unwrap();
        let forged = AccessGate::new(&auth_config("another-secret-that-is-long-enough-xx"))
            .issue_token(&admin, Duration::minutes(10))
            .unwrap();

        let cases = [
            None,
            Some("".to_string()),
            Some("fake_token".to_string()),
            Some(bearer("fake_token")),
            Some(bearer("")),
            Some(format!("Basic {}", wrong_role)),
            Some(bearer(&wrong_role)),
            Some(bearer(&expired)),
            Some(bearer(&forged)),
        ];

        for credential in cases {
            assert_eq!(gate.authorize(credential.as_deref()), Err(Denied));
        }
    }

    #[test]
    fn test_authorize_is_idempotent() {
        let gate = gate();
        let admin = AdminPrincipal::new("admin-1", "Ada", "admin");
        let header = bearer(&gate.issue_token(&admin, Duration::minutes(10)).unwrap());

        assert_eq!(gate.authorize(Some(&header)), gate.authorize(Some(&header)));
    }

    #[test]
    fn test_principal_as_actor() {
        let actor = AdminPrincipal::new("admin-1", "Ada", "admin").as_actor();
        assert_eq!(actor.id, "admin-1");
        assert_eq!(actor.role.as_deref(), Some("admin"));
    }
}
