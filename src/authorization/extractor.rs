//! Admin principal extractor
//!
//! Handlers that take an [`AdminPrincipal`] argument are only reached with a
//! credential the Access Gate accepted; everything else is rejected with 401.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use super::{AccessGate, AdminPrincipal};
use crate::error::AuditError;

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminPrincipal
where
    AccessGate: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuditError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let gate = AccessGate::from_ref(state);
        let credential = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        gate.authorize(credential).map_err(|_| {
            warn!(uri = %parts.uri, "Rejected audit request without admin credential");
            AuditError::Unauthorized
        })
    }
}
