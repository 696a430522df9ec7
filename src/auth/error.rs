// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! Every rejection produced by the auth core maps to 401 or 403; no other
//! status originates here.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Authentication / authorization error type.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Route requires an identity and none was presented
    #[error("Authentication is required for this route")]
    MissingCredentials,
    /// Bearer value failed to parse or its signature did not verify
    #[error("Token is malformed or its signature is invalid")]
    MalformedToken,
    /// Token subject has no credential record
    #[error("Token subject is not a known principal")]
    UnknownSubject,
    /// Token expired, or the credential changed since issuance
    #[error("Token is expired or no longer matches the current credentials")]
    StaleCredential,
    /// Credential store could not be reached while resolving the subject
    #[error("Identity could not be resolved")]
    IdentityUnavailable,
    /// Resolved identity cannot be encoded into the trusted headers
    #[error("Identity cannot be propagated")]
    InvalidIdentity,
    /// Request path has dot segments or backslashes
    #[error("Request path is not canonical")]
    UnsafePath,
    /// Authenticated, but none of the required roles are held
    #[error("Insufficient role for this operation")]
    InsufficientRole,
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => "missing_credentials",
            AuthError::MalformedToken => "malformed_token",
            AuthError::UnknownSubject => "unknown_subject",
            AuthError::StaleCredential => "stale_credential",
            AuthError::IdentityUnavailable => "identity_unavailable",
            AuthError::InvalidIdentity => "invalid_identity",
            AuthError::UnsafePath => "unsafe_path",
            AuthError::InsufficientRole => "insufficient_role",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InsufficientRole => StatusCode::FORBIDDEN,
            AuthError::MissingCredentials
            | AuthError::MalformedToken
            | AuthError::UnknownSubject
            | AuthError::StaleCredential
            | AuthError::IdentityUnavailable
            | AuthError::InvalidIdentity
            | AuthError::UnsafePath => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
