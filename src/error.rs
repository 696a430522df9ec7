// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::auth::identity::IdentityStoreError;
use crate::auth::password::PasswordError;
use crate::auth::token::TokenError;

/// Error returned by the edge's own handlers (sign-up, sign-in, proxy).
///
/// Authentication failures raised by the filter use
/// [`crate::auth::AuthError`] instead.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<IdentityStoreError> for ApiError {
    fn from(e: IdentityStoreError) -> Self {
        match e {
            IdentityStoreError::Duplicate(_) => Self::conflict("Email is already registered"),
            IdentityStoreError::NotFound(_) => Self::unauthorized("Invalid email or password"),
            IdentityStoreError::Unavailable(reason) => {
                error!(%reason, "identity store unavailable");
                Self::unavailable("Identity store unavailable")
            }
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(e: PasswordError) -> Self {
        error!(error = %e, "password hashing failed");
        Self::internal("Failed to process credentials")
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        error!(error = %e, "token issuance failed");
        Self::internal("Failed to issue token")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}
