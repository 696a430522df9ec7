// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for the request's principal.
//!
//! Reads the [`SecurityContext`] a middleware (edge or downstream) already
//! attached; it never looks at raw headers or tokens.
//!
//! ```rust,ignore
//! async fn my_handler(Auth(principal): Auth) -> impl IntoResponse {
//!     // principal.subject, principal.user_id, principal.roles
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use super::context::{Principal, SecurityContext};
use super::AuthError;

/// Extractor for an authenticated principal. Rejects with 401 otherwise.
pub struct Auth(pub Principal);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<SecurityContext>() {
            Some(SecurityContext::Authenticated(principal)) => Ok(Auth(principal.clone())),
            _ => Err(AuthError::MissingCredentials),
        }
    }
}
