// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Edge → backend wire contract.
//!
//! ## Deployment invariant
//!
//! Backends trust these headers without any cryptographic check. That is only
//! sound if (a) backends are reachable exclusively through the edge and
//! (b) the edge strips client-supplied copies of these headers from every
//! inbound request, which [`strip_trust_headers`] does.

use axum::http::{header::InvalidHeaderValue, HeaderMap, HeaderName, HeaderValue};

use super::context::Principal;

/// Principal's unique name.
pub const X_USER_EMAIL: HeaderName = HeaderName::from_static("x-user-email");
/// String form of the principal's stable identifier.
pub const X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");
/// Comma-separated canonical roles.
pub const X_USER_ROLES: HeaderName = HeaderName::from_static("x-user-roles");

pub const TRUST_HEADERS: [HeaderName; 3] = [X_USER_EMAIL, X_USER_ID, X_USER_ROLES];

/// Remove every copy of the trust headers.
pub fn strip_trust_headers(headers: &mut HeaderMap) {
    for name in TRUST_HEADERS {
        headers.remove(name);
    }
}

/// Write the trust headers for `principal`.
///
/// All three values are encoded before any header is touched; on error the
/// map is left unchanged.
pub fn inject_trust_headers(
    headers: &mut HeaderMap,
    principal: &Principal,
) -> Result<(), InvalidHeaderValue> {
    let email = HeaderValue::from_str(&principal.subject)?;
    let user_id = HeaderValue::from_str(&principal.user_id)?;
    let roles = HeaderValue::from_str(&principal.roles_header())?;

    headers.insert(X_USER_EMAIL, email);
    headers.insert(X_USER_ID, user_id);
    headers.insert(X_USER_ROLES, roles);
    Ok(())
}
