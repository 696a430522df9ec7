// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request-scoped security context.
//!
//! A [`SecurityContext`] is built once per request, either by the edge filter
//! from a verified token or by the downstream filter from trusted headers. It
//! lives in the request extensions and dies with the request.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;
use utoipa::ToSchema;

use super::roles::{normalize_authorities, split_roles, Role};

/// An authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Principal {
    /// Unique principal name (email)
    pub subject: String,
    /// String form of the stable identifier
    pub user_id: String,
    /// Authorities in wire form (`ROLE_<NAME>`)
    pub roles: Vec<String>,
}

impl Principal {
    /// Build a principal from raw store authorities, canonicalizing them.
    pub fn from_authorities<I, S>(subject: impl Into<String>, user_id: impl Into<String>, authorities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            subject: subject.into(),
            user_id: user_id.into(),
            roles: split_roles(&normalize_authorities(authorities)),
        }
    }

    /// Roles from the closed set that this principal holds.
    ///
    /// Authorities outside the set, or not in canonical form, are ignored.
    pub fn role_set(&self) -> HashSet<Role> {
        self.roles
            .iter()
            .filter_map(|authority| Role::from_authority(authority))
            .collect()
    }

    /// Set intersection test against a required role set.
    pub fn has_any_role(&self, required: &BTreeSet<Role>) -> bool {
        let held = self.role_set();
        required.iter().any(|role| held.contains(role))
    }

    /// The `X-User-Roles` header value.
    pub fn roles_header(&self) -> String {
        self.roles.join(",")
    }
}

/// Identity attached to a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SecurityContext {
    #[default]
    Anonymous,
    Authenticated(Principal),
}

impl SecurityContext {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            SecurityContext::Anonymous => None,
            SecurityContext::Authenticated(principal) => Some(principal),
        }
    }
}
