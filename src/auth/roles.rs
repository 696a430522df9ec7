// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Roles and authority canonicalization.
//!
//! The credential store keeps raw authority strings (`USER`, `ROLE_ADMIN`,
//! ...). Before they cross the trust boundary they are rewritten into the
//! canonical `ROLE_<NAME>` form and joined into a single CSV header value.

use std::collections::HashSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

/// Prefix carried by every canonical authority.
pub const ROLE_PREFIX: &str = "ROLE_";

/// Closed set of roles recognised by route policies.
///
/// - `Admin` - moderation: deletes, draft approval
/// - `User` - registered member: create, favourite, submit drafts
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    /// Bare role name (`ADMIN`, `USER`).
    pub fn name(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
        }
    }

    /// Canonical authority string (`ROLE_ADMIN`, `ROLE_USER`).
    pub fn authority(&self) -> String {
        format!("{ROLE_PREFIX}{}", self.name())
    }

    /// Map a canonical authority back to a role.
    ///
    /// Only the exact `ROLE_<NAME>` form is accepted; a bare `ADMIN` arriving
    /// through the trusted headers grants nothing.
    pub fn from_authority(authority: &str) -> Option<Role> {
        match authority.strip_prefix(ROLE_PREFIX)? {
            "ADMIN" => Some(Role::Admin),
            "USER" => Some(Role::User),
            _ => None,
        }
    }
}

impl FromStr for Role {
    type Err = String;

    /// Case-insensitive parse of a bare or prefixed role name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let name = upper.strip_prefix(ROLE_PREFIX).unwrap_or(&upper);
        match name {
            "ADMIN" => Ok(Role::Admin),
            "USER" => Ok(Role::User),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether an authority can travel inside the roles CSV header unchanged.
fn is_header_safe(authority: &str) -> bool {
    authority.bytes().all(|b| b.is_ascii_graphic() && b != b',')
}

/// Canonicalize raw authorities into the `X-User-Roles` wire form.
///
/// Entries are trimmed and prefixed with [`ROLE_PREFIX`] unless they already
/// carry it, then joined with commas in insertion order. Empty entries and
/// repeats are dropped. Entries that could not survive the CSV encoding
/// (commas, whitespace, control or non-ASCII bytes) are discarded rather than
/// risk being split into extra roles downstream.
///
/// Empty input yields an empty string. The result is a fixed point:
/// `normalize_authorities(split_roles(&s)) == s` for any `s` this returns.
pub fn normalize_authorities<I, S>(raw: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut canonical: Vec<String> = Vec::new();

    for entry in raw {
        let entry = entry.as_ref().trim();
        if entry.is_empty() {
            continue;
        }
        if !is_header_safe(entry) {
            warn!(authority = %entry.escape_debug(), "dropping authority that is not header-safe");
            continue;
        }

        let authority = if entry.starts_with(ROLE_PREFIX) {
            entry.to_string()
        } else {
            format!("{ROLE_PREFIX}{entry}")
        };

        if seen.insert(authority.clone()) {
            canonical.push(authority);
        }
    }

    canonical.join(",")
}

/// Split a roles CSV into its entries, verbatim. Empty entries are skipped.
pub fn split_roles(csv: &str) -> Vec<String> {
    csv.split(',')
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}
