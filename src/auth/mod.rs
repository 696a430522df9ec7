// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Edge authentication and trusted-header identity propagation.
//!
//! ## Auth Flow
//!
//! 1. Client signs in at the edge and receives an HS256 bearer token
//! 2. Client sends `Authorization: Bearer <token>`
//! 3. Edge:
//!    - Verifies signature (`token`)
//!    - Loads the current credential record (`identity`)
//!    - Checks expiry and the fingerprint binding (`token`)
//!    - Canonicalizes roles (`roles`) and injects `X-User-Email`,
//!      `X-User-Id`, `X-User-Roles` (`headers`)
//! 4. Backend rebuilds the security context from those headers only
//!    (`downstream`) and applies its route table (`policy`)
//!
//! ## Security
//!
//! - Tokens issued before a password change stop validating
//! - Client-supplied `X-User-*` headers are stripped at the edge
//! - Backends must be unreachable except through the edge
//! - Identity failures yield 401, role failures 403

pub mod context;
pub mod downstream;
pub mod error;
pub mod extractor;
pub mod headers;
pub mod identity;
pub mod middleware;
pub mod password;
pub mod policy;
pub mod roles;
pub mod token;

pub use context::{Principal, SecurityContext};
pub use error::AuthError;
pub use extractor::Auth;
pub use identity::{CredentialRecord, CredentialStore, IdentityResolver, InMemoryCredentialStore};
pub use middleware::{edge_auth, EdgeAuth, EdgeOutcome};
pub use policy::{Access, RoutePolicy};
pub use roles::Role;
pub use token::TokenCodec;
