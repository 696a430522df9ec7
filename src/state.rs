// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::identity::{CredentialStore, IdentityResolver};
use crate::auth::{EdgeAuth, RoutePolicy, TokenCodec};
use crate::proxy::Upstream;

/// Shared state of the edge gateway.
#[derive(Clone)]
pub struct AppState {
    pub auth: EdgeAuth,
    pub upstream: Upstream,
}

impl AppState {
    pub fn new(
        codec: TokenCodec,
        store: Arc<dyn CredentialStore>,
        policy: RoutePolicy,
        upstream: Upstream,
    ) -> Self {
        Self {
            auth: EdgeAuth::new(Arc::new(codec), IdentityResolver::new(store), policy),
            upstream,
        }
    }
}
