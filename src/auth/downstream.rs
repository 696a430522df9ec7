// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Backend-side identity reconstruction.
//!
//! Internal services never see a bearer token. They rebuild the
//! [`SecurityContext`] from the `X-User-*` headers the edge injected, with no
//! signature check and no re-normalization. See [`super::headers`] for the
//! deployment invariant this depends on.
//!
//! ```rust,ignore
//! let app = protect(
//!     Router::new().route("/api/dish", post(create_dish)),
//!     backend_policy()?,
//! );
//! ```

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, Method},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use tracing::debug;

use super::context::{Principal, SecurityContext};
use super::headers::{X_USER_EMAIL, X_USER_ID, X_USER_ROLES};
use super::policy::{PolicyError, RoutePolicy};
use super::roles::{split_roles, Role};

fn header_str<'a>(headers: &'a HeaderMap, name: &axum::http::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Build a context from trusted headers alone.
///
/// A present, non-empty `X-User-Email` yields an authenticated context whose
/// roles are the verbatim comma-split `X-User-Roles`; anything else is
/// anonymous.
pub fn context_from_headers(headers: &HeaderMap) -> SecurityContext {
    let subject = match header_str(headers, &X_USER_EMAIL) {
        Some(subject) if !subject.is_empty() => subject,
        _ => return SecurityContext::Anonymous,
    };

    SecurityContext::Authenticated(Principal {
        subject: subject.to_string(),
        user_id: header_str(headers, &X_USER_ID).unwrap_or_default().to_string(),
        roles: header_str(headers, &X_USER_ROLES)
            .map(split_roles)
            .unwrap_or_default(),
    })
}

/// Middleware attaching the header-derived [`SecurityContext`] to the request.
pub async fn trust_headers(mut request: Request, next: Next) -> Response {
    let context = context_from_headers(request.headers());
    request.extensions_mut().insert(context);
    next.run(request).await
}

/// Middleware enforcing a [`RoutePolicy`] against the request's context.
///
/// Must run after [`trust_headers`]; a request without a context is treated
/// as anonymous.
pub async fn enforce_access(
    State(policy): State<Arc<RoutePolicy>>,
    request: Request,
    next: Next,
) -> Response {
    let context = request
        .extensions()
        .get::<SecurityContext>()
        .cloned()
        .unwrap_or_default();

    if let Err(e) = policy.evaluate(request.method(), request.uri().path(), &context) {
        debug!(
            method = %request.method(),
            path = %request.uri().path(),
            error_code = e.error_code(),
            "access denied"
        );
        return e.into_response();
    }

    next.run(request).await
}

/// Wrap a backend router with header trust and the route policy.
pub fn protect(router: Router, policy: RoutePolicy) -> Router {
    router
        .layer(middleware::from_fn_with_state(Arc::new(policy), enforce_access))
        .layer(middleware::from_fn(trust_headers))
}

/// Role table of the food-rating backend.
///
/// Listings are public; creating, favouriting and editing need ADMIN or USER;
/// deletes and draft approval need ADMIN; draft restaurant submission is a
/// USER action. Specific routes are listed before the `{param}` routes they
/// would otherwise be shadowed by.
pub fn backend_policy() -> Result<RoutePolicy, PolicyError> {
    let member = [Role::Admin, Role::User];
    let admin = [Role::Admin];

    RoutePolicy::builder()
        .public(Some(Method::GET), "/api/city")
        // dishes
        .any_role(Some(Method::POST), "/api/dish", member)
        .any_role(Some(Method::POST), "/api/dish/favourite/{dishId}", member)
        .any_role(Some(Method::POST), "/api/dish/unFavourite/{dishId}", member)
        .any_role(Some(Method::GET), "/api/dish/favourites/{city}", member)
        .any_role(Some(Method::PUT), "/api/updateDish", member)
        .any_role(Some(Method::GET), "/api/dish/draft", member)
        .any_role(Some(Method::DELETE), "/api/dish/draft/{id}", member)
        .any_role(Some(Method::PUT), "/api/dish/draft/{id}", admin)
        .any_role(Some(Method::DELETE), "/api/dish/{dishId}", admin)
        .public(Some(Method::GET), "/api/dish/{city}")
        // restaurants
        .any_role(Some(Method::POST), "/api/restaurant", member)
        .any_role(Some(Method::POST), "/api/restaurant/draft", [Role::User])
        .any_role(Some(Method::POST), "/api/restaurant/favourite/{restaurantId}", member)
        .any_role(Some(Method::POST), "/api/restaurant/unFavourite/{restaurantId}", member)
        .any_role(Some(Method::GET), "/api/restaurant/favourites/{city}", member)
        .any_role(Some(Method::PUT), "/api/updateRestaurant", member)
        .any_role(Some(Method::GET), "/api/restaurant/draft", member)
        .any_role(Some(Method::DELETE), "/api/restaurant/draft/{id}", member)
        .any_role(Some(Method::PUT), "/api/restaurant/draft/{id}", admin)
        .any_role(Some(Method::DELETE), "/api/restaurant/{restaurantId}", admin)
        .public(Some(Method::GET), "/api/restaurant/{city}")
        .build()
}
