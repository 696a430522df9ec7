// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP surface of the edge.
//!
//! Health probes and the API docs are served outside the auth filter.
//! Everything else (the credential endpoints, `/api/users/me` and the
//! reverse-proxy fallback) runs behind [`edge_auth`].

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::{auth::edge_auth, auth::Principal, proxy, state::AppState};

pub mod auth;
pub mod health;
pub mod users;

pub fn router(state: AppState) -> Router {
    let edge = Router::new()
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/signin", post(auth::signin))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/users/me", get(users::me))
        .fallback(proxy::forward)
        .layer(middleware::from_fn_with_state(state.auth.clone(), edge_auth))
        .with_state(state.clone());

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .fallback_service(edge)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    paths(
        auth::signup,
        auth::signin,
        auth::logout,
        users::me,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            auth::SignUpRequest,
            auth::SignInRequest,
            auth::AuthResponse,
            auth::LogoutResponse,
            Principal,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Auth", description = "Sign-up, sign-in and logout"),
        (name = "Users", description = "Caller identity"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;
