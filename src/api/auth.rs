// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential endpoints under `/api/auth`.
//!
//! These are public routes: the edge filter lets anonymous callers through,
//! and a successful call returns a freshly issued bearer token.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::{
    auth::{
        identity::{CredentialRecord, IdentityResolver},
        password::{hash_password, verify_password, DUMMY_PASSWORD_HASH},
        roles::{normalize_authorities, split_roles, Role},
        TokenCodec,
    },
    error::ApiError,
    state::AppState,
};

/// Shortest password accepted at sign-up.
pub const MIN_PASSWORD_LEN: usize = 8;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    /// Profile field, not stored by the edge
    #[serde(default)]
    pub first_name: Option<String>,
    /// Profile field, not stored by the edge
    #[serde(default)]
    pub last_name: Option<String>,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Bearer token issued at sign-up or sign-in.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    /// Canonical authorities, e.g. `ROLE_USER`
    pub roles: Vec<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LogoutResponse {
    pub message: String,
}

fn validate_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && !email.contains(char::is_whitespace) => {
            Ok(email.to_string())
        }
        _ => Err(ApiError::bad_request("A valid email address is required")),
    }
}

/// Hash a password off the async runtime.
async fn hash_blocking(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|_| ApiError::internal("Failed to process credentials"))?
        .map_err(ApiError::from)
}

async fn verify_blocking(hash: String, password: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || verify_password(&hash, &password))
        .await
        .map_err(|_| ApiError::internal("Failed to process credentials"))
}

/// Hash and store a new credential.
pub async fn register_credential(
    identities: &IdentityResolver,
    email: &str,
    password: &str,
    roles: &[Role],
) -> Result<CredentialRecord, ApiError> {
    let email = validate_email(email)?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let password_hash = hash_blocking(password.to_string()).await?;
    let authorities = roles.iter().map(|role| role.name().to_string()).collect();
    let record = CredentialRecord::new(email, password_hash, authorities);
    identities.register(record.clone()).await?;
    Ok(record)
}

fn issue_for(codec: &TokenCodec, record: &CredentialRecord) -> Result<AuthResponse, ApiError> {
    let issued = codec.issue(&record.email, record.fingerprint())?;
    Ok(AuthResponse {
        token: issued.token,
        roles: split_roles(&normalize_authorities(&record.authorities)),
        expires_at: issued.expires_at,
    })
}

#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignUpRequest,
    tag = "Auth",
    responses(
        (status = 200, body = AuthResponse),
        (status = 400, description = "Invalid email or password too short"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignUpRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let record = register_credential(
        state.auth.identities(),
        &request.email,
        &request.password,
        &[Role::User],
    )
    .await?;

    info!(user_id = %record.id, "registered new principal");
    Ok(Json(issue_for(state.auth.codec(), &record)?))
}

#[utoipa::path(
    post,
    path = "/api/auth/signin",
    request_body = SignInRequest,
    tag = "Auth",
    responses(
        (status = 200, body = AuthResponse),
        (status = 401, description = "Invalid email or password")
    )
)]
pub async fn signin(
    State(state): State<AppState>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let record = state.auth.identities().resolve(&request.email).await?;
    let hash = record
        .as_ref()
        .map_or_else(|| DUMMY_PASSWORD_HASH.to_string(), |r| r.password_hash.clone());
    let verified = verify_blocking(hash, request.password).await?;

    match record {
        Some(record) if verified => Ok(Json(issue_for(state.auth.codec(), &record)?)),
        Some(record) => {
            debug!(user_id = %record.id, "sign-in with wrong password");
            Err(ApiError::unauthorized(INVALID_CREDENTIALS))
        }
        None => {
            debug!("sign-in for unknown principal");
            Err(ApiError::unauthorized(INVALID_CREDENTIALS))
        }
    }
}

/// Tokens are stateless; logging out is the client discarding its token.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    responses((status = 200, body = LogoutResponse))
)]
pub async fn logout() -> (StatusCode, Json<LogoutResponse>) {
    (
        StatusCode::OK,
        Json(LogoutResponse {
            message: "Logout successful".to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::identity::InMemoryCredentialStore;
    use crate::auth::policy::RoutePolicy;
    use crate::proxy::Upstream;
    use std::{sync::Arc, time::Duration};
    use url::Url;

    const SECRET: &[u8] = b"auth-handler-secret-auth-handler!";

    fn state() -> (AppState, Arc<InMemoryCredentialStore>) {
        let store = Arc::new(InMemoryCredentialStore::new());
        let codec = TokenCodec::new(SECRET, Duration::from_secs(300)).unwrap();
        let upstream = Upstream::new(Url::parse("http://127.0.0.1:9").unwrap(), Duration::from_secs(1)).unwrap();
        let state = AppState::new(codec, store.clone(), RoutePolicy::public_routes([]), upstream);
        (state, store)
    }

    fn signup_request(email: &str, password: &str) -> SignUpRequest {
        SignUpRequest {
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn signup_registers_user_role_and_issues_live_token() {
        let (state, store) = state();
        let Json(response) = signup(State(state.clone()), Json(signup_request("Ada@Example.com", "correct horse")))
            .await
            .unwrap();

        assert_eq!(response.roles, vec!["ROLE_USER"]);
        assert_eq!(store.len().await, 1);

        let decoded = state.auth.codec().decode(&response.token).unwrap();
        let record = state.auth.identities().resolve(&decoded.subject).await.unwrap().unwrap();
        assert!(state.auth.codec().is_live(&decoded, record.fingerprint()));
        assert_ne!(record.password_hash, "correct horse");
    }

    #[tokio::test]
    async fn duplicate_signup_is_conflict() {
        let (state, _) = state();
        signup(State(state.clone()), Json(signup_request("a@b.com", "password1")))
            .await
            .unwrap();
        let err = signup(State(state), Json(signup_request("A@B.COM", "password2")))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn signup_validates_input() {
        let (state, store) = state();
        let err = signup(State(state.clone()), Json(signup_request("not-an-email", "password1")))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err = signup(State(state), Json(signup_request("a@b.com", "short")))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn signin_checks_password() {
        let (state, _) = state();
        signup(State(state.clone()), Json(signup_request("a@b.com", "password1")))
            .await
            .unwrap();

        let Json(ok) = signin(
            State(state.clone()),
            Json(SignInRequest {
                email: "a@b.com".to_string(),
                password: "password1".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(ok.roles, vec!["ROLE_USER"]);

        let err = signin(
            State(state.clone()),
            Json(SignInRequest {
                email: "a@b.com".to_string(),
                password: "password2".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);

        let err = signin(
            State(state),
            Json(SignInRequest {
                email: "nobody@b.com".to_string(),
                password: "password1".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.message, INVALID_CREDENTIALS);
    }

    #[tokio::test]
    async fn logout_acknowledges() {
        let (status, Json(body)) = logout().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.message, "Logout successful");
    }
}
