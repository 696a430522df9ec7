// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Edge authentication middleware.
//!
//! Runs in front of everything the edge serves or forwards. Per request:
//!
//! 1. Strip client-supplied trust headers; refuse paths with dot segments.
//! 2. No `Authorization: Bearer` → [`EdgeOutcome::NoToken`], anonymous.
//! 3. Token fails to decode → [`EdgeOutcome::Malformed`], 401.
//! 4. Subject has no credential record → [`EdgeOutcome::UnknownSubject`], 401.
//! 5. Expired or fingerprint mismatch → [`EdgeOutcome::Stale`], 401.
//! 6. Otherwise → [`EdgeOutcome::Authenticated`]: inject `X-User-*`, drop the
//!    bearer value, attach the [`SecurityContext`] to the request.
//!
//! The route policy is then evaluated against the resulting context, so an
//! anonymous request only passes on allow-listed routes. Every step is
//! one-shot; nothing is retried and nothing survives the request. Headers
//! are only mutated once every check has passed.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error, warn};

use super::context::{Principal, SecurityContext};
use super::error::AuthError;
use super::headers::{inject_trust_headers, strip_trust_headers};
use super::identity::IdentityResolver;
use super::policy::{is_canonical_path, RoutePolicy};
use super::token::TokenCodec;

const BEARER_PREFIX: &str = "Bearer ";

/// Terminal state of the edge decision for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeOutcome {
    NoToken,
    Malformed,
    UnknownSubject,
    /// Credential store failed while resolving the subject
    IdentityUnavailable,
    Stale,
    Authenticated(Principal),
}

impl EdgeOutcome {
    /// Split into the request context, or the rejection to send.
    pub fn into_context(self) -> Result<SecurityContext, AuthError> {
        match self {
            EdgeOutcome::NoToken => Ok(SecurityContext::Anonymous),
            EdgeOutcome::Authenticated(principal) => Ok(SecurityContext::Authenticated(principal)),
            EdgeOutcome::Malformed => Err(AuthError::MalformedToken),
            EdgeOutcome::UnknownSubject => Err(AuthError::UnknownSubject),
            EdgeOutcome::IdentityUnavailable => Err(AuthError::IdentityUnavailable),
            EdgeOutcome::Stale => Err(AuthError::StaleCredential),
        }
    }
}

/// Everything the edge filter needs. Cheap to clone.
#[derive(Clone)]
pub struct EdgeAuth {
    codec: Arc<TokenCodec>,
    identities: IdentityResolver,
    policy: Arc<RoutePolicy>,
}

impl EdgeAuth {
    pub fn new(codec: Arc<TokenCodec>, identities: IdentityResolver, policy: RoutePolicy) -> Self {
        Self {
            codec,
            identities,
            policy: Arc::new(policy),
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn identities(&self) -> &IdentityResolver {
        &self.identities
    }

    pub fn policy(&self) -> &RoutePolicy {
        &self.policy
    }

    /// Run the token → identity decision for a set of request headers.
    pub async fn authenticate(&self, headers: &HeaderMap) -> EdgeOutcome {
        let Some(raw) = bearer_token(headers) else {
            return EdgeOutcome::NoToken;
        };

        let decoded = match self.codec.decode(raw) {
            Ok(decoded) => decoded,
            Err(_) => {
                debug!("rejected bearer token that failed to decode");
                return EdgeOutcome::Malformed;
            }
        };

        let record = match self.identities.resolve(&decoded.subject).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("rejected token for unknown subject");
                return EdgeOutcome::UnknownSubject;
            }
            Err(e) => {
                error!(error = %e, "identity store failed during token validation");
                return EdgeOutcome::IdentityUnavailable;
            }
        };

        if !self.codec.is_live(&decoded, record.fingerprint()) {
            warn!(user_id = %record.id, "rejected expired or superseded token");
            return EdgeOutcome::Stale;
        }

        EdgeOutcome::Authenticated(Principal::from_authorities(
            record.email,
            record.id.to_string(),
            &record.authorities,
        ))
    }
}

/// Extract the bearer value. Missing header, non-UTF-8 value, or another
/// scheme all count as "no token".
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix(BEARER_PREFIX)
}

/// Edge authentication middleware.
///
/// ```rust,ignore
/// let app = Router::new()
///     .fallback(proxy::forward)
///     .layer(axum::middleware::from_fn_with_state(edge.clone(), edge_auth));
/// ```
pub async fn edge_auth(
    State(auth): State<EdgeAuth>,
    mut request: Request,
    next: Next,
) -> Response {
    strip_trust_headers(request.headers_mut());

    // Policy and proxy must see the same segments.
    if !is_canonical_path(request.uri().path()) {
        debug!(path = %request.uri().path(), "rejected non-canonical path");
        return AuthError::UnsafePath.into_response();
    }

    let context = match auth.authenticate(request.headers()).await.into_context() {
        Ok(context) => context,
        Err(e) => return e.into_response(),
    };

    if let Err(e) = auth
        .policy
        .evaluate(request.method(), request.uri().path(), &context)
    {
        debug!(
            method = %request.method(),
            path = %request.uri().path(),
            error_code = e.error_code(),
            "edge policy rejected request"
        );
        return e.into_response();
    }

    if let SecurityContext::Authenticated(principal) = &context {
        if inject_trust_headers(request.headers_mut(), principal).is_err() {
            warn!(user_id = %principal.user_id, "identity not representable as trust headers");
            return AuthError::InvalidIdentity.into_response();
        }
        request.headers_mut().remove(AUTHORIZATION);
    }

    request.extensions_mut().insert(context);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::headers::{X_USER_EMAIL, X_USER_ID, X_USER_ROLES};
    use crate::auth::identity::{CredentialRecord, CredentialStore, IdentityStoreError, InMemoryCredentialStore};
    use crate::auth::policy::parse_route_list;
    use async_trait::async_trait;
    use axum::{body::Body, http::{HeaderName, StatusCode}, Router};
    use std::time::Duration;
    use tower::ServiceExt;

    const SECRET: &[u8] = b"edge-test-secret-edge-test-secret";

    struct Fixture {
        edge: EdgeAuth,
        store: Arc<InMemoryCredentialStore>,
        record: CredentialRecord,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryCredentialStore::new());
        let record = CredentialRecord::new("a@b.com", "fp-1", vec!["ADMIN".to_string()]);
        store.insert(record.clone()).await.unwrap();

        let codec = Arc::new(TokenCodec::new(SECRET, Duration::from_secs(600)).unwrap());
        let policy = RoutePolicy::public_routes(parse_route_list("/api/auth/**, GET /api/city").unwrap());
        let edge = EdgeAuth::new(codec, IdentityResolver::new(store.clone()), policy);
        Fixture { edge, store, record }
    }

    /// Router whose downstream echoes the trust headers it received.
    fn app(edge: EdgeAuth) -> Router {
        Router::new()
            .fallback(|headers: HeaderMap| async move {
                let get = |name: HeaderName| {
                    headers
                        .get(name)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string()
                };
                format!(
                    "{}|{}|{}|{}",
                    get(X_USER_EMAIL),
                    get(X_USER_ID),
                    get(X_USER_ROLES),
                    get(AUTHORIZATION)
                )
            })
            .layer(axum::middleware::from_fn_with_state(edge, edge_auth))
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, format!("Bearer {token}").parse().unwrap());
        headers
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn no_header_is_no_token() {
        let f = fixture().await;
        assert_eq!(f.edge.authenticate(&HeaderMap::new()).await, EdgeOutcome::NoToken);
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_no_token() {
        let f = fixture().await;
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Basic YTpi".parse().unwrap());
        assert_eq!(f.edge.authenticate(&headers).await, EdgeOutcome::NoToken);
    }

    #[tokio::test]
    async fn garbage_bearer_is_malformed() {
        let f = fixture().await;
        assert_eq!(f.edge.authenticate(&bearer("xyz")).await, EdgeOutcome::Malformed);
        assert_eq!(f.edge.authenticate(&bearer("")).await, EdgeOutcome::Malformed);
    }

    #[tokio::test]
    async fn valid_token_authenticates_with_normalized_roles() {
        let f = fixture().await;
        let token = f.edge.codec().issue("a@b.com", f.record.fingerprint()).unwrap().token;

        let outcome = f.edge.authenticate(&bearer(&token)).await;
        assert_eq!(
            outcome,
            EdgeOutcome::Authenticated(Principal {
                subject: "a@b.com".to_string(),
                user_id: f.record.id.to_string(),
                roles: vec!["ROLE_ADMIN".to_string()],
            })
        );
    }

    #[tokio::test]
    async fn deleted_subject_is_unknown() {
        let f = fixture().await;
        let token = f.edge.codec().issue("a@b.com", "fp-1").unwrap().token;
        f.store.remove("a@b.com").await;
        assert_eq!(f.edge.authenticate(&bearer(&token)).await, EdgeOutcome::UnknownSubject);
    }

    #[tokio::test]
    async fn password_change_makes_token_stale() {
        let f = fixture().await;
        let token = f.edge.codec().issue("a@b.com", "fp-1").unwrap().token;
        f.store.update_password("a@b.com", "fp-2").await.unwrap();
        assert_eq!(f.edge.authenticate(&bearer(&token)).await, EdgeOutcome::Stale);
    }

    #[tokio::test]
    async fn store_failure_is_identity_unavailable() {
        struct DownStore;

        #[async_trait]
        impl CredentialStore for DownStore {
            async fn find_by_principal(&self, _: &str) -> Result<Option<CredentialRecord>, IdentityStoreError> {
                Err(IdentityStoreError::Unavailable("connection refused".to_string()))
            }
            async fn insert(&self, _: CredentialRecord) -> Result<(), IdentityStoreError> {
                Err(IdentityStoreError::Unavailable("connection refused".to_string()))
            }
        }

        let f = fixture().await;
        let token = f.edge.codec().issue("a@b.com", "fp-1").unwrap().token;
        let edge = EdgeAuth::new(
            f.edge.codec.clone(),
            IdentityResolver::new(Arc::new(DownStore)),
            RoutePolicy::public_routes([]),
        );

        let outcome = edge.authenticate(&bearer(&token)).await;
        assert_eq!(outcome, EdgeOutcome::IdentityUnavailable);
        assert!(matches!(outcome.into_context(), Err(AuthError::IdentityUnavailable)));
    }

    #[tokio::test]
    async fn authenticated_request_is_forwarded_with_trust_headers_and_without_bearer() {
        let f = fixture().await;
        let token = f.edge.codec().issue("a@b.com", "fp-1").unwrap().token;

        let response = app(f.edge.clone())
            .oneshot(
                Request::builder()
                    .uri("/api/dish")
                    .header(AUTHORIZATION, format!("Bearer {token}"))
                    .header(X_USER_ROLES, "ROLE_SPOOFED")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_string(response).await,
            format!("a@b.com|{}|ROLE_ADMIN|", f.record.id)
        );
    }

    #[tokio::test]
    async fn anonymous_public_route_passes_with_spoofed_headers_stripped() {
        let f = fixture().await;
        let response = app(f.edge)
            .oneshot(
                Request::builder()
                    .uri("/api/city")
                    .header(X_USER_EMAIL, "admin@evil.com")
                    .header(X_USER_ROLES, "ROLE_ADMIN")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "|||");
    }

    #[tokio::test]
    async fn anonymous_protected_route_is_401() {
        let f = fixture().await;
        let response = app(f.edge)
            .oneshot(Request::builder().uri("/api/dish").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn dot_segments_under_public_prefix_are_refused() {
        let f = fixture().await;
        for uri in ["/api/auth/../dish/draft", "/api/auth/%2e%2e/dish/draft"] {
            let response = app(f.edge.clone())
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
            assert!(body_string(response).await.contains("unsafe_path"), "{uri}");
        }
    }

    #[tokio::test]
    async fn malformed_token_is_401_even_on_public_route() {
        let f = fixture().await;
        let response = app(f.edge)
            .oneshot(
                Request::builder()
                    .uri("/api/city")
                    .header(AUTHORIZATION, "Bearer not.a.token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
