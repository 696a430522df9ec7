// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Declarative route access policy.
//!
//! A [`RoutePolicy`] is an ordered table of `(method, path pattern) → Access`
//! rules. The first matching rule decides; unmatched routes fall back to
//! [`Access::Authenticated`].
//!
//! ## Pattern syntax
//!
//! | Segment | Matches |
//! |---------|---------|
//! | `city` | the literal segment `city` |
//! | `*` or `{name}` | exactly one segment |
//! | `**` | any remainder, including nothing (last segment only) |

use std::collections::BTreeSet;
use std::str::FromStr;

use axum::http::Method;

use super::context::SecurityContext;
use super::error::AuthError;
use super::roles::Role;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("route pattern must start with '/': {0}")]
    NotAbsolute(String),

    #[error("'**' may only appear as the last segment: {0}")]
    MisplacedRest(String),

    #[error("invalid HTTP method in route spec: {0}")]
    InvalidMethod(String),

    #[error("malformed route spec: {0}")]
    Malformed(String),
}

/// What a route requires of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// No identity needed
    Public,
    /// Any authenticated principal
    Authenticated,
    /// An authenticated principal holding at least one of these roles
    AnyRole(BTreeSet<Role>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Single,
    Rest,
}

/// Compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, path: &str) -> bool {
        let mut parts = path_segments(path);

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Rest => return i == self.segments.len() - 1,
                Segment::Single => {
                    if parts.next().is_none() {
                        return false;
                    }
                }
                Segment::Literal(literal) => {
                    if parts.next() != Some(literal.as_str()) {
                        return false;
                    }
                }
            }
        }

        parts.next().is_none()
    }
}

impl FromStr for PathPattern {
    type Err = PolicyError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if !raw.starts_with('/') {
            return Err(PolicyError::NotAbsolute(raw.to_string()));
        }

        let segments: Vec<Segment> = path_segments(raw)
            .map(|s| match s {
                "**" => Segment::Rest,
                "*" => Segment::Single,
                s if s.starts_with('{') && s.ends_with('}') => Segment::Single,
                s => Segment::Literal(s.to_string()),
            })
            .collect();

        if let Some(pos) = segments.iter().position(|s| *s == Segment::Rest) {
            if pos != segments.len() - 1 {
                return Err(PolicyError::MisplacedRest(raw.to_string()));
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }
}

fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// True when `path` has no `.` or `..` segment, plain or percent-encoded, and
/// no backslash. Only such paths keep their segments when handed to a URL
/// parser, so policy decisions on them hold for what the upstream receives.
pub fn is_canonical_path(path: &str) -> bool {
    !path.contains('\\') && !path.split('/').any(is_dot_segment)
}

fn is_dot_segment(segment: &str) -> bool {
    let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
    decoded == "." || decoded == ".."
}

/// `METHOD /pattern` or `/pattern` (any method).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    pub method: Option<Method>,
    pub pattern: PathPattern,
}

impl FromStr for RouteSpec {
    type Err = PolicyError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let mut parts = spec.split_whitespace();
        let (method, pattern) = match (parts.next(), parts.next(), parts.next()) {
            (Some(path), None, None) => (None, path),
            (Some(method), Some(path), None) => {
                let method = if method.eq_ignore_ascii_case("ANY") {
                    None
                } else {
                    Some(
                        Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                            .map_err(|_| PolicyError::InvalidMethod(method.to_string()))?,
                    )
                };
                (method, path)
            }
            _ => return Err(PolicyError::Malformed(spec.to_string())),
        };

        Ok(Self {
            method,
            pattern: pattern.parse()?,
        })
    }
}

/// Parse a comma-separated list of route specs. Blank entries are skipped.
pub fn parse_route_list(list: &str) -> Result<Vec<RouteSpec>, PolicyError> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

#[derive(Debug, Clone)]
struct RouteRule {
    route: RouteSpec,
    access: Access,
}

impl RouteRule {
    fn matches(&self, method: &Method, path: &str) -> bool {
        self.route.method.as_ref().is_none_or(|m| m == method) && self.route.pattern.matches(path)
    }
}

/// Ordered route → access table.
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    rules: Vec<RouteRule>,
    fallback: Access,
}

impl RoutePolicy {
    pub fn builder() -> RoutePolicyBuilder {
        RoutePolicyBuilder::default()
    }

    /// Edge policy: the given routes are public, everything else needs an identity.
    pub fn public_routes(routes: impl IntoIterator<Item = RouteSpec>) -> Self {
        Self {
            rules: routes
                .into_iter()
                .map(|route| RouteRule {
                    route,
                    access: Access::Public,
                })
                .collect(),
            fallback: Access::Authenticated,
        }
    }

    /// The access requirement for a request.
    pub fn decide(&self, method: &Method, path: &str) -> &Access {
        self.rules
            .iter()
            .find(|rule| rule.matches(method, path))
            .map(|rule| &rule.access)
            .unwrap_or(&self.fallback)
    }

    /// Evaluate a request against the table.
    ///
    /// Anonymous callers on a non-public route get `MissingCredentials` (401);
    /// authenticated callers without an intersecting role get
    /// `InsufficientRole` (403).
    pub fn evaluate(
        &self,
        method: &Method,
        path: &str,
        context: &SecurityContext,
    ) -> Result<(), AuthError> {
        match (self.decide(method, path), context.principal()) {
            (Access::Public, _) => Ok(()),
            (_, None) => Err(AuthError::MissingCredentials),
            (Access::Authenticated, Some(_)) => Ok(()),
            (Access::AnyRole(required), Some(principal)) => {
                if principal.has_any_role(required) {
                    Ok(())
                } else {
                    Err(AuthError::InsufficientRole)
                }
            }
        }
    }
}

/// Builder for [`RoutePolicy`]. Patterns are compiled in [`build`](Self::build);
/// routes no rule matches require an identity.
#[derive(Default)]
pub struct RoutePolicyBuilder {
    rules: Vec<(Option<Method>, String, Access)>,
}

impl RoutePolicyBuilder {
    fn rule(mut self, method: Option<Method>, pattern: &str, access: Access) -> Self {
        self.rules.push((method, pattern.to_string(), access));
        self
    }

    pub fn public(self, method: Option<Method>, pattern: &str) -> Self {
        self.rule(method, pattern, Access::Public)
    }

    pub fn any_role<I>(self, method: Option<Method>, pattern: &str, roles: I) -> Self
    where
        I: IntoIterator<Item = Role>,
    {
        self.rule(method, pattern, Access::AnyRole(roles.into_iter().collect()))
    }

    pub fn build(self) -> Result<RoutePolicy, PolicyError> {
        let rules = self
            .rules
            .into_iter()
            .map(|(method, pattern, access)| {
                Ok(RouteRule {
                    route: RouteSpec {
                        method,
                        pattern: pattern.parse()?,
                    },
                    access,
                })
            })
            .collect::<Result<Vec<_>, PolicyError>>()?;

        Ok(RoutePolicy {
            rules,
            fallback: Access::Authenticated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::context::Principal;

    fn pattern(raw: &str) -> PathPattern {
        raw.parse().unwrap()
    }

    #[test]
    fn dot_segments_are_not_canonical() {
        for path in [
            "/api/auth/../dish/draft",
            "/api/auth/./signin",
            "/api/auth/%2e%2e/dish/draft",
            "/api/auth/%2E%2e/dish",
            "/api/auth/.%2e/dish",
            "/api/auth/%2e/signin",
            "/api/auth/..",
            "/api/auth\\..\\dish",
        ] {
            assert!(!is_canonical_path(path), "{path}");
        }

        for path in ["/", "/api/city", "/api/dish/oslo", "/api/auth/...", "/api/a..b/%2ex", "/api/dish/%2Fdraft"] {
            assert!(is_canonical_path(path), "{path}");
        }
    }

    fn user(roles: &[&str]) -> SecurityContext {
        SecurityContext::Authenticated(Principal {
            subject: "a@b.com".to_string(),
            user_id: "1".to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        })
    }

    fn policy() -> RoutePolicy {
        RoutePolicy::builder()
            .public(None, "/api/auth/**")
            .public(Some(Method::GET), "/api/city")
            .any_role(Some(Method::POST), "/api/dish", [Role::Admin, Role::User])
            .any_role(Some(Method::DELETE), "/api/dish/{id}", [Role::Admin])
            .build()
            .unwrap()
    }

    #[test]
    fn literal_and_wildcards_match() {
        assert!(pattern("/api/city").matches("/api/city"));
        assert!(pattern("/api/city").matches("/api/city/"));
        assert!(!pattern("/api/city").matches("/api/city/x"));
        assert!(pattern("/api/dish/{city}").matches("/api/dish/oslo"));
        assert!(!pattern("/api/dish/*").matches("/api/dish"));
        assert!(pattern("/api/auth/**").matches("/api/auth"));
        assert!(pattern("/api/auth/**").matches("/api/auth/signin"));
        assert!(pattern("/api/auth/**").matches("/api/auth/a/b/c"));
        assert!(!pattern("/api/auth/**").matches("/api/authx"));
    }

    #[test]
    fn rest_must_be_last() {
        assert_eq!(
            "/api/**/x".parse::<PathPattern>(),
            Err(PolicyError::MisplacedRest("/api/**/x".to_string()))
        );
        assert!(matches!("api".parse::<PathPattern>(), Err(PolicyError::NotAbsolute(_))));
    }

    #[test]
    fn route_spec_parsing() {
        let spec: RouteSpec = "get /api/city".parse().unwrap();
        assert_eq!(spec.method, Some(Method::GET));
        assert_eq!(spec.pattern.as_str(), "/api/city");

        let any: RouteSpec = "/api/auth/**".parse().unwrap();
        assert_eq!(any.method, None);
        assert_eq!("ANY /x".parse::<RouteSpec>().unwrap().method, None);

        assert!(matches!("GET /a extra".parse::<RouteSpec>(), Err(PolicyError::Malformed(_))));
        assert!(matches!("GE(T /a".parse::<RouteSpec>(), Err(PolicyError::InvalidMethod(_))));
    }

    #[test]
    fn route_list_parsing_skips_blanks() {
        let routes = parse_route_list(" /api/auth/** , GET /api/city ,, ").unwrap();
        assert_eq!(routes.len(), 2);
        assert!(parse_route_list("").unwrap().is_empty());
    }

    #[test]
    fn first_matching_rule_wins_and_method_matters() {
        let policy = policy();
        assert_eq!(policy.decide(&Method::GET, "/api/city"), &Access::Public);
        assert_eq!(policy.decide(&Method::POST, "/api/city"), &Access::Authenticated);
        assert_eq!(policy.decide(&Method::POST, "/api/auth/signin"), &Access::Public);
    }

    #[test]
    fn anonymous_on_protected_route_is_401() {
        let result = policy().evaluate(&Method::POST, "/api/dish", &SecurityContext::Anonymous);
        assert!(matches!(result, Err(AuthError::MissingCredentials)));
    }

    #[test]
    fn anonymous_on_public_route_passes() {
        assert!(policy()
            .evaluate(&Method::GET, "/api/city", &SecurityContext::Anonymous)
            .is_ok());
    }

    #[test]
    fn role_intersection_decides() {
        let policy = policy();
        assert!(policy.evaluate(&Method::POST, "/api/dish", &user(&["ROLE_USER"])).is_ok());
        assert!(policy
            .evaluate(&Method::DELETE, "/api/dish/9", &user(&["ROLE_ADMIN"]))
            .is_ok());

        let denied = policy.evaluate(&Method::DELETE, "/api/dish/9", &user(&["ROLE_USER"]));
        assert!(matches!(denied, Err(AuthError::InsufficientRole)));
    }

    #[test]
    fn bare_role_names_grant_nothing() {
        let denied = policy().evaluate(&Method::DELETE, "/api/dish/9", &user(&["ADMIN"]));
        assert!(matches!(denied, Err(AuthError::InsufficientRole)));
    }

    #[test]
    fn public_routes_constructor_defaults_to_authenticated() {
        let routes = parse_route_list("/api/auth/**").unwrap();
        let policy = RoutePolicy::public_routes(routes);
        assert_eq!(policy.decide(&Method::POST, "/api/auth/signup"), &Access::Public);
        assert_eq!(policy.decide(&Method::GET, "/api/dish/oslo"), &Access::Authenticated);
    }
}
