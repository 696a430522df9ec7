// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! RateFood Gateway - Edge Authentication & Trust Propagation
//!
//! The edge verifies bearer tokens against the credential store and asserts
//! the caller's identity to internal services through `X-User-*` headers.
//! Internal services rebuild a request-scoped security context from those
//! headers alone and enforce per-route role requirements.
//!
//! ## Modules
//!
//! - `api` - HTTP handlers served by the edge (Axum)
//! - `auth` - Tokens, identity resolution, role canonicalization, edge and downstream filters
//! - `config` - Environment configuration
//! - `proxy` - Reverse proxy to the internal backend
//! - `telemetry` - Tracing subscriber setup

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod proxy;
pub mod state;
pub mod telemetry;
