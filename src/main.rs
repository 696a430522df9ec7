// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;
use std::time::Duration;

use axum_server::{tls_rustls::RustlsConfig, Handle};
use ratefood_gateway::{
    api::{auth::register_credential, router},
    auth::{identity::InMemoryCredentialStore, policy::RoutePolicy, roles::Role, TokenCodec},
    config::GatewayConfig,
    proxy::Upstream,
    state::AppState,
    telemetry::{init_tracing, LogFormat},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Grace period for in-flight requests after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    init_tracing(LogFormat::from_env());

    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };
    info!(?config, "configuration loaded");

    let codec = TokenCodec::new(&config.jwt_secret, config.token_ttl).expect("Failed to build token codec");
    let upstream = Upstream::new(config.upstream_url.clone(), config.upstream_timeout)
        .expect("Failed to build upstream client");
    let policy = RoutePolicy::public_routes(config.public_routes.clone());

    let store = Arc::new(InMemoryCredentialStore::new());
    let state = AppState::new(codec, store, policy, upstream);

    if let Some(seed) = &config.seed_admin {
        match register_credential(state.auth.identities(), &seed.email, &seed.password, &[Role::Admin]).await {
            Ok(record) => info!(user_id = %record.id, "seeded admin credential"),
            Err(e) => warn!(error = %e.message, "failed to seed admin credential"),
        }
    }

    let app = router(state);

    // Graceful shutdown on Ctrl-C / SIGTERM
    let shutdown = CancellationToken::new();
    let handle = Handle::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));
    tokio::spawn({
        let shutdown = shutdown.clone();
        let handle = handle.clone();
        async move {
            shutdown.cancelled().await;
            info!("shutdown signal received, draining connections");
            handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        }
    });

    let addr = config.bind;
    match &config.tls {
        Some(tls) => {
            let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                .await
                .expect("Failed to load TLS certificate and key");
            info!(%addr, upstream = %config.upstream_url, "RateFood gateway listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .expect("HTTPS server failed");
        }
        None => {
            info!(%addr, upstream = %config.upstream_url, "RateFood gateway listening on http (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .expect("HTTP server failed");
        }
    }

    info!("server stopped");
}

async fn wait_for_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    shutdown.cancel();
}
