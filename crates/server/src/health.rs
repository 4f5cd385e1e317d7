//! Standalone health check endpoint, optionally bound to its own listen address.

use std::net::SocketAddr;

use axum::{Json, Router, routing::get};
use config::{HealthConfig, TlsServerConfig};
use serde_json::{Value, json};

/// `GET /health` handler shared by both the in-process mount and the
/// separately-bound listener.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": jiff::Timestamp::now().to_string(),
    }))
}

/// Binds and serves the health endpoint on its own listen address.
///
/// Used when `server.health.listen` is set, so liveness checks don't share a
/// socket with the main application (and its auth/rate-limit layers).
pub async fn bind_health_endpoint(listen: SocketAddr, tls: Option<TlsServerConfig>, config: HealthConfig) {
    let router = Router::new().route(&config.path, get(health));

    let result = match tls {
        Some(tls) => {
            let rustls_config = match axum_server::tls_rustls::RustlsConfig::from_pem_file(&tls.certificate, &tls.key)
                .await
            {
                Ok(config) => config,
                Err(e) => {
                    log::error!("Failed to load TLS certificate for health endpoint: {e}");
                    return;
                }
            };

            axum_server::bind_rustls(listen, rustls_config)
                .serve(router.into_make_service())
                .await
        }
        None => axum_server::bind(listen).serve(router.into_make_service()).await,
    };

    if let Err(e) = result {
        log::error!("Health endpoint on {listen} failed: {e}");
    }
}
