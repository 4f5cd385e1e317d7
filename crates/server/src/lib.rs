//! Gateway server library.
//!
//! Provides a reusable server function to serve the gateway either for the
//! binary, or for integration tests.

#![deny(missing_docs)]

mod health;
mod logger;

use std::{net::SocketAddr, sync::Arc};

use anyhow::anyhow;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use config::Config;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

pub use logger::init as init_logger;

/// Configuration for serving the gateway.
pub struct ServeConfig {
    /// The socket address (IP and port) the server will bind to.
    pub listen_address: SocketAddr,
    /// The deserialized TOML configuration.
    pub config: Config,
    /// Cancellation token for graceful shutdown.
    pub shutdown_signal: CancellationToken,
    /// Log filter string (e.g., "info" or "gateway=debug").
    pub log_filter: String,
    /// The version string to log on startup.
    pub version: String,
    /// Optional oneshot sender to send back the bound address (useful if port 0 was specified).
    pub bound_addr_sender: Option<tokio::sync::oneshot::Sender<SocketAddr>>,
}

/// Starts and runs the gateway server with the provided configuration.
pub async fn serve(
    ServeConfig {
        listen_address,
        config,
        shutdown_signal,
        log_filter,
        version,
        bound_addr_sender,
    }: ServeConfig,
) -> anyhow::Result<()> {
    logger::init(&log_filter);
    log::info!("aigateway {version}");

    let cors = match &config.server.cors {
        Some(cors_config) => cors::new_layer(cors_config),
        None => CorsLayer::permissive(),
    };

    let gateway_router = gateway::router(&config)
        .await
        .map_err(|e| anyhow!("Failed to initialize gateway router: {e}"))?;

    let mut app = Router::new().merge(gateway_router).layer(cors.clone());

    if config.server.health.enabled {
        if let Some(listen) = config.server.health.listen {
            tokio::spawn(health::bind_health_endpoint(
                listen,
                config.server.tls.clone(),
                config.server.health,
            ));
        } else {
            let health_router = Router::new()
                .route(&config.server.health.path, axum::routing::get(health::health))
                .layer(cors);

            app = app.merge(health_router);
        }
    }

    let listener = TcpListener::bind(listen_address)
        .await
        .map_err(|e| anyhow!("Failed to bind to {listen_address}: {e}"))?;

    if let Some(sender) = bound_addr_sender {
        sender
            .send(listener.local_addr()?)
            .expect("Failed to send back bound address.");
    }

    log::info!("Gateway listening on {listen_address}");

    match &config.server.tls {
        Some(tls_config) => {
            let rustls_config = RustlsConfig::from_pem_file(&tls_config.certificate, &tls_config.key)
                .await
                .map_err(|e| anyhow!("Failed to load TLS certificate and key: {e}"))?;

            let server = axum_server::from_tcp_rustls(listener.into_std()?, rustls_config)
                .serve(app.into_make_service_with_connect_info::<SocketAddr>());

            tokio::select! {
                result = server => {
                    result.map_err(|e| anyhow!("Failed to start HTTPS server: {e}"))?;
                }
                _ = shutdown_signal.cancelled() => {
                    log::info!("Received shutdown signal, shutting down gracefully...");
                }
            }
        }
        None => {
            tokio::select! {
                result = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()) => {
                    result.map_err(|e| anyhow!("Failed to start HTTP server: {e}"))?;
                }
                _ = shutdown_signal.cancelled() => {
                    log::info!("Received shutdown signal, shutting down gracefully...");
                }
            }
        }
    }

    Ok(())
}

mod cors {
    use config::CorsConfig;
    use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

    pub fn new_layer(config: &CorsConfig) -> CorsLayer {
        let mut layer = CorsLayer::new();

        layer = if config.allow_origins.is_empty() {
            layer.allow_origin(AllowOrigin::any())
        } else {
            let origins: Vec<_> = config
                .allow_origins
                .iter()
                .filter_map(|origin| origin.parse().ok())
                .collect();

            layer.allow_origin(origins)
        };

        layer = if config.allow_methods.is_empty() {
            layer.allow_methods(AllowMethods::any())
        } else {
            let methods: Vec<_> = config
                .allow_methods
                .iter()
                .filter_map(|method| method.parse().ok())
                .collect();

            layer.allow_methods(methods)
        };

        layer = if config.allow_headers.is_empty() {
            layer.allow_headers(AllowHeaders::any())
        } else {
            let headers: Vec<_> = config
                .allow_headers
                .iter()
                .filter_map(|header| header.parse().ok())
                .collect();

            layer.allow_headers(headers)
        };

        layer = layer.allow_credentials(config.allow_credentials);

        if let Some(max_age) = config.max_age_secs {
            layer = layer.max_age(std::time::Duration::from_secs(max_age));
        }

        layer
    }
}
