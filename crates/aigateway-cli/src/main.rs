use std::net::SocketAddr;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use args::Args;

mod args;

const DEFAULT_LISTEN_ADDRESS: &str = "127.0.0.1:8000";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = config::Config::load(&args.config)?;

    let listen_address = args
        .listen_address
        .or(config.server.listen_address)
        .unwrap_or_else(|| DEFAULT_LISTEN_ADDRESS.parse::<SocketAddr>().expect("valid default address"));

    let shutdown_signal = CancellationToken::new();
    let ctrl_c_token = shutdown_signal.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    server::serve(server::ServeConfig {
        listen_address,
        config,
        shutdown_signal,
        log_filter: args.log_filter,
        version: env!("CARGO_PKG_VERSION").to_string(),
        bound_addr_sender: None,
    })
    .await
}
