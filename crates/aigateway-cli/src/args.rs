use std::path::PathBuf;

use clap::Parser;

/// Command-line arguments for the gateway binary.
#[derive(Debug, Parser)]
#[command(name = "aigateway", version, about = "Multi-provider LLM API gateway")]
pub struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "aigateway.toml")]
    pub config: PathBuf,

    /// Listen address, overriding the configuration file's `server.listen_address`.
    #[arg(short, long)]
    pub listen_address: Option<std::net::SocketAddr>,

    /// Log filter, in `env_logger` syntax (e.g. "info" or "gateway=debug").
    #[arg(long, default_value = "info")]
    pub log_filter: String,
}
