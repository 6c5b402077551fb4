//! Command-line configuration for the server binary.

use std::path::PathBuf;

use clap::Parser;

/// Message-bridge session hub server.
#[derive(Debug, Parser)]
#[command(name = "mb-server", version, about)]
pub struct ServerArgs {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Public base URL used in pairing-code links. Defaults to
    /// http://localhost:<port>.
    #[arg(long, env = "MB_PUBLIC_URL")]
    pub public_url: Option<String>,

    /// Directory pairing-code images are written to and served from.
    #[arg(long, default_value = "./pairing-codes")]
    pub pairing_dir: PathBuf,

    /// Root of the per-tenant credential store handed to drivers.
    #[arg(long, default_value = "./client-sessions")]
    pub session_root: PathBuf,

    /// Driver executable spawned once per tenant.
    #[arg(long, env = "MB_DRIVER", default_value = "mb-driver")]
    pub driver: PathBuf,

    /// Extra argument passed to the driver before the generated ones.
    /// Repeatable.
    #[arg(long = "driver-arg")]
    pub driver_args: Vec<String>,
}

impl ServerArgs {
    /// Base URL pairing links are built against.
    pub fn public_base_url(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.port))
    }
}
