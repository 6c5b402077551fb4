use anyhow::Context;
use clap::Parser;
use tracing::info;

use mb_server::cli::ServerArgs;
use mb_server::routes;
use mb_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = ServerArgs::parse();
    let state = AppState::from_args(&args);
    let app = routes::router(state, &args.pairing_dir);

    let listener = tokio::net::TcpListener::bind((args.host.as_str(), args.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", args.host, args.port))?;
    info!(
        target = "mb.http",
        addr = %listener.local_addr()?,
        "server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!(target = "mb.http", "shutdown requested");
}
