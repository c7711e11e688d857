//! Serve a logic timer board over JSON-RPC
//!
//! Settings come from `BINCOMS_TTY`, `BINCOMS_BAUD`, `BINCOMS_HOST` and
//! `BINCOMS_PORT`; log verbosity from `RUST_LOG` (default `info`).

use anyhow::Context;
use bincoms::AppConfig;
use bincoms::client::LogicTimer;
use bincoms::server::{MethodTable, RpcServer};
use log::info;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    info!("Connecting to {} at {} baud", config.tty, config.baud_rate);

    let gate = config
        .connection()
        .connect()
        .await
        .with_context(|| format!("failed to open device on {}", config.tty))?;
    for descriptor in gate.capabilities().iter() {
        info!("Device function {}", descriptor);
    }

    let timer = LogicTimer::new(gate.clone());
    let methods = MethodTable::with_extensions(gate.clone(), Arc::new(timer));
    let server = RpcServer::bind(config.server(), methods)
        .await
        .context("failed to start server")?;

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            shutdown.shutdown();
        }
    });

    server.run().await?;
    gate.close().await?;
    Ok(())
}
