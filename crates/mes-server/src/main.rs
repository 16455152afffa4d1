//! `mes-server` binary entrypoint.

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mes_server::{MesServer, ServerConfig};
use mes_store::connection::{ConnectionConfig, new_file, new_in_memory};
use mes_store::migrations::run_migrations;

/// Realtime dashboard and scheduler feeds for the MES backend.
#[derive(Debug, Parser)]
#[command(name = "mes-server", version, about)]
struct Args {
    /// Host to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (0 auto-assigns).
    #[arg(long)]
    port: Option<u16>,

    /// SQLite database path; omit to run on an in-memory database.
    #[arg(long)]
    database: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let mut config = ServerConfig::from_env();
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(database) = args.database {
        config.database_path = Some(database);
    }

    let store_config = ConnectionConfig::default();
    let pool = match &config.database_path {
        Some(path) => {
            info!(%path, "opening database");
            new_file(path, &store_config).context("failed to open database")?
        }
        None => {
            info!("no database path configured, using in-memory database");
            new_in_memory(&store_config).context("failed to open in-memory database")?
        }
    };
    {
        let conn = pool.get().context("failed to check out a connection")?;
        let version = run_migrations(&conn).context("failed to run migrations")?;
        info!(version, "database schema ready");
    }

    let drain_timeout = std::time::Duration::from_secs(config.shutdown_timeout_secs);
    let server = MesServer::new(config, pool);
    let shutdown = server.shutdown();
    let (addr, serve_task) = server.listen().await.context("failed to bind")?;
    info!(%addr, "mes-server running, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("shutdown signal received");
    shutdown.drain(vec![serve_task], drain_timeout).await;

    Ok(())
}
