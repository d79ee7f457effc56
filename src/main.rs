use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use termgate::{
    SessionRegistry, Services, config,
    db::repo::MemoryUserRepository,
    net::telnet,
    prompts::PromptStore,
    services::load_menus,
};

#[derive(Debug, Parser)]
#[command(name = "termgate", about = "Multi-node telnet board")]
struct Args {
    /// TOML configuration file; without it settings come from the environment
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    let args = Args::parse();

    let cfg = match &args.config {
        Some(path) => config::Config::load(path)?,
        None => config::Config::from_env()?,
    };
    let cfg = Arc::new(cfg);

    let prompts = match &cfg.data_dir {
        Some(dir) => PromptStore::with_dir(dir),
        None => PromptStore::in_memory(),
    };
    let menus = load_menus(&cfg)?;
    let users = Arc::new(MemoryUserRepository::new());
    let services = Arc::new(Services::new(cfg.clone(), users, menus, prompts));
    services.ensure_sysop().await?;

    let registry = Arc::new(SessionRegistry::new(cfg.max_nodes));

    // Telnet server
    let tcp_addr: SocketAddr = cfg.tcp_addr.parse()?;
    let tcp_services = services.clone();
    let tcp_registry = registry.clone();
    let tcp_jh = tokio::spawn(async move {
        tracing::info!(%tcp_addr, bbs = %tcp_services.config.bbs_name, "termgate server TCP (telnet) listening");
        if let Err(e) = telnet::serve(tcp_addr, tcp_services, tcp_registry).await {
            tracing::error!(error = %e, "telnet server error");
        }
    });

    tokio::select! {
        res = tcp_jh => {
            if let Err(e) = res {
                tracing::error!(error = %e, "server task failed");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received, shutting down");
        }
    }

    registry.shutdown().await;
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::{EnvFilter, prelude::*};

    color_eyre::install().map_err(|e| anyhow::anyhow!("{e}"))?;

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info,termgate=debug"))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::uptime()),
        )
        .with(tracing_error::ErrorLayer::default())
        .init();
    Ok(())
}
