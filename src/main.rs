use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::watch;
use tracing::{info, warn};

use mailflow::config::Config;
use mailflow::queue::OutputQueues;
use mailflow::routing::{OutputDispatcher, RoutingEngine, RuleTable};
use mailflow::spool::QueueSupervisor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = Config::path_from_env();
    let (config, skipped) = Config::load(&config_path)?;

    // Initialize tracing; RUST_LOG wins over the configured level, and the
    // guard for the non-blocking file writer must outlive the daemon.
    let env_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level))
    };
    let _log_guard = match &config.log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("log_file has no file name: {}", path.display()))?;
            let dir = dir.unwrap_or_else(|| std::path::Path::new("."));
            std::fs::create_dir_all(dir)?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_target(false)
                .init();
            None
        }
    };

    eprintln!("📮 mailflow v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Config: {}", config_path.display());
    eprintln!(
        "   Queues: {} input ({} active), {} output, {} rules",
        config.inputs.len(),
        config.active_inputs().count(),
        config.outputs.len(),
        config.rules.len(),
    );

    for report in &skipped {
        warn!(config = %config_path.display(), "{report}");
    }

    let rules = Arc::new(RuleTable::new(config.rules.clone()));
    let outputs = Arc::new(OutputQueues::new(config.outputs.iter().cloned()));
    let engine = Arc::new(RoutingEngine::new(rules, outputs.clone()));
    let dispatcher = Arc::new(OutputDispatcher::new(outputs));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut supervisors = Vec::new();
    for spec in config.active_inputs() {
        let supervisor = QueueSupervisor::new(spec.clone(), engine.clone(), dispatcher.clone());
        supervisors.push(tokio::spawn(supervisor.run(shutdown_rx.clone())));
    }

    if supervisors.is_empty() {
        warn!("no active input queues are configured, nothing to monitor");
        return Ok(());
    }

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested, stopping queue supervisors");
    let _ = shutdown_tx.send(true);
    join_all(supervisors).await;
    info!("all queue supervisors stopped");

    Ok(())
}
