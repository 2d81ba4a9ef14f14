use anyhow::Result;
use clap::Parser;

use depwatch_core::config::DepwatchConfig;
use depwatch_daemon::cli::DaemonCli;
use depwatch_daemon::logging;
use depwatch_daemon::orchestrator::Daemon;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = DepwatchConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load {}: {}", cli.config.display(), e))?;
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;

    if cli.validate {
        println!("configuration {} is valid", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "depwatch-daemon starting");

    let projects = cli.project_dirs()?;
    let mut daemon = Daemon::build_from_config(config, &projects, Some(cli.config.clone())).await?;

    if cli.once {
        let results = daemon.scan_once().await;
        let failed = results.iter().filter(|r| !r.outcome.is_completed()).count();
        println!("{}", serde_json::to_string_pretty(&daemon.report())?);
        daemon.shutdown().await;
        if failed > 0 {
            return Err(anyhow::anyhow!("{} of {} scans did not complete", failed, results.len()));
        }
        return Ok(());
    }

    daemon.run().await?;
    tracing::info!("depwatch-daemon shut down");
    Ok(())
}
