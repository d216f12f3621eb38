use std::path::PathBuf;
use std::sync::Arc;

use iagp2p_config::IngestConfig;
use iagp2p_ingest::{
    CycleEvent, IntervalTicker, PipelineRunner, PollingLoop, PollingStats, ShutdownSignal, Ticker,
    shutdown_channel,
};
use iagp2p_telemetry::{
    LoggingConfig, Metrics, ServiceContext, ServiceSpanGuard, log_format_from_env,
};
use iagp2p_torrent::TorrentDescriptorBuilder;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult};

/// Environment variable naming the properties file.
pub const CONFIG_ENV: &str = "IAGP2P_CONFIG";
/// Environment variable overriding the log format (`json` or `pretty`).
pub const LOG_FORMAT_ENV: &str = "IAGP2P_LOG_FORMAT";

/// Dependencies required to bootstrap the ingest service.
pub(crate) struct BootstrapDependencies {
    logging: LoggingConfig<'static>,
    config: IngestConfig,
    metrics: Metrics,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the environment for the binary entrypoint.
    pub(crate) fn from_env() -> AppResult<Self> {
        let config_path = std::env::var(CONFIG_ENV).ok();
        let log_format = std::env::var(LOG_FORMAT_ENV).ok();
        Self::from_values(config_path.as_deref(), log_format.as_deref())
    }

    fn from_values(config_path: Option<&str>, log_format: Option<&str>) -> AppResult<Self> {
        let config_path = config_path
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
            .ok_or(AppError::MissingEnv { name: CONFIG_ENV })?;

        let config = iagp2p_config::load_from_path(&config_path)
            .map_err(|err| AppError::config("config.load", err))?;
        let logging = LoggingConfig {
            format: log_format_from_env(log_format),
            ..LoggingConfig::default()
        };
        let metrics =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;

        Ok(Self {
            logging,
            config,
            metrics,
        })
    }
}

/// Entry point for the ingest service boot sequence.
///
/// # Errors
///
/// Returns an error if configuration loading, logging setup or directory
/// preparation fails.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    run_app_with(dependencies).await
}

/// Boot sequence that relies entirely on injected dependencies to simplify testing.
pub(crate) async fn run_app_with(dependencies: BootstrapDependencies) -> AppResult<()> {
    let BootstrapDependencies {
        logging,
        config,
        metrics,
    } = dependencies;

    iagp2p_telemetry::init_logging(&logging)
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _service_span = ServiceSpanGuard::enter(&ServiceContext {
        mode: "ingest",
        source_dir: &config.source_dir,
        agencies: config.agencies.len(),
    });

    match serde_json::to_string(&config) {
        Ok(rendered) => info!(config = %rendered, "iagp2p ingest bootstrap starting"),
        Err(err) => warn!(error = %err, "iagp2p ingest bootstrap starting; config not renderable"),
    }

    let (trigger, shutdown) = shutdown_channel();
    let signal_task = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown requested; finishing current cycle");
                trigger.trigger();
            }
            Err(err) => error!(error = %err, "failed to listen for shutdown signal"),
        }
    });

    let ticker = IntervalTicker::new(config.poll_interval);
    let result = run_ingest(&config, metrics.clone(), ticker, shutdown, None).await;

    if !signal_task.is_finished() {
        signal_task.abort();
    }

    let stats = result?;
    match metrics.render() {
        Ok(rendered) => info!(
            cycles = stats.cycles,
            failed_cycles = stats.failed_cycles,
            metrics = %rendered,
            "iagp2p ingest shutdown complete"
        ),
        Err(err) => warn!(error = %err, "iagp2p ingest shutdown complete; metrics unavailable"),
    }
    Ok(())
}

/// Wire the descriptor builder, pipeline and polling loop, then run until `shutdown`.
pub(crate) async fn run_ingest<T: Ticker>(
    config: &IngestConfig,
    metrics: Metrics,
    ticker: T,
    shutdown: ShutdownSignal,
    observer: Option<mpsc::UnboundedSender<CycleEvent>>,
) -> AppResult<PollingStats> {
    let builder = TorrentDescriptorBuilder::new(&config.torrent);
    builder
        .prepare()
        .map_err(|err| AppError::torrent("torrent.prepare", err))?;

    let runner = PipelineRunner::new(config, Arc::new(builder), metrics.clone());
    runner
        .prepare()
        .map_err(|err| AppError::ingest("pipeline.prepare", err))?;
    info!(
        source = %config.source_dir.display(),
        agencies = config.agencies.len(),
        poll_interval_secs = config.poll_interval.as_secs(),
        "ingest pipeline ready"
    );

    let mut polling = PollingLoop::new(Arc::new(runner), ticker, shutdown, metrics);
    if let Some(observer) = observer {
        polling = polling.with_observer(observer);
    }
    Ok(polling.run().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow, bail};
    use iagp2p_ingest::{SummaryResult, manual_ticker};
    use std::fs;
    use std::path::Path;
    use std::time::Duration;

    fn write_config(root: &Path) -> Result<PathBuf> {
        let path = root.join("iagp2p.properties");
        let body = format!(
            "home_agency_id=7\n\
             child_agency_1=12\n\
             home_file_directory={root}/incoming\n\
             home_file_archive_directory={root}/archive\n\
             home_file_error_directory={root}/errors\n\
             home_torrent_directory={root}/torrents\n\
             torrent_piece_length=16384\n",
            root = root.display()
        );
        fs::write(&path, body)?;
        Ok(path)
    }

    #[test]
    fn missing_config_env_is_reported() {
        assert!(matches!(
            BootstrapDependencies::from_values(None, None),
            Err(AppError::MissingEnv { name: CONFIG_ENV })
        ));
        assert!(matches!(
            BootstrapDependencies::from_values(Some("  "), None),
            Err(AppError::MissingEnv { .. })
        ));
    }

    #[test]
    fn unreadable_config_is_a_config_error() -> Result<()> {
        let temp = tempfile::Builder::new().prefix("iagp2p-app-").tempdir()?;
        let missing = temp.path().join("absent.properties");
        let result = BootstrapDependencies::from_values(missing.to_str(), None);
        assert!(matches!(
            result,
            Err(AppError::Config {
                operation: "config.load",
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn dependencies_load_from_values() -> Result<()> {
        let temp = tempfile::Builder::new().prefix("iagp2p-app-").tempdir()?;
        let path = write_config(temp.path())?;
        let dependencies = BootstrapDependencies::from_values(path.to_str(), Some("json"))
            .map_err(|err| anyhow!("{err:?}"))?;
        assert_eq!(dependencies.logging.format, iagp2p_telemetry::LogFormat::Json);
        assert_eq!(dependencies.config.agencies.len(), 2);
        assert_eq!(dependencies.config.torrent.piece_length, 16_384);
        Ok(())
    }

    #[tokio::test]
    async fn ingest_loop_builds_torrents_until_shutdown() -> Result<()> {
        let temp = tempfile::Builder::new().prefix("iagp2p-app-").tempdir()?;
        let path = write_config(temp.path())?;
        let config = iagp2p_config::load_from_path(&path)?;
        let metrics = Metrics::new()?;
        fs::create_dir_all(&config.source_dir)?;
        fs::write(config.source_dir.join("012sample.itgu"), b"child agency data")?;
        fs::write(config.source_dir.join("999sample.itag"), b"foreign data")?;

        let (ticks, ticker) = manual_ticker();
        let (trigger, shutdown) = shutdown_channel();
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let loop_config = config.clone();
        let loop_metrics = metrics.clone();
        let handle = tokio::spawn(async move {
            run_ingest(&loop_config, loop_metrics, ticker, shutdown, Some(events_tx)).await
        });

        assert!(ticks.tick());
        let event = tokio::time::timeout(Duration::from_secs(10), events.recv())
            .await?
            .ok_or_else(|| anyhow!("observer closed"))?;
        let CycleEvent::Completed(report) = event else {
            bail!("cycle should complete");
        };
        assert_eq!(
            report.summary.get("012sample.itgu"),
            Some(&SummaryResult::Descriptor("012sample.itgu.torrent".into()))
        );
        assert!(config.torrent.output_dir.join("012sample.itgu.torrent").exists());
        assert!(config.error_dir.join("999sample.itag.ERROR").exists());

        trigger.trigger();
        let stats = handle.await?.map_err(|err| anyhow!("{err:?}"))?;
        assert_eq!(stats.cycles, 1);
        assert_eq!(metrics.snapshot().cycles_total, 1);
        Ok(())
    }
}
