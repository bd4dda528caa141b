//! Daemon assembly and lifecycle.
//!
//! [`Daemon`] builds the delivery pipeline from the loaded configuration,
//! starts it, serves the command console and the notification writer, and
//! shuts everything down when a signal arrives or the tailer fails.
//!
//! # Shutdown Triggers
//!
//! - `SIGTERM` / `SIGINT` (Ctrl+C on non-Unix)
//! - The log tailer exiting with an error (for example a rotation wait
//!   timeout); this also makes [`Daemon::run`] return the error.
//!
//! End of console input does not stop the daemon.

use std::future::Future;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio::sync::mpsc;

use postwatch_core::config::PostwatchConfig;
use postwatch_core::pipeline::{HealthStatus, Pipeline};
use postwatch_tracker::{DeliveryPipeline, DeliveryPipelineBuilder, QueryHandle, TrackerConfig};

use crate::console;
use crate::metrics_server;
use crate::sink::{self, LogLineSink};

/// The running daemon: configuration plus one delivery pipeline.
pub struct Daemon {
    config: PostwatchConfig,
    pipeline: DeliveryPipeline<LogLineSink>,
    /// Taken by the first `run_until`
    notifications: Option<mpsc::UnboundedReceiver<String>>,
}

impl Daemon {
    /// Build a daemon and install the metrics recorder if enabled.
    ///
    /// # Errors
    ///
    /// Invalid configuration, pattern or template compile failures, or a
    /// metrics endpoint that cannot be installed.
    pub fn build_from_config(config: PostwatchConfig) -> Result<Self> {
        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }
        Self::new(config)
    }

    /// Build a daemon without touching the global metrics recorder.
    pub fn new(config: PostwatchConfig) -> Result<Self> {
        config.validate()?;

        let (sink, notifications) = LogLineSink::channel();
        let tracker_config = TrackerConfig::from_core(&config);
        let pipeline = DeliveryPipelineBuilder::new()
            .config(tracker_config)
            .build(sink)?;

        tracing::info!(
            log_file = %pipeline.config().log_file.display(),
            patterns = pipeline.config().patterns.len(),
            froms = pipeline.config().froms.len(),
            "daemon initialized"
        );

        Ok(Self {
            config,
            pipeline,
            notifications: Some(notifications),
        })
    }

    /// Run until `SIGTERM`/`SIGINT`, serving commands from stdin and
    /// writing notifications to stdout.
    pub async fn run(&mut self) -> Result<()> {
        let shutdown = shutdown_signal()?;
        self.run_until(
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
            tokio::io::stdout(),
            shutdown,
        )
        .await
    }

    /// Start the pipeline and serve console commands until `shutdown`
    /// resolves or the tailer fails.
    ///
    /// Notification lines go to `notify_out`; console replies go to
    /// `console_out`. The pipeline is always stopped, and queued
    /// notifications written, before returning.
    pub async fn run_until<R, O, N, F>(
        &mut self,
        input: R,
        console_out: O,
        notify_out: N,
        shutdown: F,
    ) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin,
        N: AsyncWrite + Unpin,
        F: Future<Output = ()>,
    {
        let Some(notifications) = self.notifications.take() else {
            anyhow::bail!("daemon cannot be restarted");
        };
        self.pipeline.start().await?;
        tracing::info!("postwatch-daemon running");

        let console = console::serve(input, console_out, self.pipeline.query_handle());
        let writer = sink::write_lines(notifications, notify_out);
        tokio::pin!(console);
        tokio::pin!(writer);
        tokio::pin!(shutdown);
        let mut console_open = true;
        let mut writer_open = true;

        let outcome = loop {
            tokio::select! {
                () = &mut shutdown => break Ok(()),
                failure = self.pipeline.tailer_failure() => {
                    break match failure {
                        Some(e) => {
                            tracing::error!(error = %e, "log tailer stopped");
                            Err(anyhow::Error::new(e).context("log tailer failed"))
                        }
                        None => Ok(()),
                    };
                }
                result = &mut console, if console_open => {
                    console_open = false;
                    if let Err(e) = result {
                        tracing::warn!(error = %e, "console stopped");
                    }
                }
                result = &mut writer, if writer_open => {
                    writer_open = false;
                    if let Err(e) = result {
                        tracing::error!(error = %e, "notification writer stopped");
                    }
                }
            }
        };

        tracing::info!("stopping delivery pipeline");
        if let Err(e) = self.pipeline.stop().await {
            tracing::error!(error = %e, "failed to stop delivery pipeline");
        }
        // The sink went away with the processing task, so the writer ends
        // once the remaining lines are written.
        if writer_open && let Err(e) = writer.await {
            tracing::error!(error = %e, "failed to write pending notifications");
        }
        tracing::info!("postwatch-daemon shut down");

        outcome
    }

    /// Current pipeline health.
    pub async fn health(&self) -> HealthStatus {
        self.pipeline.health_check().await
    }

    /// Handle for issuing history queries while the daemon runs.
    pub fn query_handle(&self) -> QueryHandle {
        self.pipeline.query_handle()
    }

    pub fn config(&self) -> &PostwatchConfig {
        &self.config
    }
}

/// Resolve once a shutdown signal arrives.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(async move {
        let signal = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        tracing::info!(signal, "shutdown signal received");
    })
}

#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            return;
        }
        tracing::info!(signal = "ctrl_c", "shutdown signal received");
    })
}
