use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use postwatch_daemon::cli::DaemonCli;
use postwatch_daemon::daemon::Daemon;
use postwatch_daemon::logging;

/// A blocking stdin read cannot be cancelled; do not wait on it at exit.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(200);

fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // One thread: the tailer, the tracker task, and the console share
    // state only through channels.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(cli));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    result
}

async fn run(cli: DaemonCli) -> Result<()> {
    let config = cli.load_config().await?;

    if cli.validate {
        println!("configuration OK: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "postwatch-daemon starting"
    );

    let mut daemon = Daemon::build_from_config(config)?;
    daemon.run().await
}
