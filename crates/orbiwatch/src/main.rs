//! Orbiwatch - watch a directory and report live acquisition progress

use anyhow::{bail, Context, Result};
use clap::Parser;
use orbiwatch::{is_usage_error, Cli, OrbiwatchConfig};
use orbiwatch_logging::{init_logging, LogConfig};
use orbiwatch_monitor::{
    arrival_channel, AppendLogWriter, CancellationToken, ConsoleWriter, Dispatcher, FanoutSink,
    ReportSink, StatusFileOpener,
};
use orbiwatch_scout::ArrivalWatcher;
use std::io::BufRead;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info, warn};

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if is_usage_error(&err) => {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        // --help, --version and invalid flag values
        Err(err) => err.exit(),
    };

    let _log_guard = match init_logging(LogConfig {
        app_name: "orbiwatch",
        verbose: cli.verbose,
    }) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Warning: {:#}", err);
            None
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:?}", err);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = OrbiwatchConfig::resolve(&cli).context("Failed to load configuration")?;

    if !cli.directory.is_dir() {
        bail!("{} is not a directory", cli.directory.display());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(watch(&cli.directory, &config))
}

async fn watch(root: &Path, config: &OrbiwatchConfig) -> Result<()> {
    let sink = build_sink(config)?;
    let cancel = CancellationToken::new();
    install_signal_handlers(cancel.clone())?;
    spawn_quit_listener(cancel.clone());

    let watcher = ArrivalWatcher::new(config.watch_config(root))
        .with_context(|| format!("Cannot watch {}", root.display()))?;
    let (tx, rx) = arrival_channel();

    info!(
        root = %root.display(),
        pattern = %config.pattern,
        workers = config.workers,
        report_log = %config.report_log.display(),
        "Starting orbiwatch"
    );
    println!("Running. Waiting for new files to show up... Press 'q' to quit");

    let watcher_task = tokio::spawn(watcher.run(tx, cancel.clone()));
    let dispatcher = Dispatcher::new(
        StatusFileOpener,
        config.monitor_config(),
        config.dispatch_config(),
        sink,
        cancel.clone(),
    );
    let summary = dispatcher.run(rx).await;

    // The dispatcher only returns on its own when the watcher has gone away.
    cancel.cancel();
    match watcher_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Arrival watcher failed: {}", e),
        Err(e) => warn!("Arrival watcher task panicked: {:?}", e),
    }

    info!(
        completed = summary.completed,
        cancelled = summary.cancelled,
        failed = summary.failed,
        "Orbiwatch stopped"
    );
    Ok(())
}

fn build_sink(config: &OrbiwatchConfig) -> Result<Arc<dyn ReportSink>> {
    let report_log = AppendLogWriter::open(&config.report_log)
        .with_context(|| format!("Cannot open report log {}", config.report_log.display()))?;
    debug!(path = %report_log.path().display(), "Report log opened");

    let sink = FanoutSink::new(config.format)
        .with_writer(ConsoleWriter)
        .with_writer(report_log);
    Ok(Arc::new(sink))
}

/// SIGINT/SIGTERM cancel the token; a second signal exits immediately.
fn install_signal_handlers(cancel: CancellationToken) -> Result<()> {
    #[cfg(unix)]
    {
        use signal_hook::consts::{SIGINT, SIGTERM};
        use signal_hook::iterator::Signals;

        let mut signals = Signals::new([SIGINT, SIGTERM])?;
        std::thread::spawn(move || {
            for sig in signals.forever() {
                if cancel.is_cancelled() {
                    eprintln!("Forced exit");
                    std::process::exit(130);
                }
                info!("Received signal {}, initiating shutdown...", sig);
                cancel.cancel();
            }
        });
    }

    #[cfg(windows)]
    {
        ctrlc::set_handler(move || {
            if cancel.is_cancelled() {
                eprintln!("Forced exit");
                std::process::exit(130);
            }
            info!("Received Ctrl+C, initiating shutdown...");
            cancel.cancel();
        })?;
    }

    Ok(())
}

/// Typing `q` and Enter requests shutdown. Runs on a plain thread since a
/// blocking stdin read would otherwise hold up runtime shutdown.
fn spawn_quit_listener(cancel: CancellationToken) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) if line.trim().eq_ignore_ascii_case("q") => {
                    info!("Quit requested from console");
                    cancel.cancel();
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Console input unavailable: {}", e);
                    return;
                }
            }
        }
    });
}
