//! Arbitrage Gossip - headless spread monitor
//!
//! Streams one trading pair from several exchanges and reports when the
//! spread between the highest and lowest quote crosses a threshold.

mod config;

use clap::Parser;
use config::{AppConfig, SinkKind};
use gossip_alerts::{LogNotifier, NotificationGate, Notifier, NotifyError, TelegramNotifier};
use gossip_engine::{EngineError, SpreadMonitor};
use gossip_feeds::for_exchange;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::EnvFilter;

/// Arbitrage Gossip CLI
#[derive(Parser, Debug)]
#[command(name = "arbitrage-gossip")]
#[command(about = "Watch one pair across exchanges and report large spreads", long_about = None)]
pub struct Args {
    /// Base asset, e.g. BTC
    #[arg(short, long)]
    base: String,

    /// Quote asset, e.g. USDT
    #[arg(short, long)]
    quote: String,

    /// Alert threshold in percent
    #[arg(short, long, default_value_t = 1.0, allow_negative_numbers = true)]
    threshold: f64,

    /// Minimum seconds between two alerts to the same sink
    #[arg(long, default_value_t = 60.0)]
    cooldown: f64,

    /// Alert sinks: telegram, log or none (comma separated)
    #[arg(long, default_value = "none")]
    report_to: String,

    /// Exchanges to watch (comma separated), default all
    #[arg(long)]
    exchanges: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Also write logs to a file in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Log file name inside --log-dir, default <PAIR>.log
    #[arg(long)]
    log_file: Option<String>,

    /// Seconds to wait for first prices before evaluating spreads
    #[arg(long, default_value_t = 5.0)]
    warmup: f64,

    /// Aggregation period in milliseconds
    #[arg(long, default_value_t = 1000)]
    tick_ms: u64,
}

/// Install the global subscriber. `RUST_LOG` overrides `level`.
fn init_logging(level: &str, log_path: Option<&PathBuf>) -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (writer, ansi) = match log_path {
        Some(path) => {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            (BoxMakeWriter::new(std::io::stdout.and(Mutex::new(file))), false)
        }
        None => (BoxMakeWriter::new(std::io::stdout), true),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(std::io::Error::other)
}

fn build_notifiers(sinks: &[SinkKind]) -> Result<Vec<Box<dyn Notifier>>, NotifyError> {
    sinks
        .iter()
        .map(|kind| -> Result<Box<dyn Notifier>, NotifyError> {
            match kind {
                SinkKind::Telegram => Ok(Box::new(TelegramNotifier::from_env()?)),
                SinkKind::Log => Ok(Box::new(LogNotifier::new())),
            }
        })
        .collect()
}

/// `1 days 2 hours 3 minutes and 4 seconds`
fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!(
        "{} days {} hours {} minutes and {} seconds",
        secs / 86_400,
        secs % 86_400 / 3_600,
        secs % 3_600 / 60,
        secs % 60
    )
}

/// Cancel `token` on Ctrl-C or SIGTERM.
async fn cancel_on_signal(token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    warn!("Shutdown signal received");
    token.cancel();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    let config = match AppConfig::try_from(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.log_level, config.log_path.as_ref()) {
        eprintln!("Failed to initialise logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Started with: {}", std::env::args().collect::<Vec<_>>().join(" "));
    info!("  Pair: {}", config.pair.slashed());
    info!("  Threshold: {}%", config.gate.threshold_pct);
    info!("  Cooldown: {:?}", config.gate.cooldown);

    let notifiers = match build_notifiers(&config.sinks) {
        Ok(notifiers) => notifiers,
        Err(e) => {
            error!(error = %e, "Failed to set up alert sinks");
            return ExitCode::FAILURE;
        }
    };
    if notifiers.is_empty() {
        info!("  Alerts: none, spreads are only logged");
    }

    let adapters = config
        .exchanges
        .iter()
        .map(|&exchange| for_exchange(exchange, &config.pair))
        .collect();
    let gate = NotificationGate::new(config.gate.clone(), notifiers);
    let monitor = SpreadMonitor::new(config.pair.clone(), config.monitor.clone(), adapters, gate)
        .with_http(reqwest::Client::new());

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let started = std::time::Instant::now();
    let result = monitor.run(cancel).await;
    info!("Ran for {}", format_elapsed(started.elapsed()));

    match result {
        Ok(summary) => {
            info!(
                ticks = summary.ticks,
                notifications = summary.notifications,
                "Monitor finished"
            );
            ExitCode::SUCCESS
        }
        Err(e @ (EngineError::NoListedExchanges(_) | EngineError::PairUnsupported(_))) => {
            error!(pair = %config.pair, "Pair is not supported: {}", e);
            ExitCode::FAILURE
        }
        Err(e) => {
            error!(error = %e, "Monitor failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_args_require_pair() {
        assert!(Args::try_parse_from(["arbitrage-gossip"]).is_err());
        assert!(Args::try_parse_from(["arbitrage-gossip", "-b", "btc"]).is_err());

        let args = Args::try_parse_from(["arbitrage-gossip", "-b", "btc", "-q", "usdt"]).unwrap();
        assert_eq!(args.base, "btc");
        assert_eq!(args.report_to, "none");
        assert_eq!(args.tick_ms, 1000);
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::ZERO), "0 days 0 hours 0 minutes and 0 seconds");
        assert_eq!(
            format_elapsed(Duration::from_secs(86_400 + 2 * 3_600 + 3 * 60 + 4)),
            "1 days 2 hours 3 minutes and 4 seconds"
        );
        assert_eq!(
            format_elapsed(Duration::from_millis(59_999)),
            "0 days 0 hours 0 minutes and 59 seconds"
        );
    }

    #[test]
    fn test_log_sink_needs_no_credentials() {
        let notifiers = build_notifiers(&[SinkKind::Log]).unwrap();
        assert_eq!(notifiers.len(), 1);
        assert_eq!(notifiers[0].name(), "log");
        assert!(build_notifiers(&[]).unwrap().is_empty());
    }
}
