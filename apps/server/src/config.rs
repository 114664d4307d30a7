//! Application configuration.

use crate::Args;
use gossip_alerts::GateConfig;
use gossip_core::{Exchange, PairError, TradingPair};
use gossip_engine::MonitorConfig;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Pair(#[from] PairError),

    #[error("unknown sink {0:?}, expected telegram, log or none")]
    UnknownSink(String),

    #[error(transparent)]
    UnknownExchange(#[from] gossip_core::UnknownExchange),

    #[error("no exchange selected")]
    NoExchanges,

    #[error("{name} must be a non-negative number, got {value}")]
    InvalidNumber { name: &'static str, value: f64 },

    #[error("tick interval must be positive")]
    ZeroTick,
}

/// Where alerts go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Telegram,
    Log,
}

/// Everything the binary needs, validated.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub pair: TradingPair,
    pub exchanges: Vec<Exchange>,
    pub sinks: Vec<SinkKind>,
    pub gate: GateConfig,
    pub monitor: MonitorConfig,
    pub log_level: String,
    /// Log file next to stdout, if requested.
    pub log_path: Option<PathBuf>,
}

impl TryFrom<&Args> for AppConfig {
    type Error = ConfigError;

    fn try_from(args: &Args) -> Result<Self, Self::Error> {
        let pair = TradingPair::new(&args.base, &args.quote)?;

        let threshold_pct = non_negative("threshold", args.threshold)?;
        let cooldown = seconds("cooldown", args.cooldown)?;
        let warmup = seconds("warmup", args.warmup)?;
        if args.tick_ms == 0 {
            return Err(ConfigError::ZeroTick);
        }

        let log_path = args.log_dir.as_ref().map(|dir| {
            let file = args
                .log_file
                .clone()
                .unwrap_or_else(|| format!("{}.log", pair.merged()));
            dir.join(file)
        });

        Ok(Self {
            exchanges: parse_exchanges(args.exchanges.as_deref())?,
            sinks: parse_sinks(&args.report_to)?,
            gate: GateConfig {
                threshold_pct,
                cooldown,
                ..GateConfig::default()
            },
            monitor: MonitorConfig {
                warmup,
                tick: Duration::from_millis(args.tick_ms),
                ..MonitorConfig::default()
            },
            log_level: args.log_level.clone(),
            log_path,
            pair,
        })
    }
}

/// Seconds as a `Duration`; negative, NaN or overflowing values are rejected.
fn seconds(name: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::InvalidNumber { name, value })
}

fn non_negative(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidNumber { name, value })
    }
}

/// Parse a comma list of sinks. `none` alone means no sinks.
pub fn parse_sinks(raw: &str) -> Result<Vec<SinkKind>, ConfigError> {
    let mut sinks = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let kind = match name.to_lowercase().as_str() {
            "none" => continue,
            "telegram" => SinkKind::Telegram,
            "log" => SinkKind::Log,
            _ => return Err(ConfigError::UnknownSink(name.to_string())),
        };
        if !sinks.contains(&kind) {
            sinks.push(kind);
        }
    }
    Ok(sinks)
}

/// Parse a comma list of exchanges, defaulting to all of them.
pub fn parse_exchanges(raw: Option<&str>) -> Result<Vec<Exchange>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(Exchange::all().to_vec());
    };

    let mut exchanges = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let exchange: Exchange = name.parse()?;
        if !exchanges.contains(&exchange) {
            exchanges.push(exchange);
        }
    }
    if exchanges.is_empty() {
        return Err(ConfigError::NoExchanges);
    }
    Ok(exchanges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    fn config(argv: &[&str]) -> Result<AppConfig, ConfigError> {
        let args = Args::try_parse_from(argv).unwrap();
        AppConfig::try_from(&args)
    }

    #[test]
    fn test_parse_sinks() {
        assert_eq!(parse_sinks("none").unwrap(), vec![]);
        assert_eq!(parse_sinks("log").unwrap(), vec![SinkKind::Log]);
        assert_eq!(
            parse_sinks("Telegram, log,telegram").unwrap(),
            vec![SinkKind::Telegram, SinkKind::Log]
        );
        assert!(matches!(parse_sinks("twitter"), Err(ConfigError::UnknownSink(s)) if s == "twitter"));
    }

    #[test]
    fn test_parse_exchanges() {
        assert_eq!(parse_exchanges(None).unwrap(), Exchange::all().to_vec());
        assert_eq!(
            parse_exchanges(Some("kucoin,BINANCE, kucoin")).unwrap(),
            vec![Exchange::Kucoin, Exchange::Binance]
        );
        assert!(matches!(parse_exchanges(Some("ftx")), Err(ConfigError::UnknownExchange(_))));
        assert!(matches!(parse_exchanges(Some(" , ")), Err(ConfigError::NoExchanges)));
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&["arbitrage-gossip", "-b", "btc", "-q", "usdt"]).unwrap();

        assert_eq!(cfg.pair.merged(), "BTCUSDT");
        assert_eq!(cfg.exchanges.len(), 5);
        assert!(cfg.sinks.is_empty());
        assert_eq!(cfg.gate.threshold_pct, 1.0);
        assert_eq!(cfg.gate.cooldown, Duration::from_secs(60));
        assert_eq!(cfg.monitor.warmup, Duration::from_secs(5));
        assert_eq!(cfg.monitor.tick, Duration::from_secs(1));
        assert_eq!(cfg.log_path, None);
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            "arbitrage-gossip",
            "--base",
            "eth",
            "--quote",
            "usdt",
            "-t",
            "0.5",
            "--cooldown",
            "1.5",
            "--report-to",
            "log",
            "--exchanges",
            "bybit,huobi",
            "--tick-ms",
            "250",
            "--log-dir",
            "/var/log/gossip",
        ])
        .unwrap();

        assert_eq!(cfg.gate.threshold_pct, 0.5);
        assert_eq!(cfg.gate.cooldown, Duration::from_millis(1500));
        assert_eq!(cfg.sinks, vec![SinkKind::Log]);
        assert_eq!(cfg.exchanges, vec![Exchange::Bybit, Exchange::Huobi]);
        assert_eq!(cfg.monitor.tick, Duration::from_millis(250));
        assert_eq!(cfg.log_path, Some(PathBuf::from("/var/log/gossip/ETHUSDT.log")));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config(&["arbitrage-gossip", "-b", "btc", "-q", "usdt", "-t", "-1"]),
            Err(ConfigError::InvalidNumber { name: "threshold", .. })
        ));
        assert!(matches!(
            config(&["arbitrage-gossip", "-b", "btc", "-q", "usdt", "--cooldown", "1e20"]),
            Err(ConfigError::InvalidNumber { name: "cooldown", .. })
        ));
        assert!(matches!(
            config(&["arbitrage-gossip", "-b", "btc", "-q", "usdt", "--warmup", "inf"]),
            Err(ConfigError::InvalidNumber { name: "warmup", .. })
        ));
        assert!(matches!(
            config(&["arbitrage-gossip", "-b", "btc", "-q", "usdt", "--tick-ms", "0"]),
            Err(ConfigError::ZeroTick)
        ));
        assert!(matches!(
            config(&["arbitrage-gossip", "-b", "", "-q", "usdt"]),
            Err(ConfigError::Pair(_))
        ));
    }
}
