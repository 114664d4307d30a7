//! Alert message formatting.

use chrono::{DateTime, Utc};
use gossip_core::{SpreadSnapshot, TradingPair};

/// Output flavour of [`format_alert_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Markup {
    /// Telegram HTML parse mode.
    Html,
    Plain,
}

/// Format price with appropriate precision based on magnitude.
pub fn format_price(price: f64) -> String {
    let abs_price = price.abs();
    if abs_price >= 1000.0 {
        format!("{:.2}", price)
    } else if abs_price >= 1.0 {
        format!("{:.4}", price)
    } else if abs_price >= 0.01 {
        format!("{:.6}", price)
    } else {
        format!("{:.10}", price)
    }
}

/// Format a spread as an alert message.
pub fn format_alert_message(
    pair: &TradingPair,
    snapshot: &SpreadSnapshot,
    host: &str,
    at: DateTime<Utc>,
    markup: Markup,
) -> String {
    let bold = |s: &str| match markup {
        Markup::Html => format!("<b>{}</b>", s),
        Markup::Plain => s.to_string(),
    };

    format!(
        "🏃 {}\n\n\
         {} {}\n\
         {} ({}): {}\n\
         {} ({}): {}\n\
         {} {}\n\
         {} {:.4}%\n\n\
         {} · {}",
        bold("Spread alert"),
        bold("Pair:"),
        pair.slashed(),
        bold("Lowest"),
        snapshot.min.exchange,
        format_price(snapshot.min.price),
        bold("Highest"),
        snapshot.max.exchange,
        format_price(snapshot.max.price),
        bold("Difference:"),
        format_price(snapshot.abs_diff),
        bold("Difference in %:"),
        snapshot.pct_diff,
        host,
        at.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

/// Name of this machine, for telling alerts from several instances apart.
pub fn host_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-host".to_string())
}
