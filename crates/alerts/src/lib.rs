//! Spread alerts.
//!
//! This crate provides:
//! - The [`Notifier`] sink trait with Telegram and log implementations
//! - [`NotificationGate`], which applies the threshold and per-sink cooldown
//! - Alert message formatting

pub mod gate;
pub mod message;
pub mod notifier;
pub mod telegram;

pub use gate::{GateConfig, GateReport, NotificationGate, NotifierState};
pub use message::{format_alert_message, Markup};
pub use notifier::{LogNotifier, Notifier, NotifyError};
pub use telegram::TelegramNotifier;
