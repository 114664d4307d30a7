use gossip_core::TradingPair;
use gossip_feeds::RegistryError;
use thiserror::Error;

/// Errors that end a monitoring run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no exchange lists {0}")]
    NoListedExchanges(TradingPair),

    #[error("no exchange delivered a price for {0} during warmup")]
    PairUnsupported(TradingPair),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
