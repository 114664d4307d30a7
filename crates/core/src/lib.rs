//! Core data types for the spread monitor.

pub mod exchange;
pub mod pair;
pub mod price;
pub mod spread;

pub use exchange::*;
pub use pair::*;
pub use price::*;
pub use spread::*;
