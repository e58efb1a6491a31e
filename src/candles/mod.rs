//! Candle Builder (component B, §4.B): per-symbol OHLC aggregation
//! cascading M1 → M5 → M15, with disk-backed caching.

pub mod builder;
pub mod cache;
pub mod ring;

pub use builder::CandleBuilder;
pub use ring::CandleRing;
