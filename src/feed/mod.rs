//! Feed Bridge (component A, §4.A): single upstream fan-in, unchanged
//! republish, quotes snapshot, and position-close reconciliation.

pub mod bridge;
pub mod close_detector;
pub mod frame;
pub mod quotes;
pub mod tick_volumes;

pub use bridge::{FeedBridge, FeedBridgeConfig, FeedStats};
pub use close_detector::CloseDetector;
pub use frame::Frame;
pub use quotes::{Quote, QuotesCache};
pub use tick_volumes::TickVolumeTracker;
