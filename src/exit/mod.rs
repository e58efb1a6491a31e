//! Exit FSM (component G, §4.G): drives managed positions through
//! partial-close/BE/trail milestones or a full close, a command bus that
//! paces outbound broker commands, a periodic timeout scan, the Sentry
//! safety monitor, and the entitlement tier store.

pub mod command_bus;
pub mod entitlement;
pub mod fsm;
pub mod sentry;
pub mod state_store;
pub mod timers;

pub use command_bus::{CommandBus, CommandSink};
pub use entitlement::{tier_features, EntitlementManager, TierFeatures, TierHistoryEntry, TIER_BEGINNER, TIER_PLUS, TIER_PRO};
pub use fsm::{ExitFsm, MarketData};
pub use sentry::{Sentry, Severity, Violation};
pub use state_store::StateStore;
pub use timers::scan_timeouts;
