//! Shared value types for the 5/1 SLOB pipeline: bars, consolidations,
//! liquidity signals, setups, trades, shadow predictions, sessions, and the
//! wire-level broker snapshot types the broker adapters deserialize into.
//!
//! This crate holds data only — no detector logic, no IO, no persistence.
//! Every other crate in the workspace depends on it.

pub mod bar;
pub mod broker;
pub mod consolidation;
pub mod liquidity;
pub mod prices;
pub mod session;
pub mod setup;
pub mod shadow;
pub mod trade;

pub use bar::{Bar, BarError, BarStore, BarStoreError};
pub use broker::{BrokerAccount, BrokerFill, BrokerOrder, BrokerPosition, BrokerSnapshot};
pub use consolidation::Consolidation;
pub use liquidity::LiquiditySignal;
pub use prices::{f64_to_micros, micros_to_f64, Direction, PricingError, MICROS_PER_POINT};
pub use session::Session;
pub use setup::{
    Entry, EntryTrigger, Invalidation, InvalidationReason, Liq1Info, NoWickSweep, OrderedF64,
    Setup, SetupState,
};
pub use shadow::ShadowPrediction;
pub use trade::{ExitReason, Trade, TradeResult};
