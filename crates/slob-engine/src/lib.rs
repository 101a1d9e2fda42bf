//! slob-engine
//!
//! `LiveTradingEngine`: the outer loop of the live system (§4.14). Drives a
//! `BrokerGateway` message stream through tick-to-bar aggregation, pattern
//! detection (`slob-patterns`), the setup lifecycle state machine
//! (`slob-execution`), classifier-gated risk sizing
//! (`slob-features`/`slob-classifier`/`slob-risk`), and order submission
//! (`slob-execution`), the same pipeline `slob-backtest` replays from a
//! historical `BarStore` instead of a live feed.
//!
//! This crate is synchronous on purpose: everything it calls directly is
//! pure logic or blocking IO. `slob-db` is async and never appears here —
//! the engine reports every state change an async host needs to persist as
//! an [`EngineEvent`], rather than taking a dependency on the database
//! layer itself.

mod aggregator;
mod engine;
mod session;
mod types;

pub use aggregator::{AggregatorError, BarAggregator};
pub use engine::LiveTradingEngine;
pub use session::day_id;
pub use types::{EngineConfig, EngineEvent, GatewayMessage, OrderLookup, Tick};
