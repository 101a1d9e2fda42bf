//! slob-broker-live
//!
//! Reference wire adapter for a live broker connection (§6): connect with
//! host/port/client-id/account/readonly, the paper-account sentinel prefix
//! check, numeric error-code classification, and an exponential-backoff
//! reconnect loop with a hard attempt ceiling that falls back to safe mode.
//! Implements `slob_execution::BrokerAdapter` the same way
//! `slob-broker-paper` does, so `slob-engine` treats them interchangeably.

mod adapter;
mod connection;
mod errors;
mod reconnect;

pub use adapter::LiveBroker;
pub use connection::{validate_paper_trading_mode, ConnectionConfig, ConnectionError, PAPER_ACCOUNT_PREFIX};
pub use errors::map_http_status;
pub use reconnect::{drive_reconnect, ReconnectOutcome, ReconnectPolicy};
