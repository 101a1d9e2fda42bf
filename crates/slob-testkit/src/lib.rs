//! Shared test harness: deterministic bar fixtures, a paper-broker-executor
//! fixture constructor, and a crash/recovery harness for the internal-to-
//! broker order-ID mapping. Consumed by integration tests across the
//! workspace that need the same deterministic setup without duplicating it.

use anyhow::{Context, Result};
use std::fs;

pub mod bars;
pub mod broker_fixture;
pub mod recovery;

pub use bars::{load_bars_csv, synthetic_bar_sequence};
pub use broker_fixture::paper_executor;
pub use recovery::{recover_pending_orders, rehydrate_order_map, PersistedMapping, RecoveryReport};

/// Loads a broker account snapshot fixture (used by reconciliation-style
/// tests that assert against a known account/position state).
pub fn load_broker_snapshot_json(path: &str) -> Result<slob_schemas::BrokerSnapshot> {
    let s = fs::read_to_string(path).with_context(|| format!("read snapshot: {path}"))?;
    let snap: slob_schemas::BrokerSnapshot = serde_json::from_str(&s).context("parse snapshot json")?;
    Ok(snap)
}
