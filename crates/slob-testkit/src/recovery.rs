//! Crash/recovery harness: simulates a process restart and asserts the
//! internal-to-broker order-ID mapping rebuilds without fabricating IDs or
//! double-submitting to the broker.
//!
//! `BrokerOrderMap` itself holds no persistence (see its module docs) — a
//! real deployment persists `(internal_id, broker_id)` pairs to `slob-db`
//! before acknowledging a submit, and rebuilds the map from that table on
//! restart. This harness stands in for that persistence layer.

use slob_execution::{BrokerAdapter, BrokerOrderMap, BrokerSubmitRequest};

/// One row of what a real deployment would have persisted before a crash.
#[derive(Clone, Debug)]
pub struct PersistedMapping {
    pub internal_id: String,
    pub broker_id: String,
}

/// Rebuilds a `BrokerOrderMap` from a persisted snapshot, as a restarted
/// process does before resuming order management.
pub fn rehydrate_order_map(snapshot: &[PersistedMapping]) -> BrokerOrderMap {
    let mut map = BrokerOrderMap::new();
    for row in snapshot {
        map.register(row.internal_id.clone(), row.broker_id.clone());
    }
    map
}

#[derive(Debug, Clone, Default)]
pub struct RecoveryReport {
    pub inspected: usize,
    pub already_known: usize,
    pub resubmitted: usize,
}

/// Reconciles pending bracket-leg requests against a broker after a
/// simulated crash: an id already present in the rehydrated map is trusted
/// and left alone; anything missing is resubmitted through the broker's
/// own idempotent submit path — never fabricated, per `BrokerOrderMap`'s
/// usage contract.
pub fn recover_pending_orders<B: BrokerAdapter>(
    broker: &mut B,
    order_map: &mut BrokerOrderMap,
    pending: &[BrokerSubmitRequest],
) -> anyhow::Result<RecoveryReport> {
    let mut report = RecoveryReport { inspected: pending.len(), ..Default::default() };

    for req in pending {
        if order_map.broker_id(&req.order_id).is_some() {
            report.already_known += 1;
            continue;
        }
        let resp = broker
            .submit_order(req)
            .map_err(|e| anyhow::anyhow!("resubmit failed for {}: {}", req.order_id, e.message))?;
        order_map.register(req.order_id.clone(), resp.broker_order_id);
        report.resubmitted += 1;
    }

    Ok(report)
}
