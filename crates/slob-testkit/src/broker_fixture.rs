//! Deterministic paper-broker fixture, shared so scenario tests don't each
//! wire up their own `OrderExecutor<PaperBroker>` by hand.

use slob_broker_paper::PaperBroker;
use slob_execution::{ExecutorConfig, OrderExecutor};

/// A `PaperBroker` behind an `OrderExecutor` with trading enabled and
/// native bracket support — the configuration most scenario tests want.
pub fn paper_executor(starting_balance_micros: i64) -> OrderExecutor<PaperBroker> {
    OrderExecutor::new(ExecutorConfig::default(), PaperBroker::new(starting_balance_micros))
}
