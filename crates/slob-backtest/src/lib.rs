//! slob-backtest
//!
//! BacktestDriver — spec.md §4.16: deterministic replay of historical bars
//! through the same `PatternFinder` + `SetupStateMachine`/`SetupTracker`
//! logic the live engine uses, producing a `BacktestReport` a caller
//! (`slob-artifacts`) writes out as CSV/JSON run artifacts.
//!
//! - Deterministic replay (same bars + config => identical results).
//! - No lookahead (incomplete bars are rejected, never skipped silently).
//! - Conservative, opt-in slippage; commissions and partial fills are out
//!   of scope for the fidelity contract (spec.md §4.16).

mod corporate_actions;
mod engine;
mod loader;
pub mod types;

pub use corporate_actions::{CorporateActionPolicy, ForbidEntry};
pub use engine::{BacktestEngine, BacktestError};
pub use loader::{load_csv_file, parse_csv_bars, LoadError};
pub use types::{BacktestBar, BacktestConfig, BacktestReport, Fill, StressProfile};
