//! slob-execution
//!
//! Turns a sized, risk-approved bracket order into broker submissions:
//! six ordered pre-submission checks (§4.12), atomic-bracket or
//! manual-fallback construction, retry/backoff, and per-leg OMS lifecycle
//! tracking. Talks to brokers only through the `BrokerAdapter` trait —
//! `slob-broker-paper`/`slob-broker-live` supply the concrete adapters.
//!
//! Also owns the setup-lifecycle state machine ([`SetupStateMachine`]) and
//! its tracker ([`SetupTracker`]), which drive a candidate from
//! `LseReady` through a completed or invalidated trade — distinct from the
//! broker-order OMS lifecycle in `oms::state_machine`.

mod broker;
mod executor;
mod heartbeat;
mod id_map;
mod oms;
mod setup_state_machine;
mod setup_tracker;
mod types;

pub use broker::{disables_trading, requires_reconnect, severity, BrokerAdapter, BrokerCancelResponse, BrokerErrorEvent, ErrorSeverity, BrokerSubmitRequest, BrokerSubmitResponse, OrderRouter};
pub use executor::{BracketSubmission, FillWaiter, OrderExecutor};
pub use heartbeat::{HeartbeatGuard, HeartbeatHealth};
pub use id_map::BrokerOrderMap;
pub use oms::state_machine::{OmsEvent, OmsOrder, OrderState, TransitionError};
pub use setup_state_machine::{SetupEvent, SetupStateMachine, SetupTransitionError};
pub use setup_tracker::SetupTracker;
pub use types::{BracketLeg, BracketOrderRequest, ExecutorConfig, OrderRef, PreSubmitRefusal, Side};
