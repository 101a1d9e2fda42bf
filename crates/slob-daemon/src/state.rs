//! Shared runtime state for slob-daemon.
//!
//! All types here are `Clone`-able (via `Arc` or copy). Handlers receive
//! `State<Arc<AppState>>` from Axum; this module owns nothing async itself.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// BusMsg — SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Status(StatusSnapshot),
    LogLine { level: String, msg: String },
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health / status responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// StatusSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time snapshot of daemon state, returned by GET /v1/status and
/// carried inside SSE `status` events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub daemon_uptime_secs: u64,
    pub active_run_id: Option<Uuid>,
    /// "idle" | "running" | "halted"
    pub state: String,
    pub notes: Option<String>,
    /// Reflects `RiskGateState::is_execution_blocked()` negation: true = armed.
    pub integrity_armed: bool,
}

// ---------------------------------------------------------------------------
// RiskGateState — the daemon's own fail-closed dispatch gate
// ---------------------------------------------------------------------------

/// Operator arm/disarm gate sitting in front of `POST /v1/run/start`.
///
/// Boots disarmed on every process start (§5: "existing positions left as-is,
/// operator notified" — a fresh process never auto-resumes live dispatch).
/// An explicit `POST /v1/integrity/arm` is the only way to clear either flag;
/// `halted` is set by `run/halt` and is otherwise sticky, same shape as
/// `slob_risk::RiskState::halted`'s "not reversible without operator action"
/// contract, but this is a daemon-local dispatch gate, not the risk engine
/// itself — a disarmed daemon refuses to call into anything, whereas a
/// halted `RiskManager` still runs, just always returns `Reject`/`Halt`.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct RiskGateState {
    pub disarmed: bool,
    pub halted: bool,
}

impl RiskGateState {
    /// Fail-closed: a freshly booted daemon has never been armed.
    pub fn boot() -> Self {
        Self { disarmed: true, halted: false }
    }

    pub fn is_execution_blocked(&self) -> bool {
        self.disarmed || self.halted
    }

    /// The sole escape from any blocked state — clears both flags.
    pub fn arm(&mut self) {
        self.disarmed = false;
        self.halted = false;
    }

    pub fn disarm(&mut self) {
        self.disarmed = true;
    }

    pub fn halt(&mut self) {
        self.halted = true;
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    /// Static build metadata.
    pub build: BuildInfo,
    /// Mutable run/status state.
    pub status: Arc<RwLock<StatusSnapshot>>,
    /// Dispatch gate (arm / disarm / halt).
    pub risk_gate: Arc<RwLock<RiskGateState>>,
    /// Latest broker account/position/order/fill snapshot, if one has been
    /// captured. `None` until the first successful poll (or, in dev, an
    /// injected snapshot) — see `routes::trading_*`.
    pub broker_snapshot: Arc<RwLock<Option<slob_schemas::BrokerSnapshot>>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);

        let initial_status = StatusSnapshot {
            daemon_uptime_secs: uptime_secs(),
            active_run_id: None,
            state: "idle".to_string(),
            notes: Some("placeholder status; wire run loop next".to_string()),
            integrity_armed: false, // fail-closed at boot
        };

        Self {
            bus,
            build: BuildInfo { service: "slob-daemon", version: env!("CARGO_PKG_VERSION") },
            status: Arc::new(RwLock::new(initial_status)),
            risk_gate: Arc::new(RwLock::new(RiskGateState::boot())),
            broker_snapshot: Arc::new(RwLock::new(None)),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START.get_or_init(std::time::Instant::now).elapsed().as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}
