use std::collections::BTreeMap;

/// 1e-6 fixed-point scale, matching `slob_schemas::prices::MICROS_PER_POINT`.
pub const MICROS_SCALE: i64 = 1_000_000;

/// Drawdown fraction (of peak equity) at which size is cut and
/// `risk_reduction_active` flips on. Reversible: equity recovering above
/// this line flips it back off.
pub const DRAWDOWN_REDUCTION_THRESHOLD: f64 = 0.15;
/// Drawdown fraction at which trading is permanently disabled for the run.
/// Not reversible — only a manual restart clears `trading_enabled`.
pub const DRAWDOWN_HARD_STOP_THRESHOLD: f64 = 0.20;

pub const FIXED_FRACTIONAL_NORMAL_PCT: f64 = 0.02;
pub const FIXED_FRACTIONAL_REDUCED_PCT: f64 = 0.01;
pub const KELLY_MIN_TRADE_HISTORY: usize = 10;
pub const KELLY_FRACTION_CAP: f64 = 0.5;

/// Risk configuration (thresholds + policies), sourced from the
/// `/risk/*` config keys `slob-config` validates are consumed.
#[derive(Clone, Debug, PartialEq)]
pub struct RiskConfig {
    pub per_trade_pct: f64,
    pub max_drawdown_stop: f64,
    pub reduce_size_at_dd: f64,
    pub use_kelly: bool,
    pub kelly_fraction: f64,
    pub max_gross_exposure: f64,

    /// If rejects in the current window reach this, halt (storm protection).
    pub reject_storm_max_rejects_in_window: u32,
    /// Missing protective stop: if true => FLATTEN+HALT.
    pub missing_protective_stop_flattens: bool,
}

impl RiskConfig {
    pub fn sane_defaults() -> Self {
        Self {
            per_trade_pct: FIXED_FRACTIONAL_NORMAL_PCT,
            max_drawdown_stop: DRAWDOWN_HARD_STOP_THRESHOLD,
            reduce_size_at_dd: DRAWDOWN_REDUCTION_THRESHOLD,
            use_kelly: false,
            kelly_fraction: KELLY_FRACTION_CAP,
            max_gross_exposure: 1.0,
            reject_storm_max_rejects_in_window: 10,
            missing_protective_stop_flattens: true,
        }
    }
}

/// What the caller is asking permission to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestKind {
    NewOrder,
    ModifyOrder,
    Flatten,
}

/// Kill switch categories.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum KillSwitchType {
    MissingProtectiveStop,
    StaleData,
    RejectStorm,
    Desync,
    Manual,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KillSwitchEvent {
    pub kind: KillSwitchType,
    pub code: String,
    pub evidence: BTreeMap<String, String>,
}

impl KillSwitchEvent {
    pub fn new(kind: KillSwitchType) -> Self {
        let code = match kind {
            KillSwitchType::MissingProtectiveStop => "KILL_SWITCH_MISSING_PROTECTIVE_STOP",
            KillSwitchType::StaleData => "KILL_SWITCH_STALE_DATA",
            KillSwitchType::RejectStorm => "KILL_SWITCH_REJECT_STORM",
            KillSwitchType::Desync => "KILL_SWITCH_DESYNC",
            KillSwitchType::Manual => "KILL_SWITCH_MANUAL",
        }
        .to_string();

        Self {
            kind,
            code,
            evidence: BTreeMap::new(),
        }
    }

    pub fn with_evidence(mut self, k: impl Into<String>, v: impl Into<String>) -> Self {
        self.evidence.insert(k.into(), v.into());
        self
    }
}

/// Inputs for one risk evaluation tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RiskInput {
    pub day_id: u32,
    pub equity_micros: i64,
    pub reject_window_id: u32,
    pub request: RequestKind,
    pub is_risk_reducing: bool,
    pub kill_switch: Option<KillSwitchEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RiskDecision {
    pub action: RiskAction,
    pub reason: ReasonCode,
    pub kill_switch: Option<KillSwitchEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RiskAction {
    Allow,
    Reject,
    Halt,
    FlattenAndHalt,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReasonCode {
    Allowed,
    AlreadyHalted,
    DailyLossLimitBreached,
    MaxDrawdownBreached,
    RejectStormBreached,
    KillSwitchTriggered,
    /// Input value failed a basic sanity check (negative equity, overflow).
    BadInput,
}

/// Risk engine state, persisted by `slob-db` between ticks.
#[derive(Clone, Debug, PartialEq)]
pub struct RiskState {
    pub day_id: u32,
    pub day_start_equity_micros: i64,
    pub peak_equity_micros: i64,
    pub current_equity_micros: i64,

    pub halted: bool,
    /// 15% drawdown cuts size; reversible if equity recovers.
    pub risk_reduction_active: bool,
    /// 20% drawdown disables trading for the rest of the run; not reversible.
    pub trading_enabled: bool,

    pub reject_window_id: u32,
    pub reject_count_in_window: u32,
}

impl RiskState {
    pub fn new(day_id: u32, equity_micros: i64, reject_window_id: u32) -> Self {
        Self {
            day_id,
            day_start_equity_micros: equity_micros,
            peak_equity_micros: equity_micros,
            current_equity_micros: equity_micros,
            halted: false,
            risk_reduction_active: false,
            trading_enabled: true,
            reject_window_id,
            reject_count_in_window: 0,
        }
    }

    pub fn record_reject(&mut self, reject_window_id: u32) {
        if reject_window_id != self.reject_window_id {
            self.reject_window_id = reject_window_id;
            self.reject_count_in_window = 0;
        }
        self.reject_count_in_window = self.reject_count_in_window.saturating_add(1);
    }

    pub fn drawdown_fraction(&self, equity_micros: i64) -> f64 {
        if self.peak_equity_micros <= 0 {
            return 0.0;
        }
        let dd = self.peak_equity_micros - equity_micros;
        dd.max(0) as f64 / self.peak_equity_micros as f64
    }
}
