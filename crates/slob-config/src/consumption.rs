use anyhow::{bail, Result};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Backtest,
    Paper,
    Live,
}

/// Alias kept for readability at call sites that report on config usage
/// rather than select a runtime behavior.
pub type ConfigMode = RunMode;

pub fn consumed_pointers(mode: RunMode) -> &'static [&'static str] {
    match mode {
        RunMode::Backtest => BACKTEST,
        RunMode::Paper => PAPER,
        RunMode::Live => LIVE,
    }
}

static COMMON_RISK: &[&str] = &[
    "/risk/per_trade_pct",
    "/risk/max_drawdown_stop",
    "/risk/reduce_size_at_dd",
    "/risk/use_kelly",
    "/risk/kelly_fraction",
    "/risk/max_gross_exposure",
];

static BACKTEST: &[&str] = &[
    "/runtime/mode",
    "/engine",
    "/session",
    "/patterns",
    "/features",
    "/classifier",
    "/risk/per_trade_pct",
    "/risk/max_drawdown_stop",
    "/risk/reduce_size_at_dd",
    "/risk/use_kelly",
    "/risk/kelly_fraction",
    "/risk/max_gross_exposure",
    "/backtest",
];

static PAPER: &[&str] = &[
    "/runtime/mode",
    "/engine",
    "/session",
    "/patterns",
    "/features",
    "/classifier",
    "/risk/per_trade_pct",
    "/risk/max_drawdown_stop",
    "/risk/reduce_size_at_dd",
    "/risk/use_kelly",
    "/risk/kelly_fraction",
    "/risk/max_gross_exposure",
    "/broker",
    "/execution",
];

static LIVE: &[&str] = &[
    "/runtime/mode",
    "/engine",
    "/session",
    "/patterns",
    "/features",
    "/classifier",
    "/risk/per_trade_pct",
    "/risk/max_drawdown_stop",
    "/risk/reduce_size_at_dd",
    "/risk/use_kelly",
    "/risk/kelly_fraction",
    "/risk/max_gross_exposure",
    "/broker",
    "/execution",
    "/dashboard",
];

#[allow(dead_code)]
fn common_risk_pointers() -> &'static [&'static str] {
    COMMON_RISK
}

// ---------------------------------------------------------------------------
// Unused-key reporting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Default)]
pub struct UnusedKeysReport {
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeysReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Walk `config_json`'s leaves and compare each against `mode`'s consumed
/// pointer registry. A leaf is consumed if it exactly matches a registered
/// pointer, or sits under one as a subtree (boundary-aware: `/risk/x`
/// consumes `/risk/x/y` but not `/risk/x_extra`).
///
/// `UnusedKeyPolicy::Fail` turns a non-empty report into a `CONFIG_UNUSED_KEYS`
/// error; `Warn` always returns `Ok`, leaving the caller to log the report.
pub fn report_unused_keys(
    mode: ConfigMode,
    config_json: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeysReport> {
    let registry = consumed_pointers(mode);
    let mut leaves = Vec::new();
    collect_leaf_pointers(config_json, String::new(), &mut leaves);
    leaves.sort();

    let unused_leaf_pointers: Vec<String> = leaves
        .into_iter()
        .filter(|leaf| !is_consumed(leaf, registry))
        .collect();

    let report = UnusedKeysReport {
        unused_leaf_pointers,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "CONFIG_UNUSED_KEYS: {} unused config key(s) under mode {:?}: {:?}",
            report.unused_leaf_pointers.len(),
            mode,
            report.unused_leaf_pointers,
        );
    }

    Ok(report)
}

fn is_consumed(leaf: &str, registry: &[&str]) -> bool {
    registry
        .iter()
        .any(|c| leaf == *c || leaf.starts_with(&format!("{c}/")))
}

fn collect_leaf_pointers(v: &Value, prefix: String, out: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            if map.is_empty() {
                out.push(prefix);
                return;
            }
            for (k, v) in map {
                collect_leaf_pointers(v, format!("{prefix}/{k}"), out);
            }
        }
        _ => out.push(prefix),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_aware_prefix_match_excludes_sibling_suffix() {
        assert!(is_consumed("/risk/max_gross_exposure", COMMON_RISK));
        assert!(!is_consumed("/risk/max_gross_exposure_extra", COMMON_RISK));
    }

    #[test]
    fn subtree_match_covers_nested_leaf() {
        assert!(is_consumed("/broker/keys_env/api_key", &["/broker"]));
    }
}
