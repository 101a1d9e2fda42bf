//! `FeatureEngineer`: turns a completed `Setup` plus its bar context into a
//! fixed 37-dimensional feature vector for `slob-classifier`.
//!
//! Every feature is a ratio, a score already in `[0, 1]`, or a time/volume
//! quantity untouched by price scale — doubling every price in the input
//! (open/high/low/close and every setup price field) must leave every
//! feature invariant within ~5%, which the `stationarity` test below checks
//! directly rather than asserting it by convention.

use serde::{Deserialize, Serialize};
use slob_patterns::AtrCalculator;
use slob_schemas::{Bar, Setup};

pub const FEATURE_COUNT: usize = 37;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "body_to_range_ratio",
    "upper_wick_ratio",
    "lower_wick_ratio",
    "close_position_in_range",
    "return_1bar",
    "return_3bar",
    "return_5bar",
    "gap_to_prev_close_ratio",
    "atr_to_close_ratio",
    "range_to_atr_ratio",
    "avg_range_5_to_atr_ratio",
    "true_range_to_atr_ratio",
    "rolling_return_std_10",
    "consolidation_range_to_atr_ratio",
    "consolidation_tightness",
    "volume_ratio_to_avg10",
    "volume_zscore_10",
    "volume_percentile_20",
    "relative_volume_at_sweep",
    "obv_slope_10",
    "volume_trend_3bar",
    "relative_volume_at_liq1",
    "liq1_confidence",
    "sweep_confidence",
    "consolidation_duration_norm",
    "consolidation_touch_count_norm",
    "break_distance_to_atr_ratio",
    "retracement_fraction",
    "risk_reward_ratio",
    "sl_distance_to_atr_ratio",
    "bars_since_session_open_norm",
    "bars_since_liq1_norm",
    "time_of_day_sin",
    "time_of_day_cos",
    "day_of_week_frac",
    "lse_range_to_atr_ratio",
    "distance_to_lse_extreme_ratio",
];

/// Reference normalization constant for bar-count features; not a hard cap,
/// just the scale that keeps these features in a comparable range to the
/// ratio-valued ones.
const DURATION_NORM_REFERENCE: f64 = 30.0;
const BARS_SINCE_LIQ1_NORM_REFERENCE: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureError {
    /// The setup hasn't reached far enough through the pipeline for every
    /// stage field (`liq1`, `consolidation`, `sweep`, `entry_trigger`) to be
    /// populated yet.
    IncompleteSetup,
    EntryIndexOutOfRange,
}

impl std::fmt::Display for FeatureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureError::IncompleteSetup => {
                write!(f, "setup is missing a stage required to compute features")
            }
            FeatureError::EntryIndexOutOfRange => write!(f, "entry trigger index out of bar range"),
        }
    }
}

impl std::error::Error for FeatureError {}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Features {
    pub body_to_range_ratio: f64,
    pub upper_wick_ratio: f64,
    pub lower_wick_ratio: f64,
    pub close_position_in_range: f64,
    pub return_1bar: f64,
    pub return_3bar: f64,
    pub return_5bar: f64,
    pub gap_to_prev_close_ratio: f64,
    pub atr_to_close_ratio: f64,
    pub range_to_atr_ratio: f64,
    pub avg_range_5_to_atr_ratio: f64,
    pub true_range_to_atr_ratio: f64,
    pub rolling_return_std_10: f64,
    pub consolidation_range_to_atr_ratio: f64,
    pub consolidation_tightness: f64,
    pub volume_ratio_to_avg10: f64,
    pub volume_zscore_10: f64,
    pub volume_percentile_20: f64,
    pub relative_volume_at_sweep: f64,
    pub obv_slope_10: f64,
    pub volume_trend_3bar: f64,
    pub relative_volume_at_liq1: f64,
    pub liq1_confidence: f64,
    pub sweep_confidence: f64,
    pub consolidation_duration_norm: f64,
    pub consolidation_touch_count_norm: f64,
    pub break_distance_to_atr_ratio: f64,
    pub retracement_fraction: f64,
    pub risk_reward_ratio: f64,
    pub sl_distance_to_atr_ratio: f64,
    pub bars_since_session_open_norm: f64,
    pub bars_since_liq1_norm: f64,
    pub time_of_day_sin: f64,
    pub time_of_day_cos: f64,
    pub day_of_week_frac: f64,
    pub lse_range_to_atr_ratio: f64,
    pub distance_to_lse_extreme_ratio: f64,
}

impl Features {
    pub fn to_vector(&self) -> [f64; FEATURE_COUNT] {
        [
            self.body_to_range_ratio,
            self.upper_wick_ratio,
            self.lower_wick_ratio,
            self.close_position_in_range,
            self.return_1bar,
            self.return_3bar,
            self.return_5bar,
            self.gap_to_prev_close_ratio,
            self.atr_to_close_ratio,
            self.range_to_atr_ratio,
            self.avg_range_5_to_atr_ratio,
            self.true_range_to_atr_ratio,
            self.rolling_return_std_10,
            self.consolidation_range_to_atr_ratio,
            self.consolidation_tightness,
            self.volume_ratio_to_avg10,
            self.volume_zscore_10,
            self.volume_percentile_20,
            self.relative_volume_at_sweep,
            self.obv_slope_10,
            self.volume_trend_3bar,
            self.relative_volume_at_liq1,
            self.liq1_confidence,
            self.sweep_confidence,
            self.consolidation_duration_norm,
            self.consolidation_touch_count_norm,
            self.break_distance_to_atr_ratio,
            self.retracement_fraction,
            self.risk_reward_ratio,
            self.sl_distance_to_atr_ratio,
            self.bars_since_session_open_norm,
            self.bars_since_liq1_norm,
            self.time_of_day_sin,
            self.time_of_day_cos,
            self.day_of_week_frac,
            self.lse_range_to_atr_ratio,
            self.distance_to_lse_extreme_ratio,
        ]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEngineer {
    pub atr: AtrCalculator,
}

impl FeatureEngineer {
    /// Computes the feature vector for `setup` as of its entry-trigger bar.
    /// Requires `liq1`, `consolidation`, `sweep`, and `entry_trigger` to all
    /// be populated — anything earlier in the pipeline can't be scored yet.
    pub fn compute(&self, bars: &[Bar], session_start_idx: usize, setup: &Setup) -> Result<Features, FeatureError> {
        let liq1 = setup.liq1.ok_or(FeatureError::IncompleteSetup)?;
        let consol = setup.consolidation.ok_or(FeatureError::IncompleteSetup)?;
        let sweep = setup.sweep.ok_or(FeatureError::IncompleteSetup)?;
        let trigger = setup.entry_trigger.ok_or(FeatureError::IncompleteSetup)?;
        let entry_idx = trigger.idx;
        if entry_idx >= bars.len() || entry_idx == 0 {
            return Err(FeatureError::EntryIndexOutOfRange);
        }

        let entry_bar = &bars[entry_idx];
        let atr = self.atr.atr_at(bars, entry_idx);
        let atr_f = atr.value_micros.max(1) as f64;

        let range = entry_bar.range().max(1) as f64;
        let body_to_range_ratio = entry_bar.body() as f64 / range;
        let upper_wick_ratio = entry_bar.upper_wick() as f64 / range;
        let lower_wick_ratio = entry_bar.lower_wick() as f64 / range;
        let close_position_in_range = (entry_bar.close - entry_bar.low) as f64 / range;

        let ret = |n: usize| -> f64 {
            if entry_idx < n {
                return 0.0;
            }
            let prev = bars[entry_idx - n].close as f64;
            if prev == 0.0 {
                return 0.0;
            }
            (entry_bar.close as f64 - prev) / prev
        };
        let return_1bar = ret(1);
        let return_3bar = ret(3);
        let return_5bar = ret(5);

        let prev_close = bars[entry_idx - 1].close as f64;
        let gap_to_prev_close_ratio = if prev_close != 0.0 {
            (entry_bar.open as f64 - prev_close) / prev_close
        } else {
            0.0
        };

        let atr_to_close_ratio = atr_f / entry_bar.close.max(1) as f64;
        let range_to_atr_ratio = range / atr_f;

        let avg_range_5 = {
            let start = entry_idx.saturating_sub(4);
            let window = &bars[start..=entry_idx];
            window.iter().map(|b| b.range() as f64).sum::<f64>() / window.len() as f64
        };
        let avg_range_5_to_atr_ratio = avg_range_5 / atr_f;

        let prev_bar = &bars[entry_idx - 1];
        let true_range = (entry_bar.high - entry_bar.low)
            .max((entry_bar.high - prev_bar.close).abs())
            .max((entry_bar.low - prev_bar.close).abs()) as f64;
        let true_range_to_atr_ratio = true_range / atr_f;

        let rolling_return_std_10 = {
            let n = 10usize.min(entry_idx);
            if n < 2 {
                0.0
            } else {
                let returns: Vec<f64> = (entry_idx - n + 1..=entry_idx)
                    .filter(|&i| i > 0)
                    .map(|i| {
                        let p0 = bars[i - 1].close as f64;
                        if p0 == 0.0 {
                            0.0
                        } else {
                            (bars[i].close as f64 - p0) / p0
                        }
                    })
                    .collect();
                std_dev(&returns)
            }
        };

        let consolidation_range_to_atr_ratio = consol.range_atr_ratio();
        let consolidation_tightness = consol.tightness;

        let volume_window = |n: usize, end: usize| -> Vec<f64> {
            let start = end.saturating_sub(n);
            bars[start..end].iter().map(|b| b.volume as f64).collect()
        };
        let vol10 = volume_window(10, entry_idx);
        let avg_vol10 = mean(&vol10).max(1.0);
        let volume_ratio_to_avg10 = entry_bar.volume as f64 / avg_vol10;
        let volume_zscore_10 = {
            let sd = std_dev(&vol10);
            if sd > 0.0 {
                (entry_bar.volume as f64 - avg_vol10) / sd
            } else {
                0.0
            }
        };
        let vol20 = volume_window(20, entry_idx);
        let volume_percentile_20 = percentile_rank(&vol20, entry_bar.volume as f64);

        let sweep_bar = &bars[sweep.idx];
        let sweep_vol_window = volume_window(10, sweep.idx);
        let relative_volume_at_sweep = sweep_bar.volume as f64 / mean(&sweep_vol_window).max(1.0);

        let obv_slope_10 = {
            let n = 10usize.min(entry_idx);
            if n < 2 {
                0.0
            } else {
                let mut obv = 0.0;
                let mut first = None;
                for i in (entry_idx - n + 1)..=entry_idx {
                    if i == 0 {
                        continue;
                    }
                    let sign = if bars[i].close >= bars[i - 1].close { 1.0 } else { -1.0 };
                    obv += sign * bars[i].volume as f64;
                    if first.is_none() {
                        first = Some(obv);
                    }
                }
                let span = avg_vol10 * n as f64;
                if span > 0.0 {
                    (obv - first.unwrap_or(0.0)) / span
                } else {
                    0.0
                }
            }
        };

        let volume_trend_3bar = {
            if entry_idx < 6 {
                0.0
            } else {
                let recent: f64 = bars[entry_idx - 2..=entry_idx].iter().map(|b| b.volume as f64).sum::<f64>() / 3.0;
                let prior: f64 = bars[entry_idx - 5..entry_idx - 2].iter().map(|b| b.volume as f64).sum::<f64>() / 3.0;
                if prior > 0.0 {
                    (recent - prior) / prior
                } else {
                    0.0
                }
            }
        };

        let liq1_bar = &bars[liq1.idx];
        let liq1_vol_window = volume_window(10, liq1.idx);
        let relative_volume_at_liq1 = liq1_bar.volume as f64 / mean(&liq1_vol_window).max(1.0);

        let liq1_confidence = liq1.confidence.0;
        let sweep_confidence = sweep.confidence.0;
        let consolidation_duration_norm = consol.duration as f64 / DURATION_NORM_REFERENCE;
        let consolidation_touch_count_norm =
            (consol.touch_count_high + consol.touch_count_low) as f64 / (2.0 * consol.duration.max(1) as f64);

        let break_distance_to_atr_ratio = (liq1.price - liq1.level).abs() as f64 / atr_f;

        let retracement_fraction = {
            let retraced = match setup.direction {
                slob_schemas::Direction::Long => sweep_bar.low - entry_bar.low,
                slob_schemas::Direction::Short => entry_bar.high - sweep_bar.high,
            };
            retraced as f64 / consol.range_micros.max(1) as f64
        };

        let risk_reward_ratio = setup.risk_reward_ratio.map(|r| r.0).unwrap_or(0.0);
        let sl_distance_to_atr_ratio = setup
            .risk_points
            .map(|r| r as f64 / atr_f)
            .unwrap_or(0.0);

        let total_session_bars = (bars.len() - session_start_idx).max(1) as f64;
        let bars_since_session_open_norm = (entry_idx - session_start_idx) as f64 / total_session_bars;
        let bars_since_liq1_norm = (entry_idx - liq1.idx) as f64 / BARS_SINCE_LIQ1_NORM_REFERENCE;

        let seconds_since_midnight = entry_bar.ts_close_utc.time().num_seconds_from_midnight() as f64;
        let day_fraction = seconds_since_midnight / 86_400.0;
        let time_of_day_sin = (std::f64::consts::TAU * day_fraction).sin();
        let time_of_day_cos = (std::f64::consts::TAU * day_fraction).cos();
        let day_of_week_frac =
            entry_bar.ts_close_utc.date_naive().weekday().num_days_from_monday() as f64 / 7.0;

        let lse_range = (setup.lse_high - setup.lse_low).max(1) as f64;
        let lse_range_to_atr_ratio = lse_range / atr_f;
        let distance_to_lse_extreme_ratio = setup
            .tp_price
            .map(|tp| (entry_bar.close - tp).abs() as f64 / lse_range)
            .unwrap_or(0.0);

        Ok(Features {
            body_to_range_ratio,
            upper_wick_ratio,
            lower_wick_ratio,
            close_position_in_range,
            return_1bar,
            return_3bar,
            return_5bar,
            gap_to_prev_close_ratio,
            atr_to_close_ratio,
            range_to_atr_ratio,
            avg_range_5_to_atr_ratio,
            true_range_to_atr_ratio,
            rolling_return_std_10,
            consolidation_range_to_atr_ratio,
            consolidation_tightness,
            volume_ratio_to_avg10,
            volume_zscore_10,
            volume_percentile_20,
            relative_volume_at_sweep,
            obv_slope_10,
            volume_trend_3bar,
            relative_volume_at_liq1,
            liq1_confidence,
            sweep_confidence,
            consolidation_duration_norm,
            consolidation_touch_count_norm,
            break_distance_to_atr_ratio,
            retracement_fraction,
            risk_reward_ratio,
            sl_distance_to_atr_ratio,
            bars_since_session_open_norm,
            bars_since_liq1_norm,
            time_of_day_sin,
            time_of_day_cos,
            day_of_week_frac,
            lse_range_to_atr_ratio,
            distance_to_lse_extreme_ratio,
        })
    }
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        xs.iter().sum::<f64>() / xs.len() as f64
    }
}

fn std_dev(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    let var = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64;
    var.sqrt()
}

fn percentile_rank(population: &[f64], value: f64) -> f64 {
    if population.is_empty() {
        return 0.0;
    }
    let below = population.iter().filter(|&&p| p < value).count();
    below as f64 / population.len() as f64
}

use chrono::{Datelike, Timelike};
