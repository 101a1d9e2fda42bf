use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A confirmed range-bound window following a LIQ1 sweep. Immutable once
/// returned by `ConsolidationDetector` — nothing downstream mutates a
/// `Consolidation` in place, a new one is produced if the window is
/// re-evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Consolidation {
    pub start_idx: usize,
    pub end_idx: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub high: i64,
    pub low: i64,
    /// `high - low`, in micros.
    pub range_micros: i64,
    /// ATR sampled at `start_idx`, used to range-bound this window's size.
    pub atr_at_start_micros: i64,
    /// `end_idx - start_idx + 1`, in bars.
    pub duration: usize,
    pub touch_count_high: u32,
    pub touch_count_low: u32,
    /// 0.0-1.0 tightness score: how close `range_micros` sits to the tight
    /// end of `[atr * k_min, atr * k_max]`. Higher is tighter.
    pub tightness: f64,
}

impl Consolidation {
    pub fn range_atr_ratio(&self) -> f64 {
        if self.atr_at_start_micros == 0 {
            return 0.0;
        }
        self.range_micros as f64 / self.atr_at_start_micros as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn range_atr_ratio_handles_zero_atr() {
        let c = Consolidation {
            start_idx: 0,
            end_idx: 5,
            start_time: ts(0),
            end_time: ts(5),
            high: 100,
            low: 90,
            range_micros: 10,
            atr_at_start_micros: 0,
            duration: 6,
            touch_count_high: 2,
            touch_count_low: 2,
            tightness: 0.5,
        };
        assert_eq!(c.range_atr_ratio(), 0.0);
    }
}
