//! Consolidation window detection: a pure, immutable scan over a bar slice
//! looking for a tight, non-trending range bounded by `[min, max]` bars.

use crate::atr::{AtrCalculator, AtrReading};
use slob_schemas::{Bar, Consolidation};

/// Trending bars are rejected: a slope greater than this fraction of ATR
/// per bar means the range isn't consolidating, it's drifting.
pub const TRENDING_SLOPE_ATR_FRACTION: f64 = 0.15;

#[derive(Debug, Clone, Copy)]
pub struct ConsolidationDetector {
    pub min_duration: usize,
    pub max_duration: usize,
    pub atr: AtrCalculator,
    /// Lower bound on `range / ATR` — below this the window is too tight to
    /// be a meaningful platform rather than noise.
    pub k_min: f64,
    /// Upper bound on `range / ATR` — above this the window is too wide to
    /// be a consolidation rather than a slow drift.
    pub k_max: f64,
}

impl Default for ConsolidationDetector {
    fn default() -> Self {
        Self {
            min_duration: 5,
            max_duration: 30,
            atr: AtrCalculator::default(),
            k_min: 0.5,
            k_max: 2.0,
        }
    }
}

impl ConsolidationDetector {
    /// Scans candidate durations `[min_duration, max_duration]` ending at
    /// `end_idx`, accepting the first (shortest) duration that satisfies
    /// every gate. Returns `None` if no duration in range qualifies.
    pub fn find_ending_at(&self, bars: &[Bar], end_idx: usize) -> Option<Consolidation> {
        if end_idx >= bars.len() {
            return None;
        }
        for duration in self.min_duration..=self.max_duration {
            if duration > end_idx + 1 {
                break;
            }
            let start_idx = end_idx + 1 - duration;
            if let Some(consol) = self.evaluate_window(bars, start_idx, end_idx) {
                return Some(consol);
            }
        }
        None
    }

    fn evaluate_window(&self, bars: &[Bar], start_idx: usize, end_idx: usize) -> Option<Consolidation> {
        let window = &bars[start_idx..=end_idx];
        let high = window.iter().map(|b| b.high).max()?;
        let low = window.iter().map(|b| b.low).min()?;
        let range = high - low;
        if range <= 0 {
            return None;
        }

        let atr: AtrReading = self.atr.atr_at(bars, end_idx);
        if atr.sufficient_data && atr.value_micros > 0 {
            let atr_f = atr.value_micros as f64;
            if (range as f64) < self.k_min * atr_f || (range as f64) > self.k_max * atr_f {
                return None;
            }

            let duration = window.len() as f64;
            let slope = (bars[end_idx].close - bars[start_idx].open).abs() as f64 / duration;
            let threshold = TRENDING_SLOPE_ATR_FRACTION * atr.value_micros as f64;
            if slope > threshold {
                return None;
            }
        }

        let touch_count_high = window.iter().filter(|b| b.high == high).count() as u32;
        let touch_count_low = window.iter().filter(|b| b.low == low).count() as u32;
        if touch_count_high < 2 && touch_count_low < 2 {
            return None;
        }

        let tightness = if atr.value_micros > 0 {
            range as f64 / atr.value_micros as f64
        } else {
            0.0
        };

        Some(Consolidation {
            start_idx,
            end_idx,
            start_time: window[0].ts_close_utc,
            end_time: window[window.len() - 1].ts_close_utc,
            high,
            low,
            range_micros: range,
            atr_at_start_micros: atr.value_micros,
            duration: window.len(),
            touch_count_high,
            touch_count_low,
            tightness,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar(i: i64, o: i64, h: i64, l: i64, c: i64) -> Bar {
        Bar::new(
            Utc.timestamp_opt(i * 60, 0).unwrap(),
            o * 1_000_000,
            h * 1_000_000,
            l * 1_000_000,
            c * 1_000_000,
            100,
        )
        .unwrap()
    }

    #[test]
    fn flat_range_with_two_touches_is_detected() {
        let bars = vec![
            bar(0, 100, 101, 99, 100),
            bar(1, 100, 101, 99, 100),
            bar(2, 100, 101, 99, 100),
            bar(3, 100, 101, 99, 100),
            bar(4, 100, 101, 99, 100),
        ];
        let det = ConsolidationDetector {
            min_duration: 5,
            max_duration: 5,
            atr: AtrCalculator::default(),
            k_min: 0.5,
            k_max: 2.0,
        };
        let consol = det.find_ending_at(&bars, 4).expect("must detect consolidation");
        assert_eq!(consol.duration, 5);
        assert!(consol.touch_count_high >= 2);
    }

    #[test]
    fn zero_range_window_is_rejected() {
        let bars: Vec<Bar> = (0..5).map(|i| bar(i, 100, 100, 100, 100)).collect();
        let det = ConsolidationDetector {
            min_duration: 5,
            max_duration: 5,
            atr: AtrCalculator::default(),
            k_min: 0.5,
            k_max: 2.0,
        };
        assert!(det.find_ending_at(&bars, 4).is_none());
    }

    #[test]
    fn out_of_bounds_range_is_rejected_even_with_valid_touches() {
        // 20 quiet bars to give ATR(14) a stable, small reading, then a
        // 5-bar window whose range is many multiples of that ATR — two
        // touches on each side, but far too wide to be a consolidation.
        let mut bars: Vec<Bar> = (0..20).map(|i| bar(i, 100, 101, 99, 100)).collect();
        for i in 20..25 {
            bars.push(bar(i, 100, 140, 60, 100));
        }
        let det = ConsolidationDetector {
            min_duration: 5,
            max_duration: 5,
            atr: AtrCalculator::default(),
            k_min: 0.5,
            k_max: 2.0,
        };
        assert!(det.find_ending_at(&bars, 24).is_none());
    }
}
