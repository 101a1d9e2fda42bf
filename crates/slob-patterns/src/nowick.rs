//! Percentile-based wick/body/volume classification of a single candidate
//! bar against a lookback population of prior bars.

use slob_schemas::Bar;

#[derive(Debug, Clone, Copy)]
pub struct NoWickDetector {
    pub lookback: usize,
    pub strict: bool,
}

impl Default for NoWickDetector {
    fn default() -> Self {
        Self {
            lookback: 30,
            strict: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoWickReading {
    pub score: f64,
    pub wick_to_body_ratio: f64,
    pub body_points: f64,
}

const SCORE_WEIGHT_WICK: f64 = 0.4;
const SCORE_WEIGHT_BODY: f64 = 0.3;
const SCORE_WEIGHT_VOLUME: f64 = 0.3;

/// In strict mode the wick-to-body ratio must stay at or below this, and
/// the body must be at least `STRICT_MIN_BODY_POINTS` points, or the bar
/// is rejected outright regardless of its composite score.
const STRICT_MAX_WICK_TO_BODY: f64 = 0.2;
const STRICT_MIN_BODY_POINTS: f64 = 0.5;

impl NoWickDetector {
    /// Evaluates `bars[idx]` against the `lookback` bars preceding it.
    /// Returns `None` when there isn't enough history, or (in strict mode)
    /// when the bar fails the hard wick/body gates.
    pub fn evaluate(&self, bars: &[Bar], idx: usize) -> Option<NoWickReading> {
        if idx >= bars.len() {
            return None;
        }
        let start = idx.saturating_sub(self.lookback);
        if idx == start {
            return None;
        }
        let population = &bars[start..idx];
        if population.is_empty() {
            return None;
        }

        let candidate = &bars[idx];
        let body = candidate.body();
        let total_wick = candidate.upper_wick() + candidate.lower_wick();
        let wick_to_body_ratio = if body == 0 {
            f64::INFINITY
        } else {
            total_wick as f64 / body as f64
        };
        let body_points = body as f64 / slob_schemas::prices::MICROS_PER_POINT as f64;

        if self.strict {
            if wick_to_body_ratio > STRICT_MAX_WICK_TO_BODY {
                return None;
            }
            if body_points < STRICT_MIN_BODY_POINTS {
                return None;
            }
        }

        let wick_percentile = percentile_rank(
            population.iter().map(|b| (b.upper_wick() + b.lower_wick()) as f64),
            total_wick as f64,
        );
        let body_percentile = percentile_rank(population.iter().map(|b| b.body() as f64), body as f64);
        let volume_percentile =
            percentile_rank(population.iter().map(|b| b.volume as f64), candidate.volume as f64);

        // A "no-wick" bar has a small wick percentile (tight wicks), large
        // body percentile (strong directional body), and elevated volume.
        let score = SCORE_WEIGHT_WICK * (1.0 - wick_percentile)
            + SCORE_WEIGHT_BODY * body_percentile
            + SCORE_WEIGHT_VOLUME * volume_percentile;

        Some(NoWickReading {
            score,
            wick_to_body_ratio,
            body_points,
        })
    }
}

/// Fraction of `population` strictly below `value`, in `[0, 1]`.
fn percentile_rank(population: impl Iterator<Item = f64>, value: f64) -> f64 {
    let mut n = 0usize;
    let mut below = 0usize;
    for p in population {
        n += 1;
        if p < value {
            below += 1;
        }
    }
    if n == 0 {
        return 0.0;
    }
    below as f64 / n as f64
}
