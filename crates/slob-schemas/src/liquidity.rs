use serde::{Deserialize, Serialize};

/// Result of `LiquidityDetector::detect_liquidity_grab` against a level.
/// Carries the contributing factors so `FeatureEngineer` can read
/// `score`/`volume_spike` back out without re-deriving them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiquiditySignal {
    pub detected: bool,
    /// 0.0-1.0 multi-factor confidence score.
    pub score: f64,
    /// Distance the break extended past the level, in micros.
    pub break_distance_micros: i64,
    pub volume_spike: bool,
    pub has_rejection: bool,
    pub wick_reversal: bool,
}

impl LiquiditySignal {
    pub fn none() -> Self {
        LiquiditySignal {
            detected: false,
            score: 0.0,
            break_distance_micros: 0,
            volume_spike: false,
            has_rejection: false,
            wick_reversal: false,
        }
    }
}

impl Default for LiquiditySignal {
    fn default() -> Self {
        Self::none()
    }
}
