//! Compression threshold ratio

use crate::core::error::ValidationError;
use serde::{Deserialize, Serialize};

/// Default fraction of the context budget at which compaction fires.
pub const DEFAULT_THRESHOLD_RATIO: f64 = 0.8;

/// Fraction of the token budget, within (0, 1], that triggers compaction.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct ThresholdRatio(f64);

impl ThresholdRatio {
    pub fn new(ratio: f64) -> Result<Self, ValidationError> {
        if ratio.is_finite() && ratio > 0.0 && ratio <= 1.0 {
            Ok(Self(ratio))
        } else {
            Err(ValidationError::InvalidThreshold(ratio))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Token count at which compaction fires for a given budget.
    pub fn tokens_for(&self, max_tokens: usize) -> usize {
        (max_tokens as f64 * self.0) as usize
    }

    /// Whether `current / max` has reached the threshold.
    pub fn is_reached(&self, current: usize, max_tokens: usize) -> bool {
        if max_tokens == 0 {
            return current > 0;
        }
        current as f64 / max_tokens as f64 >= self.0
    }
}

impl Default for ThresholdRatio {
    fn default() -> Self {
        Self(DEFAULT_THRESHOLD_RATIO)
    }
}

impl TryFrom<f64> for ThresholdRatio {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ThresholdRatio> for f64 {
    fn from(value: ThresholdRatio) -> Self {
        value.0
    }
}

impl std::fmt::Display for ThresholdRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
