//! Quality gate
//!
//! Judges a small extraction sample by its text-to-markup ratio before a
//! domain is committed to a full scrape.

use crate::config::QualityConfig;

/// Sizes of one sampled page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// Characters of visible text extracted
    pub text_len: usize,
    /// Characters of the raw document
    pub raw_len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityVerdict {
    Pass,
    Fail,
}

/// Outcome of an evaluation with the numbers behind it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityReport {
    pub verdict: QualityVerdict,
    pub ratio: f64,
    /// Threshold actually applied, penalty included
    pub threshold: f64,
    pub samples: usize,
    /// Fewer samples than the configured size
    pub low_confidence: bool,
}

impl QualityReport {
    pub fn passed(&self) -> bool {
        self.verdict == QualityVerdict::Pass
    }
}

#[derive(Debug, Clone)]
pub struct QualityGate {
    sample_size: usize,
    min_text_ratio: f64,
    low_confidence_penalty: f64,
}

impl QualityGate {
    pub fn new(sample_size: usize, min_text_ratio: f64, low_confidence_penalty: f64) -> Self {
        Self {
            sample_size,
            min_text_ratio,
            low_confidence_penalty,
        }
    }

    pub fn from_config(config: &QualityConfig) -> Self {
        Self::new(
            config.sample_size,
            config.min_text_ratio,
            config.low_confidence_penalty,
        )
    }

    /// How many records the quality test should collect
    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Evaluates a sample
    ///
    /// Ratio is total text length over total raw length. Under half the
    /// configured sample size the threshold is multiplied by the penalty; an
    /// empty sample always fails.
    pub fn evaluate(&self, samples: &[Sample]) -> QualityReport {
        let text: usize = samples.iter().map(|s| s.text_len).sum();
        let raw: usize = samples.iter().map(|s| s.raw_len).sum();
        let ratio = if raw == 0 {
            0.0
        } else {
            text as f64 / raw as f64
        };

        let low_confidence = samples.len() < self.sample_size;
        let threshold = if samples.len() * 2 < self.sample_size {
            self.min_text_ratio * self.low_confidence_penalty
        } else {
            self.min_text_ratio
        };

        let verdict = if !samples.is_empty() && ratio >= threshold {
            QualityVerdict::Pass
        } else {
            QualityVerdict::Fail
        };

        QualityReport {
            verdict,
            ratio,
            threshold,
            samples: samples.len(),
            low_confidence,
        }
    }
}
