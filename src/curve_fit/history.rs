//! History replay model

use super::SampleSet;
use crate::calculus::interpolate;
use crate::types::{EngineError, EngineResult};

/// Replays its samples: piecewise linear between them, constant outside.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryModel {
    samples: SampleSet,
    fitted: bool,
}

impl HistoryModel {
    pub fn new(samples: SampleSet) -> Self {
        Self { samples, fitted: false }
    }

    pub fn samples(&self) -> &SampleSet {
        &self.samples
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    pub fn fit(&mut self) -> EngineResult<()> {
        self.fitted = false;
        if self.samples.is_empty() {
            return Err(EngineError::numeric("history replay needs at least one sample"));
        }
        self.fitted = true;
        Ok(())
    }

    pub fn evaluate_local(&self, t: f64) -> Option<f64> {
        self.fitted
            .then(|| interpolate(self.samples.x(), self.samples.y(), t))
    }
}
