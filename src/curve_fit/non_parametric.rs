//! Nearest-sample lookup

use super::SampleSet;

/// Returns the y of the sample nearest in x; ties go to the earlier sample.
#[derive(Debug, Clone, PartialEq)]
pub struct NonParametricModel {
    samples: SampleSet,
}

impl NonParametricModel {
    pub fn new(samples: SampleSet) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &SampleSet {
        &self.samples
    }

    pub fn evaluate_local(&self, t: f64) -> Option<f64> {
        let x = self.samples.x();
        let y = self.samples.y();
        let upper = x.partition_point(|v| *v < t);
        let index = match upper {
            0 => 0,
            i if i == x.len() => i - 1,
            i if t - x[i - 1] <= x[i] - t => i - 1,
            i => i,
        };
        y.get(index).copied()
    }
}
