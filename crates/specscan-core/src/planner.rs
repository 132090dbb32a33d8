// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Tuning frequency ladder for a sweep.
//!
//! Steps are half the sample rate apart. Each step keeps only the middle half of
//! its sampled bandwidth, so consecutive usable windows abut with no gap and no
//! overlap.

use crate::config::SweepConfig;

/// The planned tuning frequencies of a sweep.
///
/// Iterating is lazy and the plan itself is never consumed: call [`SweepPlan::iter`]
/// again to restart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepPlan {
    start_freq_hz: f64,
    stop_freq_hz: f64,
    step_hz: f64,
}

impl SweepPlan {
    /// Plan a sweep from `start_freq_hz` towards `stop_freq_hz`.
    ///
    /// The caller guarantees `stop_freq_hz > start_freq_hz` and a positive sample rate.
    #[must_use]
    pub fn new(start_freq_hz: f64, stop_freq_hz: f64, sample_rate_hz: f64) -> Self {
        Self {
            start_freq_hz,
            stop_freq_hz,
            step_hz: sample_rate_hz / 2.0,
        }
    }

    #[must_use]
    pub fn from_config(config: &SweepConfig) -> Self {
        Self::new(config.start_freq_hz, config.stop_freq_hz, config.sample_rate_hz)
    }

    #[must_use]
    pub fn step_hz(&self) -> f64 {
        self.step_hz
    }

    /// Iterate the tuning frequencies in increasing order.
    #[must_use]
    pub fn iter(&self) -> SweepPlanIter {
        SweepPlanIter {
            plan: *self,
            index: 0,
            done: false,
        }
    }

    /// Number of tuning steps, including the one that reaches or passes the stop frequency.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.iter().count()
    }

    /// Fraction of the requested range covered once `freq_hz` has been acquired.
    #[must_use]
    pub fn progress_at(&self, freq_hz: f64) -> f64 {
        ((freq_hz - self.start_freq_hz) / (self.stop_freq_hz - self.start_freq_hz)).clamp(0.0, 1.0)
    }
}

impl IntoIterator for &SweepPlan {
    type Item = f64;
    type IntoIter = SweepPlanIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the tuning frequencies of a [`SweepPlan`].
#[derive(Debug, Clone)]
pub struct SweepPlanIter {
    plan: SweepPlan,
    index: u32,
    done: bool,
}

impl Iterator for SweepPlanIter {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.done {
            return None;
        }

        // Rungs are computed from the index so long sweeps do not accumulate drift.
        let freq = self.plan.start_freq_hz + f64::from(self.index) * self.plan.step_hz;
        self.index += 1;
        if freq >= self.plan.stop_freq_hz || self.plan.step_hz <= 0.0 {
            self.done = true;
        }
        Some(freq)
    }
}

impl std::iter::FusedIterator for SweepPlanIter {}
