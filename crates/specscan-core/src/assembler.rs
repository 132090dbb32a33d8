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

//! Composite spectrum assembly.
//!
//! Step slices are appended in sweep order. Nothing is merged, reordered or
//! de-duplicated: adjacent steps are half a sample rate apart and keep only the
//! middle half of their band, so their slices already abut.

use num_complex::Complex64;

use crate::transform::StepSpectrum;

/// All step slices of one sweep, concatenated in tuning order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositeSpectrum {
    /// Frequency of every bin in Hz, non-decreasing.
    pub freqs_hz: Vec<f64>,
    /// Complex FFT value of every bin.
    pub values: Vec<Complex64>,
    /// Number of steps appended.
    pub steps: usize,
}

impl CompositeSpectrum {
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Accumulates [`StepSpectrum`] slices into a [`CompositeSpectrum`].
///
/// One assembler serves one sweep; [`SpectrumAssembler::finish`] hands the result
/// over and consumes the assembler.
#[derive(Debug, Default)]
pub struct SpectrumAssembler {
    composite: CompositeSpectrum,
}

impl SpectrumAssembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-size the buffers for `steps` slices of `step_len` bins.
    #[must_use]
    pub fn with_capacity(steps: usize, step_len: usize) -> Self {
        let bins = steps.saturating_mul(step_len);
        Self {
            composite: CompositeSpectrum {
                freqs_hz: Vec::with_capacity(bins),
                values: Vec::with_capacity(bins),
                steps: 0,
            },
        }
    }

    /// Append one step. Callers feed steps in increasing tuning order.
    pub fn append(&mut self, step: StepSpectrum) {
        debug_assert!(
            match (self.composite.freqs_hz.last(), step.freqs_hz.first()) {
                (Some(prev), Some(next)) => next >= prev,
                _ => true,
            },
            "steps must be appended in increasing tuning order"
        );

        self.composite.freqs_hz.extend(step.freqs_hz);
        self.composite.values.extend(step.values);
        self.composite.steps += 1;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.composite.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.composite.is_empty()
    }

    #[must_use]
    pub fn step_count(&self) -> usize {
        self.composite.steps
    }

    /// Hand over the accumulated spectrum.
    #[must_use]
    pub fn finish(self) -> CompositeSpectrum {
        self.composite
    }
}
