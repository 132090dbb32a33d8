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

//! Per-step spectral transform.
//!
//! One capture becomes one truncated, zero-centred spectrum slice:
//!
//! ```text
//!  capture_len samples
//! |---- settle discard ----|---- fft_length ----|
//!                                   |
//!                               FFT + shift
//!                                   |
//!  | outer quarter |      middle half (kept)      | outer quarter |
//!  0            n/4                            3n/4-1            n
//! ```
//!
//! The outer quarters sit in the receiver's anti-alias roll-off and are dropped.

use std::fmt;
use std::sync::Arc;

use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

use crate::receiver::SampleBlock;

/// Truncated spectrum of one tuning step and its absolute frequency axis.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSpectrum {
    /// Tuning (center) frequency of the step in Hz.
    pub center_freq_hz: f64,
    /// Frequency of each retained bin in Hz, strictly increasing.
    pub freqs_hz: Vec<f64>,
    /// Complex FFT value of each retained bin.
    pub values: Vec<Complex64>,
}

impl StepSpectrum {
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Number of bins a step keeps for a given FFT length.
#[must_use]
pub fn retained_len(fft_length: usize) -> usize {
    fft_length / 2 - 1
}

/// `count` evenly spaced values from `start` to `stop`, both inclusive.
#[must_use]
pub fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            #[allow(clippy::cast_precision_loss, reason = "bin counts are small")]
            let step = (stop - start) / (count - 1) as f64;
            #[allow(clippy::cast_precision_loss, reason = "bin counts are small")]
            let mut axis: Vec<f64> = (0..count).map(|i| start + i as f64 * step).collect();
            axis[count - 1] = stop;
            axis
        }
    }
}

/// Swap the two halves of a spectrum so the zero-frequency bin sits in the middle.
pub fn fft_shift<T>(spectrum: &mut [T]) {
    let half = spectrum.len() / 2;
    spectrum.rotate_left(half);
}

/// Turns raw captures into [`StepSpectrum`] slices.
///
/// The FFT plan and its scratch buffer are created once and reused for every step
/// of a sweep.
pub struct StepTransformer {
    fft_length: usize,
    sample_rate_hz: f64,
    fft: Arc<dyn Fft<f64>>,
    buffer: Vec<Complex64>,
    scratch: Vec<Complex64>,
}

impl fmt::Debug for StepTransformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepTransformer")
            .field("fft_length", &self.fft_length)
            .field("sample_rate_hz", &self.sample_rate_hz)
            .finish_non_exhaustive()
    }
}

impl StepTransformer {
    /// Plan a forward FFT of `fft_length` points (a power of two, at least 8).
    #[must_use]
    pub fn new(fft_length: usize, sample_rate_hz: f64) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_length);
        let scratch = vec![Complex64::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Self {
            fft_length,
            sample_rate_hz,
            fft,
            buffer: Vec::with_capacity(fft_length),
            scratch,
        }
    }

    #[must_use]
    pub fn fft_length(&self) -> usize {
        self.fft_length
    }

    /// Transform one capture taken at `center_freq_hz`.
    ///
    /// The block must hold at least `fft_length` samples; only the trailing
    /// `fft_length` are used.
    pub fn transform(&mut self, block: &SampleBlock, center_freq_hz: f64) -> StepSpectrum {
        let n = self.fft_length;
        debug_assert!(block.len() >= n, "capture shorter than FFT length");

        self.buffer.clear();
        self.buffer.extend_from_slice(block.tail(n));
        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);
        fft_shift(&mut self.buffer);

        let values = self.buffer[n / 4..3 * n / 4 - 1].to_vec();
        let freqs_hz = self.step_axis(center_freq_hz);
        debug_assert_eq!(values.len(), freqs_hz.len());

        StepSpectrum {
            center_freq_hz,
            freqs_hz,
            values,
        }
    }

    /// Absolute frequencies of the retained bins for a step tuned to `center_freq_hz`.
    #[must_use]
    pub fn step_axis(&self, center_freq_hz: f64) -> Vec<f64> {
        #[allow(clippy::cast_precision_loss, reason = "FFT lengths are at most 1024")]
        let bin_hz = self.sample_rate_hz / self.fft_length as f64;
        linspace(
            center_freq_hz - self.sample_rate_hz / 4.0,
            center_freq_hz + self.sample_rate_hz / 4.0 - bin_hz,
            retained_len(self.fft_length),
        )
    }
}
