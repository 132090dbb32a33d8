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

//! Receiver abstraction used by the sweep controller.
//!
//! The core never talks to hardware directly. Anything that can be tuned and can
//! hand back a block of complex IQ samples implements [`Receiver`]: an RTL-SDR
//! dongle, a file replay, or a scripted test double.

use num_complex::Complex64;
use thiserror::Error;

/// Errors reported by a receiver implementation.
#[derive(Debug, Error)]
pub enum ReceiverError {
    #[error("failed to open receiver: {0}")]
    Open(String),

    #[error("failed to configure receiver: {0}")]
    Configure(String),

    #[error("failed to tune receiver to {freq_hz} Hz: {reason}")]
    Tune { freq_hz: f64, reason: String },

    #[error("failed to read samples: {0}")]
    Read(String),

    #[error("receiver disconnected")]
    Disconnected,

    #[error("short read: expected {expected} samples, got {got}")]
    ShortRead { expected: usize, got: usize },
}

/// Raw complex IQ samples captured at one tuning frequency.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleBlock {
    samples: Vec<Complex64>,
}

impl SampleBlock {
    #[must_use]
    pub fn new(samples: Vec<Complex64>) -> Self {
        Self { samples }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn samples(&self) -> &[Complex64] {
        &self.samples
    }

    /// The trailing `count` samples, i.e. everything after the settle-time discard.
    ///
    /// Returns the whole block when it holds fewer than `count` samples.
    #[must_use]
    pub fn tail(&self, count: usize) -> &[Complex64] {
        let start = self.samples.len().saturating_sub(count);
        &self.samples[start..]
    }
}

impl From<Vec<Complex64>> for SampleBlock {
    fn from(samples: Vec<Complex64>) -> Self {
        Self::new(samples)
    }
}

/// A tunable narrowband receiver.
///
/// The controller calls `set_sample_rate` and `set_gain` once at sweep start,
/// then `tune` + `read_samples` once per planned frequency, then `close` when
/// the sweep ends, whatever the outcome.
pub trait Receiver {
    /// Set the acquisition sample rate in Hz.
    fn set_sample_rate(&mut self, hz: f64) -> Result<(), ReceiverError>;

    /// Set the tuner gain in dB.
    fn set_gain(&mut self, db: i32) -> Result<(), ReceiverError>;

    /// Tune to a center frequency in Hz.
    fn tune(&mut self, center_freq_hz: f64) -> Result<(), ReceiverError>;

    /// Read `count` complex samples at the current tuning.
    fn read_samples(&mut self, count: usize) -> Result<SampleBlock, ReceiverError>;

    /// Release the underlying device. Called exactly once per sweep.
    fn close(&mut self);
}

impl<R: Receiver + ?Sized> Receiver for Box<R> {
    fn set_sample_rate(&mut self, hz: f64) -> Result<(), ReceiverError> {
        (**self).set_sample_rate(hz)
    }

    fn set_gain(&mut self, db: i32) -> Result<(), ReceiverError> {
        (**self).set_gain(db)
    }

    fn tune(&mut self, center_freq_hz: f64) -> Result<(), ReceiverError> {
        (**self).tune(center_freq_hz)
    }

    fn read_samples(&mut self, count: usize) -> Result<SampleBlock, ReceiverError> {
        (**self).read_samples(count)
    }

    fn close(&mut self) {
        (**self).close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_keeps_trailing_samples() {
        let block: SampleBlock = (0..10)
            .map(|i| Complex64::new(f64::from(i), 0.0))
            .collect::<Vec<_>>()
            .into();

        let tail = block.tail(4);
        assert_eq!(tail.len(), 4);
        assert_eq!(tail[0].re, 6.0);
        assert_eq!(tail[3].re, 9.0);
    }

    #[test]
    fn test_tail_longer_than_block() {
        let block = SampleBlock::new(vec![Complex64::new(1.0, 1.0); 3]);
        assert_eq!(block.tail(8).len(), 3);
    }
}
