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

//! Error types for sweep configuration and execution.

use thiserror::Error;

use crate::receiver::ReceiverError;

/// A sweep configuration that cannot be run.
///
/// These are raised before any receiver call is made, so no partial state exists
/// when one is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("stop frequency {stop_hz} Hz must be above start frequency {start_hz} Hz")]
    InvalidRange { start_hz: f64, stop_hz: f64 },

    #[error("frequency {0} MHz is outside the supported range 30.0 - 1700.0 MHz")]
    FrequencyOutOfRange(f64),

    #[error("unsupported FFT length {0} (expected one of 64, 128, 256, 512, 1024)")]
    UnsupportedFftLength(usize),

    #[error("gain {0} dB is outside the supported range 0 - 30 dB")]
    GainOutOfRange(i32),

    #[error("smoothing window {0} is outside the supported range 2 - 1000")]
    WindowOutOfRange(usize),

    #[error("sample rate must be positive and finite, got {0} Hz")]
    InvalidSampleRate(f64),

    #[error("capture length {capture_len} is shorter than FFT length {fft_length}")]
    CaptureTooShort { capture_len: usize, fft_length: usize },
}

/// Errors that end a sweep without producing a trace.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("invalid sweep configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to configure receiver: {0}")]
    Setup(#[source] ReceiverError),

    #[error("acquisition failed at {:.3} MHz: {source}", .freq_hz / 1e6)]
    Acquisition {
        freq_hz: f64,
        #[source]
        source: ReceiverError,
    },

    #[error("a sweep is already running on this receiver")]
    Busy,

    #[error("failed to start sweep worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("sweep worker thread terminated unexpectedly")]
    WorkerPanicked,
}
