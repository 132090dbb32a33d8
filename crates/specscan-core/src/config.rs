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

//! Sweep configuration and input validation.
//!
//! [`SweepRequest`] is what a user (or a settings file) hands over, in MHz and
//! possibly out of range. [`SweepConfig`] is the validated, immutable value the
//! sweep runs with; it is built once and only ever read by the core.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Lowest tunable frequency accepted from the configuration surface, in MHz.
pub const MIN_FREQ_MHZ: f64 = 30.0;
/// Highest tunable frequency accepted from the configuration surface, in MHz.
pub const MAX_FREQ_MHZ: f64 = 1700.0;
/// Smallest adjustment applied when a start/stop pair has to be pulled apart, in MHz.
pub const FREQ_NUDGE_MHZ: f64 = 0.1;

/// FFT lengths selectable for a sweep (resolution index 0 through 4).
pub const FFT_LENGTHS: [usize; 5] = [64, 128, 256, 512, 1024];

pub const MIN_GAIN_DB: i32 = 0;
pub const MAX_GAIN_DB: i32 = 30;
pub const DEFAULT_GAIN_DB: i32 = 15;

/// Shortest window a first-order polynomial fit can use.
pub const MIN_SMOOTHING_WINDOW: usize = 2;
pub const MAX_SMOOTHING_WINDOW: usize = 1000;

/// RTL-SDR friendly acquisition bandwidth.
pub const DEFAULT_SAMPLE_RATE_HZ: f64 = 2.4e6;
/// Samples read per step; everything before the trailing FFT window is settle-time discard.
pub const DEFAULT_CAPTURE_LEN: usize = 4096;

/// How the PSD trace is smoothed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmoothingMode {
    /// Window derived from swept bandwidth and FFT length.
    #[default]
    Auto,
    /// Window supplied by the user.
    Manual,
    /// No smoothing.
    Off,
}

/// Unit of the power axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerUnit {
    /// mW/Hz
    Linear,
    /// dBmW/Hz
    #[default]
    Decibel,
}

impl PowerUnit {
    /// Axis label for a rendered trace.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Linear => "Power (mW/Hz)",
            Self::Decibel => "Power (dBmW/Hz)",
        }
    }
}

/// FFT length for a resolution selector index (0 => 64 ... 4 => 1024).
#[must_use]
pub fn fft_length_from_index(index: usize) -> Option<usize> {
    FFT_LENGTHS.get(index).copied()
}

/// Human readable resolution, e.g. `"2.34375 kHz (1024)"`.
#[must_use]
pub fn resolution_label(sample_rate_hz: f64, fft_length: usize) -> String {
    #[allow(clippy::cast_precision_loss, reason = "FFT lengths are at most 1024")]
    let bin_khz = sample_rate_hz / fft_length as f64 / 1e3;
    format!("{bin_khz} kHz ({fft_length})")
}

/// Smoothing window derived from the swept bandwidth and FFT resolution.
///
/// `floor((stop - start) [MHz] * fft_length / 1024)`
#[must_use]
pub fn auto_window_len(start_freq_hz: f64, stop_freq_hz: f64, fft_length: usize) -> usize {
    #[allow(clippy::cast_precision_loss, reason = "FFT lengths are at most 1024")]
    let window = (stop_freq_hz - start_freq_hz) / 1e6 * fft_length as f64 / 1024.0;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "floor of a non-negative, bounded value"
    )]
    let window = window.max(0.0).floor() as usize;
    window
}

/// Validated parameters for one sweep.
///
/// Build with [`SweepConfig::new`] and the `with_*` methods, or from a
/// [`SweepRequest`]. The controller re-validates before touching the receiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    pub start_freq_hz: f64,
    pub stop_freq_hz: f64,
    /// Fixed acquisition bandwidth; tuning steps are half of it.
    pub sample_rate_hz: f64,
    pub fft_length: usize,
    pub gain_db: i32,
    pub smoothing_mode: SmoothingMode,
    /// Used for `Manual` and `Auto`; ignored when smoothing is `Off`.
    pub smoothing_window_len: usize,
    pub units: PowerUnit,
    /// Samples read per step, at least `fft_length`.
    pub capture_len: usize,
}

impl SweepConfig {
    /// Create a config with default gain, automatic smoothing and dB units.
    ///
    /// The automatic window is computed here, once, and not revisited while the
    /// sweep runs.
    #[must_use]
    pub fn new(start_freq_hz: f64, stop_freq_hz: f64, fft_length: usize) -> Self {
        Self {
            start_freq_hz,
            stop_freq_hz,
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            fft_length,
            gain_db: DEFAULT_GAIN_DB,
            smoothing_mode: SmoothingMode::Auto,
            smoothing_window_len: auto_window_len(start_freq_hz, stop_freq_hz, fft_length),
            units: PowerUnit::Decibel,
            capture_len: DEFAULT_CAPTURE_LEN,
        }
    }

    #[must_use]
    pub fn with_gain(mut self, gain_db: i32) -> Self {
        self.gain_db = gain_db;
        self
    }

    #[must_use]
    pub fn with_units(mut self, units: PowerUnit) -> Self {
        self.units = units;
        self
    }

    #[must_use]
    pub fn with_manual_smoothing(mut self, window_len: usize) -> Self {
        self.smoothing_mode = SmoothingMode::Manual;
        self.smoothing_window_len = window_len;
        self
    }

    #[must_use]
    pub fn with_auto_smoothing(mut self) -> Self {
        self.smoothing_mode = SmoothingMode::Auto;
        self.smoothing_window_len =
            auto_window_len(self.start_freq_hz, self.stop_freq_hz, self.fft_length);
        self
    }

    #[must_use]
    pub fn without_smoothing(mut self) -> Self {
        self.smoothing_mode = SmoothingMode::Off;
        self
    }

    #[must_use]
    pub fn with_sample_rate(mut self, sample_rate_hz: f64) -> Self {
        self.sample_rate_hz = sample_rate_hz;
        self
    }

    #[must_use]
    pub fn with_capture_len(mut self, capture_len: usize) -> Self {
        self.capture_len = capture_len;
        self
    }

    /// Check every constraint of the configuration surface.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for freq_hz in [self.start_freq_hz, self.stop_freq_hz] {
            let mhz = freq_hz / 1e6;
            if !(MIN_FREQ_MHZ..=MAX_FREQ_MHZ).contains(&mhz) {
                return Err(ConfigError::FrequencyOutOfRange(mhz));
            }
        }

        if self.stop_freq_hz <= self.start_freq_hz {
            return Err(ConfigError::InvalidRange {
                start_hz: self.start_freq_hz,
                stop_hz: self.stop_freq_hz,
            });
        }

        if !self.sample_rate_hz.is_finite() || self.sample_rate_hz <= 0.0 {
            return Err(ConfigError::InvalidSampleRate(self.sample_rate_hz));
        }

        if !FFT_LENGTHS.contains(&self.fft_length) {
            return Err(ConfigError::UnsupportedFftLength(self.fft_length));
        }

        if !(MIN_GAIN_DB..=MAX_GAIN_DB).contains(&self.gain_db) {
            return Err(ConfigError::GainOutOfRange(self.gain_db));
        }

        if self.smoothing_mode == SmoothingMode::Manual
            && !(MIN_SMOOTHING_WINDOW..=MAX_SMOOTHING_WINDOW).contains(&self.smoothing_window_len)
        {
            return Err(ConfigError::WindowOutOfRange(self.smoothing_window_len));
        }

        if self.capture_len < self.fft_length {
            return Err(ConfigError::CaptureTooShort {
                capture_len: self.capture_len,
                fft_length: self.fft_length,
            });
        }

        Ok(())
    }

    /// Width of one FFT bin in Hz.
    #[must_use]
    pub fn bin_width_hz(&self) -> f64 {
        #[allow(clippy::cast_precision_loss, reason = "FFT lengths are at most 1024")]
        let n = self.fft_length as f64;
        self.sample_rate_hz / n
    }

    /// Distance between consecutive tuning frequencies.
    #[must_use]
    pub fn step_hz(&self) -> f64 {
        self.sample_rate_hz / 2.0
    }

    /// Smoothing window to request from the post processor, before clamping.
    #[must_use]
    pub fn requested_window_len(&self) -> Option<usize> {
        match self.smoothing_mode {
            SmoothingMode::Off => None,
            SmoothingMode::Auto | SmoothingMode::Manual => Some(self.smoothing_window_len),
        }
    }
}

/// Raw sweep parameters as entered by a user or loaded from a settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepRequest {
    pub start_mhz: f64,
    pub stop_mhz: f64,
    pub fft_length: usize,
    pub gain_db: i32,
    pub smoothing_mode: SmoothingMode,
    /// Only consulted in `Manual` mode.
    pub smoothing_window_len: usize,
    pub plot_in_db: bool,
}

impl Default for SweepRequest {
    fn default() -> Self {
        Self {
            start_mhz: 470.0,
            stop_mhz: 608.0,
            fft_length: 1024,
            gain_db: DEFAULT_GAIN_DB,
            smoothing_mode: SmoothingMode::Auto,
            smoothing_window_len: 138,
            plot_in_db: true,
        }
    }
}

impl SweepRequest {
    /// Pull entered values back into the accepted ranges.
    ///
    /// Frequencies are clamped to 30.0 - 1700.0 MHz. A start at the top of the
    /// band drops to 1699.9, a stop at the bottom rises to 30.1, and when start
    /// is not below stop the stop is moved 0.1 MHz above start. Gain and manual
    /// window are clamped to their ranges. The FFT length is left alone.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.start_mhz = self.start_mhz.clamp(MIN_FREQ_MHZ, MAX_FREQ_MHZ);
        self.stop_mhz = self.stop_mhz.clamp(MIN_FREQ_MHZ, MAX_FREQ_MHZ);

        if self.start_mhz >= MAX_FREQ_MHZ {
            self.start_mhz = MAX_FREQ_MHZ - FREQ_NUDGE_MHZ;
        }
        if self.stop_mhz <= MIN_FREQ_MHZ {
            self.stop_mhz = MIN_FREQ_MHZ + FREQ_NUDGE_MHZ;
        }
        if self.start_mhz >= self.stop_mhz {
            self.stop_mhz = (self.start_mhz + FREQ_NUDGE_MHZ).min(MAX_FREQ_MHZ);
        }

        self.gain_db = self.gain_db.clamp(MIN_GAIN_DB, MAX_GAIN_DB);
        self.smoothing_window_len = self
            .smoothing_window_len
            .clamp(MIN_SMOOTHING_WINDOW, MAX_SMOOTHING_WINDOW);
        self
    }

    /// Automatic smoothing window for the current range and resolution.
    #[must_use]
    pub fn auto_window_len(&self) -> usize {
        auto_window_len(self.start_mhz * 1e6, self.stop_mhz * 1e6, self.fft_length)
    }

    /// Build and validate the sweep configuration.
    pub fn to_config(&self) -> Result<SweepConfig, ConfigError> {
        let config = SweepConfig::new(self.start_mhz * 1e6, self.stop_mhz * 1e6, self.fft_length)
            .with_gain(self.gain_db)
            .with_units(if self.plot_in_db {
                PowerUnit::Decibel
            } else {
                PowerUnit::Linear
            });

        let config = match self.smoothing_mode {
            SmoothingMode::Auto => config.with_auto_smoothing(),
            SmoothingMode::Manual => config.with_manual_smoothing(self.smoothing_window_len),
            SmoothingMode::Off => config.without_smoothing(),
        };

        config.validate()?;
        Ok(config)
    }
}
