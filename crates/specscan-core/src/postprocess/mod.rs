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

//! Turns a composite complex spectrum into a calibrated PSD trace.

pub mod savgol;

use serde::Serialize;

use crate::assembler::CompositeSpectrum;
use crate::config::{PowerUnit, SweepConfig, MIN_SMOOTHING_WINDOW};

/// Calibration factor applied to `|X| / sample_rate`.
pub const MAGNITUDE_SCALE: f64 = 5.0;
/// Power numerator, divided by the FFT length.
pub const POWER_SCALE: f64 = 1000.0;

/// Final power spectral density of a sweep, ready to plot or export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PsdTrace {
    pub frequency_mhz: Vec<f64>,
    pub power: Vec<f64>,
    pub unit: PowerUnit,
    /// Y axis label matching `unit`.
    pub label: String,
    /// Requested start, for axis clipping.
    pub start_mhz: f64,
    /// Requested stop, for axis clipping.
    pub stop_mhz: f64,
    /// Window actually applied, after clamping. `None` when not smoothed.
    pub smoothing_window: Option<usize>,
    pub step_count: usize,
}

impl PsdTrace {
    #[must_use]
    pub fn len(&self) -> usize {
        self.power.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.power.is_empty()
    }

    /// Highest point of the trace as `(frequency_mhz, power)`.
    #[must_use]
    pub fn peak(&self) -> Option<(f64, f64)> {
        self.frequency_mhz
            .iter()
            .zip(&self.power)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(&f, &p)| (f, p))
    }
}

/// Linear power to dB, flooring non-positive input so the log stays finite.
#[must_use]
pub fn to_db(power: f64) -> f64 {
    10.0 * power.max(f64::MIN_POSITIVE).log10()
}

/// Clamp a requested smoothing window to what `len` points can support.
///
/// Returns `None` when there are too few points to smooth at all.
#[must_use]
pub fn effective_window(requested: usize, len: usize) -> Option<usize> {
    if len < MIN_SMOOTHING_WINDOW {
        return None;
    }
    Some(requested.max(MIN_SMOOTHING_WINDOW).min(len))
}

/// Calibrate, convert and smooth an assembled sweep.
///
/// Pure: the same composite and config always give the same trace.
#[must_use]
pub fn post_process(composite: CompositeSpectrum, config: &SweepConfig) -> PsdTrace {
    let t_s = 1.0 / config.sample_rate_hz;
    #[allow(clippy::cast_precision_loss, reason = "FFT lengths are at most 1024")]
    let power_scale = POWER_SCALE / config.fft_length as f64;

    let power: Vec<f64> = composite
        .values
        .iter()
        .map(|x| {
            let mag = x.norm() * MAGNITUDE_SCALE * t_s;
            mag * mag * power_scale
        })
        .map(|p| match config.units {
            PowerUnit::Decibel => to_db(p),
            PowerUnit::Linear => p,
        })
        .collect();

    let frequency_mhz: Vec<f64> = composite.freqs_hz.iter().map(|f| f * 1e-6).collect();

    let mut smoothing_window = None;
    let power = match config.requested_window_len() {
        Some(requested) => match effective_window(requested, power.len()) {
            Some(window) => {
                if window != requested {
                    log::warn!(
                        "Smoothing window {} clamped to {} for {} points",
                        requested,
                        window,
                        power.len()
                    );
                }
                smoothing_window = Some(window);
                savgol::smooth_linear(&power, window)
            }
            None => {
                log::warn!("Skipping smoothing: only {} points", power.len());
                power
            }
        },
        None => power,
    };

    PsdTrace {
        frequency_mhz,
        power,
        unit: config.units,
        label: config.units.label().to_string(),
        start_mhz: config.start_freq_hz * 1e-6,
        stop_mhz: config.stop_freq_hz * 1e-6,
        smoothing_window,
        step_count: composite.steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    fn composite(values: Vec<Complex64>) -> CompositeSpectrum {
        let freqs_hz = (0..values.len())
            .map(|i| 100.0e6 + f64::from(u32::try_from(i).unwrap()) * 1e3)
            .collect();
        CompositeSpectrum {
            freqs_hz,
            values,
            steps: 1,
        }
    }

    fn ramp(len: usize) -> Vec<Complex64> {
        (0..len)
            .map(|i| Complex64::new(1.0 + f64::from(u32::try_from(i % 13).unwrap()) * 37.0, 5.0))
            .collect()
    }

    #[test]
    fn test_calibration_constants() {
        let config = SweepConfig::new(100.0e6, 110.0e6, 256)
            .without_smoothing()
            .with_units(PowerUnit::Linear);
        let x = Complex64::new(3.0e3, 4.0e3);
        let trace = post_process(composite(vec![x]), &config);

        let mag = 5.0e3 * 5.0 / 2.4e6;
        let expected = mag * mag * 1000.0 / 256.0;
        assert!((trace.power[0] - expected).abs() < 1e-15);
        assert_eq!(trace.label, "Power (mW/Hz)");
        assert!((trace.frequency_mhz[0] - 100.0).abs() < 1e-12);
        assert_eq!(trace.smoothing_window, None);
    }

    #[test]
    fn test_db_round_trip() {
        for p in [1e-12, 3.5e-7, 0.02, 1.0, 250.0] {
            let db = to_db(p);
            let back = 10f64.powf(db / 10.0);
            assert!((back - p).abs() / p < 1e-12);
        }
    }

    #[test]
    fn test_zero_power_is_finite() {
        let config = SweepConfig::new(100.0e6, 110.0e6, 256).without_smoothing();
        let trace = post_process(composite(vec![Complex64::new(0.0, 0.0); 4]), &config);
        assert!(trace.power.iter().all(|p| p.is_finite()));
        assert_eq!(trace.label, "Power (dBmW/Hz)");
    }

    #[test]
    fn test_idempotent() {
        let config = SweepConfig::new(470.0e6, 608.0e6, 1024);
        let input = composite(ramp(2000));
        let a = post_process(input.clone(), &config);
        let b = post_process(input, &config);
        assert_eq!(a, b);
        assert_eq!(a.smoothing_window, Some(138));
    }

    #[test]
    fn test_manual_window_clamped_to_length() {
        let config = SweepConfig::new(100.0e6, 110.0e6, 256).with_manual_smoothing(500);
        let trace = post_process(composite(ramp(127)), &config);
        assert_eq!(trace.smoothing_window, Some(127));
        assert_eq!(trace.len(), 127);
    }

    #[test]
    fn test_small_auto_window_raised() {
        let config = SweepConfig::new(162.3e6, 162.7e6, 64);
        assert_eq!(config.smoothing_window_len, 0);
        let trace = post_process(composite(ramp(62)), &config);
        assert_eq!(trace.smoothing_window, Some(2));
    }

    #[test]
    fn test_single_point_skips_smoothing() {
        let config = SweepConfig::new(100.0e6, 110.0e6, 256).with_manual_smoothing(10);
        let trace = post_process(composite(ramp(1)), &config);
        assert_eq!(trace.smoothing_window, None);
        assert_eq!(trace.len(), 1);
    }

    #[test]
    fn test_empty_composite() {
        let config = SweepConfig::new(100.0e6, 110.0e6, 256);
        let trace = post_process(CompositeSpectrum::default(), &config);
        assert!(trace.is_empty());
        assert_eq!(trace.peak(), None);
        assert!((trace.start_mhz - 100.0).abs() < 1e-12);
        assert!((trace.stop_mhz - 110.0).abs() < 1e-12);
    }

    #[test]
    fn test_effective_window() {
        assert_eq!(effective_window(138, 1000), Some(138));
        assert_eq!(effective_window(0, 1000), Some(2));
        assert_eq!(effective_window(500, 127), Some(127));
        assert_eq!(effective_window(5, 1), None);
    }
}
