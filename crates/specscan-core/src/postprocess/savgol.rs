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

//! First-order Savitzky-Golay smoothing.
//!
//! Each interior output point is a least-squares line fitted to the `window`
//! samples around it, read off at the centre of that window. For a line the
//! centre value is the window mean. Near the ends, where a centred window does
//! not fit, the first and last `window / 2` points are read off a single line
//! fitted to the first or last `window` samples.
//!
//! Windows may be even. The window for interior point `i` is
//! `[i - (window - 1) / 2, i - (window - 1) / 2 + window)`; an even window is
//! centred half a sample to the right of `i`.

/// Least-squares line through `segment` sampled at x = 0, 1, 2, ...
///
/// Returns `(intercept, slope)`.
fn fit_line(segment: &[f64]) -> (f64, f64) {
    #[allow(clippy::cast_precision_loss, reason = "windows are at most a few thousand samples")]
    let n = segment.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = segment.iter().sum::<f64>() / n;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (k, &y) in segment.iter().enumerate() {
        #[allow(clippy::cast_precision_loss, reason = "windows are at most a few thousand samples")]
        let dx = k as f64 - x_mean;
        sxy += dx * (y - y_mean);
        sxx += dx * dx;
    }

    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    (y_mean - slope * x_mean, slope)
}

/// Smooth `data` with a first-order fit over `window` samples.
///
/// `window` must be in `2..=data.len()`; outside that range the input is
/// returned unchanged.
#[must_use]
pub fn smooth_linear(data: &[f64], window: usize) -> Vec<f64> {
    let len = data.len();
    if window < 2 || window > len {
        return data.to_vec();
    }

    let half = window / 2;
    let offset = (window - 1) / 2;
    #[allow(clippy::cast_precision_loss, reason = "windows are at most a few thousand samples")]
    let n = window as f64;
    let mut output = vec![0.0; len];

    // Interior: the fitted line at the window centre, i.e. the window mean.
    for i in half..len - half {
        let start = i - offset;
        output[i] = data[start..start + window].iter().sum::<f64>() / n;
    }

    let (intercept, slope) = fit_line(&data[..window]);
    for (i, out) in output.iter_mut().enumerate().take(half) {
        #[allow(clippy::cast_precision_loss, reason = "windows are at most a few thousand samples")]
        let x = i as f64;
        *out = intercept + slope * x;
    }

    let tail_start = len - window;
    let (intercept, slope) = fit_line(&data[tail_start..]);
    for (i, out) in output.iter_mut().enumerate().skip(len - half) {
        #[allow(clippy::cast_precision_loss, reason = "windows are at most a few thousand samples")]
        let x = (i - tail_start) as f64;
        *out = intercept + slope * x;
    }

    output
}
