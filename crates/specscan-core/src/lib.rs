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

//! Wideband power spectral density by frequency sweeping.
//!
//! A narrowband SDR only sees a couple of MHz at once. This library steps such a
//! receiver across a wider range and stitches the per-step spectra into one
//! calibrated PSD trace:
//!
//! - **Planner**: the ladder of tuning frequencies, half a sample rate apart
//! - **Transform**: one FFT per step, keeping the flat middle half of the band
//! - **Assembler**: concatenates step slices in tuning order
//! - **Post-processing**: calibration, dB conversion and Savitzky-Golay smoothing
//! - **Controller**: drives a [`Receiver`] through the plan with progress
//!   reporting and cooperative cancellation
//!
//! # Quick Start
//!
//! ```no_run
//! use specscan_core::{SweepController, SweepRequest};
//! # use specscan_core::{Receiver, ReceiverError, SampleBlock};
//! # struct Dongle;
//! # impl Receiver for Dongle {
//! #     fn set_sample_rate(&mut self, _: f64) -> Result<(), ReceiverError> { Ok(()) }
//! #     fn set_gain(&mut self, _: i32) -> Result<(), ReceiverError> { Ok(()) }
//! #     fn tune(&mut self, _: f64) -> Result<(), ReceiverError> { Ok(()) }
//! #     fn read_samples(&mut self, n: usize) -> Result<SampleBlock, ReceiverError> {
//! #         Ok(SampleBlock::new(vec![Default::default(); n]))
//! #     }
//! #     fn close(&mut self) {}
//! # }
//!
//! let config = SweepRequest::default().normalized().to_config()?;
//! let controller = SweepController::new();
//! let mut handle = controller.spawn(config, Dongle)?;
//!
//! while let Some(percent) = handle.blocking_recv_progress() {
//!     println!("{percent}%");
//! }
//!
//! let outcome = handle.join()?;
//! println!("{:?}: {} points", outcome.status, outcome.trace.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Using Individual Stages
//!
//! ```
//! use specscan_core::{post_process, SampleBlock, SpectrumAssembler, StepTransformer, SweepConfig, SweepPlan};
//! use num_complex::Complex64;
//!
//! let config = SweepConfig::new(144.0e6, 148.0e6, 256);
//! let plan = SweepPlan::from_config(&config);
//! let mut transformer = StepTransformer::new(config.fft_length, config.sample_rate_hz);
//! let mut assembler = SpectrumAssembler::new();
//!
//! for freq in &plan {
//!     let block = SampleBlock::new(vec![Complex64::new(0.1, 0.0); config.capture_len]);
//!     assembler.append(transformer.transform(&block, freq));
//! }
//!
//! let trace = post_process(assembler.finish(), &config);
//! assert_eq!(trace.len(), plan.step_count() * 127);
//! ```

pub mod assembler;
pub mod config;
pub mod controller;
pub mod error;
pub mod planner;
pub mod postprocess;
pub mod receiver;
pub mod transform;

pub use assembler::{CompositeSpectrum, SpectrumAssembler};
pub use config::{PowerUnit, SmoothingMode, SweepConfig, SweepRequest};
pub use controller::{
    progress_fn, ProgressFn, ProgressSink, SweepController, SweepHandle, SweepOutcome, SweepState,
    SweepStatus,
};
pub use error::{ConfigError, SweepError};
pub use planner::{SweepPlan, SweepPlanIter};
pub use postprocess::{post_process, PsdTrace};
pub use receiver::{Receiver, ReceiverError, SampleBlock};
pub use transform::{StepSpectrum, StepTransformer};
