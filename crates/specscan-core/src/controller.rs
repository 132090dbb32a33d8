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

//! Sweep orchestration.
//!
//! The controller owns the run lifecycle:
//!
//! ```text
//! Idle -> Running -> Completed
//!                 -> Cancelled
//!                 -> Failed
//! ```
//!
//! A sweep either runs inline with [`SweepController::run`] or on a dedicated
//! worker thread with [`SweepController::spawn`]. Only one sweep may be in
//! flight per controller, and one controller is meant to front one device.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::assembler::SpectrumAssembler;
use crate::config::SweepConfig;
use crate::error::SweepError;
use crate::planner::SweepPlan;
use crate::postprocess::{post_process, PsdTrace};
use crate::receiver::{Receiver, ReceiverError, SampleBlock};
use crate::transform::{retained_len, StepTransformer};

/// Lifecycle state of a [`SweepController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SweepState {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl SweepState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

/// How a sweep that produced a trace ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepStatus {
    /// Every planned step was acquired.
    Completed,
    /// Stopped early; the trace covers the steps acquired before the stop.
    Cancelled,
}

/// Result of a sweep that ended with a trace.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepOutcome {
    pub status: SweepStatus,
    pub trace: PsdTrace,
}

/// Receives sweep progress as a percentage in `0..=100`.
///
/// Reports are non-decreasing and a sweep that returns a trace always ends
/// with 100.
pub trait ProgressSink {
    fn report(&mut self, percent: u8);
}

impl ProgressSink for mpsc::UnboundedSender<u8> {
    fn report(&mut self, percent: u8) {
        // A dropped receiver only means nobody is watching.
        let _ = self.send(percent);
    }
}

impl ProgressSink for Vec<u8> {
    fn report(&mut self, percent: u8) {
        self.push(percent);
    }
}

/// Discards progress.
impl ProgressSink for () {
    fn report(&mut self, _percent: u8) {}
}

/// Adapts a closure into a [`ProgressSink`].
pub struct ProgressFn<F>(F);

impl<F: FnMut(u8)> ProgressSink for ProgressFn<F> {
    fn report(&mut self, percent: u8) {
        (self.0)(percent);
    }
}

impl<F> std::fmt::Debug for ProgressFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressFn").finish_non_exhaustive()
    }
}

/// Wrap a closure so it can be handed to [`SweepController::run`].
#[must_use]
pub fn progress_fn<F: FnMut(u8)>(f: F) -> ProgressFn<F> {
    ProgressFn(f)
}

/// Percentage of the range covered once `freq_hz` has been acquired.
fn progress_percent(plan: &SweepPlan, freq_hz: f64) -> u8 {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "value is clamped to 0..=100"
    )]
    let percent = (plan.progress_at(freq_hz) * 100.0).floor() as u8;
    percent
}

/// Holds the controller in `Running` and writes the terminal state on drop.
///
/// Anything that leaves the run early, including a panic, ends in `Failed`
/// unless a different outcome was recorded first.
struct RunGuard {
    state: Arc<Mutex<SweepState>>,
    terminal: SweepState,
}

impl RunGuard {
    fn finish(mut self, terminal: SweepState) {
        self.terminal = terminal;
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = self.terminal;
    }
}

/// Runs sweeps against a receiver and tracks their state.
///
/// Cloning shares the state, so a clone can observe or be rejected by a sweep
/// started through another clone.
#[derive(Debug, Clone, Default)]
pub struct SweepController {
    state: Arc<Mutex<SweepState>>,
}

impl SweepController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> SweepState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == SweepState::Running
    }

    fn begin(&self) -> Result<RunGuard, SweepError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == SweepState::Running {
            return Err(SweepError::Busy);
        }
        *state = SweepState::Running;

        Ok(RunGuard {
            state: Arc::clone(&self.state),
            terminal: SweepState::Failed,
        })
    }

    /// Run a sweep on the calling thread.
    ///
    /// The configuration is validated before anything else happens; a rejected
    /// configuration leaves the controller state untouched and the receiver
    /// unused. The receiver is closed when the sweep ends, whatever the outcome.
    ///
    /// # Errors
    ///
    /// [`SweepError::Config`] for an invalid configuration, [`SweepError::Busy`]
    /// when another sweep is running, [`SweepError::Setup`] or
    /// [`SweepError::Acquisition`] when the receiver fails.
    pub fn run<R, P>(
        &self,
        config: &SweepConfig,
        receiver: R,
        cancel: &CancellationToken,
        progress: &mut P,
    ) -> Result<SweepOutcome, SweepError>
    where
        R: Receiver,
        P: ProgressSink + ?Sized,
    {
        config.validate()?;
        let guard = self.begin()?;
        execute(guard, config, receiver, cancel, progress)
    }

    /// Run a sweep on a dedicated worker thread.
    ///
    /// Validation and the busy check happen before this returns; the controller
    /// is already `Running` when the handle is handed back.
    ///
    /// # Errors
    ///
    /// [`SweepError::Config`], [`SweepError::Busy`], or [`SweepError::Spawn`]
    /// when the thread cannot be created.
    pub fn spawn<R>(&self, config: SweepConfig, receiver: R) -> Result<SweepHandle, SweepError>
    where
        R: Receiver + Send + 'static,
    {
        self.spawn_with(config, move || Ok(receiver))
    }

    /// Like [`SweepController::spawn`], but the receiver is opened on the worker
    /// thread. Use this for device handles that cannot be sent between threads.
    ///
    /// A failing `open` ends the sweep with [`SweepError::Setup`].
    pub fn spawn_with<R, F>(&self, config: SweepConfig, open: F) -> Result<SweepHandle, SweepError>
    where
        R: Receiver,
        F: FnOnce() -> Result<R, ReceiverError> + Send + 'static,
    {
        config.validate()?;
        let guard = self.begin()?;

        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let worker_cancel = cancel.clone();

        let join = std::thread::Builder::new()
            .name("sweep".to_string())
            .spawn(move || {
                let mut progress_tx = progress_tx;
                let receiver = open().map_err(|e| {
                    log::error!("Failed to open receiver: {}", e);
                    SweepError::Setup(e)
                })?;
                execute(guard, &config, receiver, &worker_cancel, &mut progress_tx)
            })
            .map_err(SweepError::Spawn)?;

        Ok(SweepHandle {
            progress_rx,
            cancel,
            join,
        })
    }
}

fn execute<R, P>(
    guard: RunGuard,
    config: &SweepConfig,
    mut receiver: R,
    cancel: &CancellationToken,
    progress: &mut P,
) -> Result<SweepOutcome, SweepError>
where
    R: Receiver,
    P: ProgressSink + ?Sized,
{
    let plan = SweepPlan::from_config(config);
    let steps = plan.step_count();

    log::info!(
        "Sweep starting: {:.3} - {:.3} MHz, {} steps, FFT {}, gain {} dB",
        config.start_freq_hz / 1e6,
        config.stop_freq_hz / 1e6,
        steps,
        config.fft_length,
        config.gain_db
    );

    let setup = receiver
        .set_sample_rate(config.sample_rate_hz)
        .and_then(|()| receiver.set_gain(config.gain_db));
    if let Err(e) = setup {
        log::error!("Receiver setup failed: {}", e);
        receiver.close();
        return Err(SweepError::Setup(e));
    }

    let mut transformer = StepTransformer::new(config.fft_length, config.sample_rate_hz);
    let mut assembler = SpectrumAssembler::with_capacity(steps, retained_len(config.fft_length));
    let mut status = SweepStatus::Completed;

    for freq_hz in &plan {
        if cancel.is_cancelled() {
            status = SweepStatus::Cancelled;
            break;
        }

        let block = match acquire(&mut receiver, freq_hz, config) {
            Ok(block) => block,
            Err(source) => {
                log::error!("Acquisition failed at {:.3} MHz: {}", freq_hz / 1e6, source);
                receiver.close();
                return Err(SweepError::Acquisition { freq_hz, source });
            }
        };

        assembler.append(transformer.transform(&block, freq_hz));

        let percent = progress_percent(&plan, freq_hz);
        log::debug!(
            "Step {}/{} at {:.3} MHz ({}%)",
            assembler.step_count(),
            steps,
            freq_hz / 1e6,
            percent
        );
        progress.report(percent);
    }

    receiver.close();
    drop(receiver);

    let composite = assembler.finish();
    let acquired = composite.steps;
    let trace = post_process(composite, config);
    progress.report(100);

    let terminal = match status {
        SweepStatus::Completed => SweepState::Completed,
        SweepStatus::Cancelled => SweepState::Cancelled,
    };
    log::info!(
        "Sweep {:?}: {} of {} steps, {} points",
        status,
        acquired,
        steps,
        trace.len()
    );
    guard.finish(terminal);

    Ok(SweepOutcome { status, trace })
}

fn acquire<R: Receiver>(
    receiver: &mut R,
    freq_hz: f64,
    config: &SweepConfig,
) -> Result<SampleBlock, ReceiverError> {
    receiver.tune(freq_hz)?;
    let block = receiver.read_samples(config.capture_len)?;
    if block.len() < config.fft_length {
        return Err(ReceiverError::ShortRead {
            expected: config.capture_len,
            got: block.len(),
        });
    }
    Ok(block)
}

/// A sweep running on its worker thread.
#[derive(Debug)]
pub struct SweepHandle {
    progress_rx: mpsc::UnboundedReceiver<u8>,
    cancel: CancellationToken,
    join: JoinHandle<Result<SweepOutcome, SweepError>>,
}

impl SweepHandle {
    /// Ask the sweep to stop at the next step boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Next progress report, if one is waiting.
    pub fn try_recv_progress(&mut self) -> Option<u8> {
        self.progress_rx.try_recv().ok()
    }

    /// Wait for the next progress report. `None` once the sweep has ended and
    /// every report has been drained.
    pub async fn recv_progress(&mut self) -> Option<u8> {
        self.progress_rx.recv().await
    }

    /// Blocking variant of [`SweepHandle::recv_progress`] for non-async callers.
    pub fn blocking_recv_progress(&mut self) -> Option<u8> {
        self.progress_rx.blocking_recv()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the worker thread and return its result.
    ///
    /// # Errors
    ///
    /// The sweep's own error, or [`SweepError::WorkerPanicked`].
    pub fn join(self) -> Result<SweepOutcome, SweepError> {
        self.join.join().map_err(|payload| {
            let msg = payload
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("unknown panic");
            log::error!("Sweep worker panicked: {}", msg);
            SweepError::WorkerPanicked
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;
    use std::sync::mpsc as std_mpsc;

    #[derive(Debug, Default)]
    struct Calls {
        sample_rate: Option<f64>,
        gain: Option<i32>,
        tunes: Vec<f64>,
        reads: usize,
        closed: usize,
    }

    struct ScriptedReceiver {
        calls: Arc<Mutex<Calls>>,
        fail_on_read: Option<usize>,
        short_reads: bool,
        cancel_on_read: Option<(usize, CancellationToken)>,
        gate: Option<std_mpsc::Receiver<()>>,
    }

    impl ScriptedReceiver {
        fn new() -> (Self, Arc<Mutex<Calls>>) {
            let calls = Arc::new(Mutex::new(Calls::default()));
            let receiver = Self {
                calls: Arc::clone(&calls),
                fail_on_read: None,
                short_reads: false,
                cancel_on_read: None,
                gate: None,
            };
            (receiver, calls)
        }
    }

    impl Receiver for ScriptedReceiver {
        fn set_sample_rate(&mut self, hz: f64) -> Result<(), ReceiverError> {
            self.calls.lock().unwrap().sample_rate = Some(hz);
            Ok(())
        }

        fn set_gain(&mut self, db: i32) -> Result<(), ReceiverError> {
            self.calls.lock().unwrap().gain = Some(db);
            Ok(())
        }

        fn tune(&mut self, center_freq_hz: f64) -> Result<(), ReceiverError> {
            self.calls.lock().unwrap().tunes.push(center_freq_hz);
            Ok(())
        }

        fn read_samples(&mut self, count: usize) -> Result<SampleBlock, ReceiverError> {
            if let Some(gate) = self.gate.take() {
                let _ = gate.recv();
            }

            let read = {
                let mut calls = self.calls.lock().unwrap();
                calls.reads += 1;
                calls.reads
            };

            if let Some((n, token)) = &self.cancel_on_read {
                if read == *n {
                    token.cancel();
                }
            }
            if self.fail_on_read == Some(read) {
                return Err(ReceiverError::Disconnected);
            }

            let count = if self.short_reads { 16 } else { count };
            Ok(SampleBlock::new(vec![Complex64::new(0.5, -0.25); count]))
        }

        fn close(&mut self) {
            self.calls.lock().unwrap().closed += 1;
        }
    }

    // Exactly five rungs: 100.0, 101.2, 102.4, 103.6, 104.8 MHz.
    fn five_step_config() -> SweepConfig {
        SweepConfig::new(100.0e6, 104.8e6, 256)
    }

    #[test]
    fn test_completed_sweep() {
        let controller = SweepController::new();
        let (receiver, calls) = ScriptedReceiver::new();
        let mut progress = Vec::new();

        let outcome = controller
            .run(&five_step_config(), receiver, &CancellationToken::new(), &mut progress)
            .unwrap();

        assert_eq!(outcome.status, SweepStatus::Completed);
        assert_eq!(outcome.trace.step_count, 5);
        assert_eq!(outcome.trace.len(), 5 * 127);
        assert_eq!(controller.state(), SweepState::Completed);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.sample_rate, Some(2.4e6));
        assert_eq!(calls.gain, Some(15));
        assert_eq!(calls.tunes.len(), 5);
        assert_eq!(calls.closed, 1);

        assert_eq!(progress.first(), Some(&0));
        assert_eq!(progress.last(), Some(&100));
        assert!(progress.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_cancel_after_first_step() {
        let controller = SweepController::new();
        let cancel = CancellationToken::new();
        let (mut receiver, calls) = ScriptedReceiver::new();
        receiver.cancel_on_read = Some((1, cancel.clone()));
        let mut progress = Vec::new();

        let outcome = controller
            .run(&five_step_config(), receiver, &cancel, &mut progress)
            .unwrap();

        assert_eq!(outcome.status, SweepStatus::Cancelled);
        assert_eq!(outcome.trace.step_count, 1);
        assert_eq!(outcome.trace.len(), 127);
        assert_eq!(controller.state(), SweepState::Cancelled);
        assert_eq!(calls.lock().unwrap().tunes, vec![100.0e6]);
        assert_eq!(calls.lock().unwrap().closed, 1);
        assert_eq!(progress, vec![0, 100]);
    }

    #[test]
    fn test_cancelled_before_start_yields_empty_trace() {
        let controller = SweepController::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (receiver, calls) = ScriptedReceiver::new();

        let outcome = controller
            .run(&five_step_config(), receiver, &cancel, &mut ())
            .unwrap();

        assert_eq!(outcome.status, SweepStatus::Cancelled);
        assert!(outcome.trace.is_empty());
        assert!(calls.lock().unwrap().tunes.is_empty());
        assert_eq!(calls.lock().unwrap().closed, 1);
    }

    #[test]
    fn test_acquisition_fault_discards_data() {
        let controller = SweepController::new();
        let (mut receiver, calls) = ScriptedReceiver::new();
        receiver.fail_on_read = Some(2);

        let err = controller
            .run(&five_step_config(), receiver, &CancellationToken::new(), &mut ())
            .unwrap_err();

        match err {
            SweepError::Acquisition { freq_hz, source } => {
                assert_eq!(freq_hz, 101.2e6);
                assert!(matches!(source, ReceiverError::Disconnected));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(controller.state(), SweepState::Failed);
        assert_eq!(calls.lock().unwrap().closed, 1);
    }

    #[test]
    fn test_short_read_is_a_fault() {
        let controller = SweepController::new();
        let (mut receiver, _calls) = ScriptedReceiver::new();
        receiver.short_reads = true;

        let err = controller
            .run(&five_step_config(), receiver, &CancellationToken::new(), &mut ())
            .unwrap_err();
        assert!(matches!(
            err,
            SweepError::Acquisition {
                source: ReceiverError::ShortRead { got: 16, .. },
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_config_rejected_before_receiver_use() {
        let controller = SweepController::new();
        let (receiver, calls) = ScriptedReceiver::new();
        let config = SweepConfig::new(500.0e6, 400.0e6, 256);

        let err = controller
            .run(&config, receiver, &CancellationToken::new(), &mut ())
            .unwrap_err();

        assert!(matches!(err, SweepError::Config(_)));
        assert_eq!(controller.state(), SweepState::Idle);
        let calls = calls.lock().unwrap();
        assert_eq!(calls.sample_rate, None);
        assert_eq!(calls.closed, 0);
    }

    #[test]
    fn test_busy_while_running() {
        let controller = SweepController::new();
        let (gate_tx, gate_rx) = std_mpsc::channel();
        let (mut receiver, _calls) = ScriptedReceiver::new();
        receiver.gate = Some(gate_rx);

        let handle = controller.spawn(five_step_config(), receiver).unwrap();
        assert!(controller.is_running());

        let (second, second_calls) = ScriptedReceiver::new();
        let err = controller
            .clone()
            .run(&five_step_config(), second, &CancellationToken::new(), &mut ())
            .unwrap_err();
        assert!(matches!(err, SweepError::Busy));
        assert!(second_calls.lock().unwrap().tunes.is_empty());

        gate_tx.send(()).unwrap();
        let outcome = handle.join().unwrap();
        assert_eq!(outcome.status, SweepStatus::Completed);
        assert_eq!(controller.state(), SweepState::Completed);
    }

    #[test]
    fn test_spawned_progress_ends_at_100() {
        let controller = SweepController::new();
        let (receiver, _calls) = ScriptedReceiver::new();

        let mut handle = controller.spawn(five_step_config(), receiver).unwrap();
        let mut reports = Vec::new();
        while let Some(p) = handle.blocking_recv_progress() {
            reports.push(p);
        }

        assert_eq!(reports.last(), Some(&100));
        assert_eq!(reports, vec![0, 25, 50, 75, 100, 100]);
        assert!(handle.join().is_ok());
    }

    #[test]
    fn test_controller_reusable_after_failure() {
        let controller = SweepController::new();
        let (mut receiver, _calls) = ScriptedReceiver::new();
        receiver.fail_on_read = Some(1);
        assert!(controller
            .run(&five_step_config(), receiver, &CancellationToken::new(), &mut ())
            .is_err());

        let (receiver, _calls) = ScriptedReceiver::new();
        let mut seen = Vec::new();
        let outcome = controller
            .run(
                &five_step_config(),
                receiver,
                &CancellationToken::new(),
                &mut progress_fn(|p| seen.push(p)),
            )
            .unwrap();
        assert_eq!(outcome.status, SweepStatus::Completed);
        assert_eq!(seen.last(), Some(&100));
    }

    #[test]
    fn test_spawn_with_open_failure() {
        let controller = SweepController::new();
        let handle = controller
            .spawn_with(five_step_config(), || {
                Err::<ScriptedReceiver, _>(ReceiverError::Open("no device".to_string()))
            })
            .unwrap();

        let err = handle.join().unwrap_err();
        assert!(matches!(err, SweepError::Setup(ReceiverError::Open(_))));
        assert_eq!(controller.state(), SweepState::Failed);
    }

    #[test]
    fn test_progress_percent_floors() {
        let plan = SweepPlan::new(100.0e6, 110.0e6, 2.4e6);
        assert_eq!(progress_percent(&plan, 100.0e6), 0);
        assert_eq!(progress_percent(&plan, 102.5e6), 25);
        assert_eq!(progress_percent(&plan, 110.8e6), 100);
    }
}
