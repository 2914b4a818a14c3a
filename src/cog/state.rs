//! Sequencer state machine and cooperative cancellation
use core::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Where the panel is in its bring-up / shut-down cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequencerState {
    /// Nothing acquired yet
    Uninitialized,
    /// Control lines opened and driven low
    PinsReady,
    /// Power-on sequence running
    PoweringOn,
    /// Rails up, controller out of reset, bus not open yet
    Powered,
    /// Bus channel open
    BusReady,
    /// Busy line released and identity probe answered
    ControllerVerified,
    /// Power-off sequence running
    PoweringOff,
    /// Powered off and discharged
    Idle,
    /// A stage failed, hardware state unknown until the next power-off
    Faulted,
}

impl SequencerState {
    /// `begin` may (re)start from here.
    pub fn can_begin(self) -> bool {
        matches!(
            self,
            SequencerState::Uninitialized | SequencerState::Idle | SequencerState::Faulted
        )
    }
}

impl fmt::Display for SequencerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Named steps of `begin`, used to label failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Opening the control lines
    GpioInit,
    /// Power rail and reset sequencing
    PowerOn,
    /// Opening the bus channel
    SpiInit,
    /// Writing the primer bytes
    Primer,
    /// Busy wait and identity probe
    ControllerInit,
    /// Rail shutdown and discharge
    PowerOff,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::GpioInit => "GPIO initialization",
            Stage::PowerOn => "power-on",
            Stage::SpiInit => "SPI initialization",
            Stage::Primer => "bus primer",
            Stage::ControllerInit => "controller initialization",
            Stage::PowerOff => "power-off",
        };
        f.write_str(name)
    }
}

/// Shared flag asking a running `begin` to stop at the next stage boundary.
///
/// Delays in progress are never interrupted.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// New token, not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Clear a previous request so the sequencer can be started again
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
