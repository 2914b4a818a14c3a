//! Errors raised while sequencing the panel
use embedded_hal::{digital, spi};
use thiserror::Error;

use crate::cog::pins::PinRole;
use crate::cog::state::{SequencerState, Stage};

/// Boxed error coming out of an [`IoProvider`](crate::cog::provider::IoProvider)
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Everything that can go wrong while powering, probing or discharging the panel.
#[derive(Debug, Error)]
pub enum Error {
    /// A control line could not be opened
    #[error("GPIO initialization failed: could not open {role} line (pin {pin})")]
    GpioAcquisition {
        /// Role of the line
        role: PinRole,
        /// Pin number
        pin: u8,
        /// Provider error
        #[source]
        source: BoxError,
    },

    /// Reading or driving an open line failed
    #[error("{role} line error: {kind}")]
    Pin {
        /// Role of the line
        role: PinRole,
        /// What the pin driver reported
        kind: digital::ErrorKind,
    },

    /// The bus channel could not be opened
    #[error("SPI initialization failed: could not open {bus} (chip select {chip_select})")]
    BusOpen {
        /// Bus identifier
        bus: String,
        /// Chip select index
        chip_select: u8,
        /// Provider error
        #[source]
        source: BoxError,
    },

    /// A transfer on the open bus failed
    #[error("SPI transfer failed: {0}")]
    Bus(spi::ErrorKind),

    /// The bus channel was already closed
    #[error("SPI channel is not open")]
    BusClosed,

    /// Power-off called before the control lines were ever opened
    #[error("control lines have not been acquired")]
    PinsNotAcquired,

    /// The busy line did not drop in time
    #[error("busy line still high after {polls} polls ({timeout_ms}ms)")]
    BusyTimeout {
        /// Reads performed
        polls: u32,
        /// Configured bound
        timeout_ms: u32,
    },

    /// The identity probe answered with an unexpected value
    #[error("COG driver ID mismatch: expected {expected:#04x}, found {found:#04x}")]
    ControllerProbe {
        /// Configured ID
        expected: u8,
        /// ID read back
        found: u8,
    },

    /// A [`CancelToken`](crate::cog::state::CancelToken) fired
    #[error("sequence cancelled before {stage}")]
    Cancelled {
        /// Stage that was not started
        stage: Stage,
    },

    /// The operation is not legal in the current state
    #[error("cannot {operation} while {state}")]
    InvalidState {
        /// Current state
        state: SequencerState,
        /// Refused operation
        operation: &'static str,
    },

    /// A stage of the sequence failed
    #[error("{stage} failed")]
    Stage {
        /// Failing stage
        stage: Stage,
        /// Underlying cause
        #[source]
        source: Box<Error>,
    },

    /// Top-level wrapper returned by `begin`
    #[error("Begin setup failed")]
    Begin(#[source] Box<Error>),
}

impl Error {
    pub(crate) fn at(self, stage: Stage) -> Self {
        Error::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// Innermost stage this error was raised in, if any.
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            Error::Stage { stage, source } => source.failed_stage().or(Some(*stage)),
            Error::Begin(inner) => inner.failed_stage(),
            Error::Cancelled { stage } => Some(*stage),
            _ => None,
        }
    }

    /// The error with every `Stage` and `Begin` wrapper stripped.
    pub fn root(&self) -> &Error {
        match self {
            Error::Stage { source, .. } => source.root(),
            Error::Begin(inner) => inner.root(),
            other => other,
        }
    }
}
