//! Power-up, controller probe and discharge sequencing for COG e-paper panels.
#![deny(missing_docs)]
#![allow(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod backend;
pub mod cog;

pub use crate::cog::driver::{Sequencer, SequencerConfig};
pub use crate::cog::error::Error;
pub use crate::cog::interface::ControllerId;
pub use crate::cog::pins::{PinMap, PinRole, Pins};
pub use crate::cog::provider::{BusConfig, IoProvider};
pub use crate::cog::state::{CancelToken, SequencerState, Stage};
pub use crate::cog::timing::Timing;
