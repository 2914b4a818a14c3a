//! COG e-paper power sequencing
//!
//! Written for Pervasive Displays COG panels wired to a Raspberry Pi header.
//!
//! The chip-on-glass (COG) driver on these panels must be powered, reset and
//! discharged in a strict order with fixed settling times. Getting it wrong can
//! leave the panel charged or damage it.
//!
//! ### Usage
//! Nothing here talks to hardware directly. To bring a panel up you:
//!
//! 1. implement (or pick) an [`provider::IoProvider`] for the platform's GPIO and SPI drivers
//! 1. create a [`driver::Sequencer`] with that provider, a delay and a [`driver::SequencerConfig`]
//! 1. call [`driver::Sequencer::begin`]; on error call [`driver::Sequencer::power_off`]
//!    if the defensive power-off was disabled
//!
//! ```rust, ignore
//! let mut sequencer = Sequencer::new(provider, delay, SequencerConfig::default());
//! sequencer.begin("SPI0", 0)?;
//! ```

pub mod driver;
pub mod error;
pub mod interface;
pub mod pins;
pub mod provider;
pub mod state;
pub mod timing;

mod cmd;
