//! Pin definitions for the COG driver board
//!
//! Numbers are BCM GPIO numbers as wired on the Raspberry Pi header. They are
//! only defaults: every role can be remapped through [`PinMap`].

use core::fmt;

/// Pin configuration constants for the default wiring
pub struct Pins;

impl Pins {
    /// Controller reset, active low
    pub const RESET: u8 = 13;
    /// Panel power rail enable
    pub const PANEL_POWER: u8 = 19;
    /// Discharge transistor gate
    pub const DISCHARGE: u8 = 26;
    /// Border control
    pub const BORDER: u8 = 12;
    /// Busy status pin (High when the controller is busy)
    pub const BUSY: u8 = 5;
    /// SPI chip select (CE0)
    pub const CS: u8 = 8;
    /// SPI clock
    pub const SCK: u8 = 11;
    /// SPI Master Out Slave In
    pub const MOSI: u8 = 10;
}

/// The job a physical line does for the panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PinRole {
    /// Controller reset
    Reset,
    /// Panel power rail
    PanelPower,
    /// Discharge pulse output
    Discharge,
    /// Border control
    Border,
    /// Busy input
    Busy,
    /// Bus chip select
    ChipSelect,
    /// Bus clock, driven as plain GPIO during power-off
    ClockLine,
    /// Bus data out, driven as plain GPIO during power-off
    DataLine,
}

impl fmt::Display for PinRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PinRole::Reset => "reset",
            PinRole::PanelPower => "panel power",
            PinRole::Discharge => "discharge",
            PinRole::Border => "border",
            PinRole::Busy => "busy",
            PinRole::ChipSelect => "chip select",
            PinRole::ClockLine => "clock",
            PinRole::DataLine => "data",
        };
        f.write_str(name)
    }
}

/// Role to pin number mapping, fixed for the lifetime of a sequencer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PinMap {
    /// Reset line
    pub reset: u8,
    /// Panel power line
    pub panel_power: u8,
    /// Discharge line
    pub discharge: u8,
    /// Border line
    pub border: u8,
    /// Busy line
    pub busy: u8,
    /// Chip select line
    pub chip_select: u8,
    /// Bus clock line
    pub clock: u8,
    /// Bus data (MOSI) line
    pub data: u8,
}

impl PinMap {
    /// Pin number assigned to `role`.
    pub fn pin(&self, role: PinRole) -> u8 {
        match role {
            PinRole::Reset => self.reset,
            PinRole::PanelPower => self.panel_power,
            PinRole::Discharge => self.discharge,
            PinRole::Border => self.border,
            PinRole::Busy => self.busy,
            PinRole::ChipSelect => self.chip_select,
            PinRole::ClockLine => self.clock,
            PinRole::DataLine => self.data,
        }
    }
}

impl Default for PinMap {
    fn default() -> Self {
        PinMap {
            reset: Pins::RESET,
            panel_power: Pins::PANEL_POWER,
            discharge: Pins::DISCHARGE,
            border: Pins::BORDER,
            busy: Pins::BUSY,
            chip_select: Pins::CS,
            clock: Pins::SCK,
            data: Pins::MOSI,
        }
    }
}
