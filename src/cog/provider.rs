//! Access to the platform's GPIO and SPI drivers
//!
//! An [`IoProvider`] is handed to the sequencer at construction. It decides
//! which low-level driver backs the lines, so a faster backend is just a
//! different provider value.
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::{Mode, SpiDevice, MODE_0};

/// SPI clock used for the COG driver, 4 MHz
pub const CLOCK_HZ: u32 = 4_000_000;

/// Settings for opening the bus channel
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusConfig {
    /// Bus identifier, e.g. `SPI0`
    pub bus: String,
    /// Chip select index on that bus
    pub chip_select: u8,
    /// Clock frequency in Hz
    pub clock_hz: u32,
    /// Clock polarity and phase
    pub mode: Mode,
}

impl BusConfig {
    /// Bus settings the COG driver expects: 4 MHz, mode 0.
    pub fn new(bus: impl Into<String>, chip_select: u8) -> Self {
        BusConfig {
            bus: bus.into(),
            chip_select,
            clock_hz: CLOCK_HZ,
            mode: MODE_0,
        }
    }
}

/// Opens lines and bus channels exclusively, by number / identifier.
///
/// Dropping a returned handle closes it and releases the underlying line.
pub trait IoProvider {
    /// Error raised when a line or channel cannot be opened
    type Error: std::error::Error + Send + Sync + 'static;
    /// Line opened as an output
    type Output: OutputPin;
    /// Line opened as an input
    type Input: InputPin;
    /// Open bus channel
    type Bus: SpiDevice;

    /// Short name used in logs
    fn name(&self) -> &str;

    /// Open `pin` exclusively and configure it as an output.
    fn open_output(&mut self, pin: u8) -> Result<Self::Output, Self::Error>;

    /// Open `pin` exclusively and configure it as an input.
    fn open_input(&mut self, pin: u8) -> Result<Self::Input, Self::Error>;

    /// Open the bus channel described by `config`.
    fn open_bus(&mut self, config: &BusConfig) -> Result<Self::Bus, Self::Error>;
}
