//! Raspberry Pi GPIO and SPI through `rppal`
//!
//! Pins are BCM numbers. Bus identifiers are `SPI0` to `SPI6`, chip select
//! indexes map to `CE0`, `CE1` and `CE2`.
use embedded_hal::spi::{Mode, Phase, Polarity};
use rppal::gpio::{self, Gpio, InputPin, OutputPin};
use rppal::spi::{self, Bus, SimpleHalSpiDevice, SlaveSelect, Spi};
use thiserror::Error;

use crate::cog::provider::{BusConfig, IoProvider};

/// Errors raised while opening Raspberry Pi peripherals
#[derive(Error, Debug)]
pub enum RpiError {
    /// GPIO driver error, including a pin already in use
    #[error("GPIO error: {0}")]
    Gpio(#[from] gpio::Error),

    /// SPI driver error
    #[error("SPI error: {0}")]
    Spi(#[from] spi::Error),

    /// Bus identifier not in `SPI0`..`SPI6`
    #[error("unknown SPI bus {0:?}")]
    UnknownBus(String),

    /// Chip select index not in 0..=2
    #[error("unknown chip select {0}")]
    UnknownChipSelect(u8),
}

/// [`IoProvider`] backed by `/dev/gpiomem` and `/dev/spidev*`
pub struct RpiProvider {
    gpio: Gpio,
}

impl RpiProvider {
    /// Open the GPIO peripheral
    pub fn new() -> Result<Self, RpiError> {
        let gpio = Gpio::new()?;
        Ok(RpiProvider { gpio })
    }
}

fn bus_from_name(name: &str) -> Result<Bus, RpiError> {
    let bus = match name.to_ascii_uppercase().as_str() {
        "SPI0" => Bus::Spi0,
        "SPI1" => Bus::Spi1,
        "SPI2" => Bus::Spi2,
        "SPI3" => Bus::Spi3,
        "SPI4" => Bus::Spi4,
        "SPI5" => Bus::Spi5,
        "SPI6" => Bus::Spi6,
        _ => return Err(RpiError::UnknownBus(name.to_string())),
    };
    Ok(bus)
}

fn slave_select(index: u8) -> Result<SlaveSelect, RpiError> {
    match index {
        0 => Ok(SlaveSelect::Ss0),
        1 => Ok(SlaveSelect::Ss1),
        2 => Ok(SlaveSelect::Ss2),
        other => Err(RpiError::UnknownChipSelect(other)),
    }
}

fn spi_mode(mode: Mode) -> spi::Mode {
    match (mode.polarity, mode.phase) {
        (Polarity::IdleLow, Phase::CaptureOnFirstTransition) => spi::Mode::Mode0,
        (Polarity::IdleLow, Phase::CaptureOnSecondTransition) => spi::Mode::Mode1,
        (Polarity::IdleHigh, Phase::CaptureOnFirstTransition) => spi::Mode::Mode2,
        (Polarity::IdleHigh, Phase::CaptureOnSecondTransition) => spi::Mode::Mode3,
    }
}

impl IoProvider for RpiProvider {
    type Error = RpiError;
    type Output = OutputPin;
    type Input = InputPin;
    type Bus = SimpleHalSpiDevice;

    fn name(&self) -> &str {
        "rppal"
    }

    fn open_output(&mut self, pin: u8) -> Result<OutputPin, RpiError> {
        Ok(self.gpio.get(pin)?.into_output())
    }

    fn open_input(&mut self, pin: u8) -> Result<InputPin, RpiError> {
        Ok(self.gpio.get(pin)?.into_input())
    }

    fn open_bus(&mut self, config: &BusConfig) -> Result<Self::Bus, RpiError> {
        let spi = Spi::new(
            bus_from_name(&config.bus)?,
            slave_select(config.chip_select)?,
            config.clock_hz,
            spi_mode(config.mode),
        )?;
        log::debug!(
            "SPI initialized: Bus={}, SS={}, Speed={}Hz",
            config.bus,
            config.chip_select,
            config.clock_hz
        );
        Ok(SimpleHalSpiDevice::new(spi))
    }
}
