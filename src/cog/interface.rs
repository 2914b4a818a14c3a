//! The panel handle: every line and the bus channel owned by one display
use embedded_hal::{
    delay::DelayNs,
    digital::{Error as _, InputPin, OutputPin},
    spi::{Error as _, SpiDevice},
};

use crate::cog::{cmd::Cmd, error::Error, pins::PinRole, timing::Timing};

/// Answer to the COG ID read
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControllerId {
    /// Both bytes clocked in during the two byte transfer
    pub raw: [u8; 2],
}

impl ControllerId {
    /// Byte clocked out after the command byte
    pub fn id(&self) -> u8 {
        self.raw[1]
    }
}

/// Bus lines re-opened as plain outputs once the bus channel is closed
pub struct BusLines<O> {
    /// Clock line
    pub clock: O,
    /// Data out line
    pub data: O,
    /// Chip select line
    pub chip_select: O,
}

/// Exclusive owner of the control lines and, while open, the bus channel.
pub struct PanelHandle<O, I, B> {
    reset: O,
    panel_power: O,
    discharge: O,
    border: O,
    /// High while the COG driver cannot take commands
    busy: I,
    bus: Option<B>,
    /// Set once a channel was attached to this handle
    bus_opened: bool,
    bus_lines: Option<BusLines<O>>,
}

pub(crate) fn drive<O: OutputPin>(pin: &mut O, role: PinRole, high: bool) -> Result<(), Error> {
    log::debug!("{} -> {}", role, if high { "high" } else { "low" });
    let res = if high { pin.set_high() } else { pin.set_low() };
    res.map_err(|e| {
        log::error!("failed to drive {} line: {:?}", role, e);
        Error::Pin {
            role,
            kind: e.kind(),
        }
    })
}

/// Drive a freshly opened output low, the way every output starts out.
pub(crate) fn init_low<O: OutputPin>(mut pin: O, role: PinRole) -> Result<O, Error> {
    drive(&mut pin, role, false)?;
    Ok(pin)
}

impl<O, I, B> PanelHandle<O, I, B> {
    /// Wrap already opened lines. Outputs are expected to be low.
    pub fn new(reset: O, panel_power: O, discharge: O, border: O, busy: I) -> Self {
        PanelHandle {
            reset,
            panel_power,
            discharge,
            border,
            busy,
            bus: None,
            bus_opened: false,
            bus_lines: None,
        }
    }

    /// Whether the bus channel is currently open
    pub fn bus_open(&self) -> bool {
        self.bus.is_some()
    }

    /// Whether the bus lines are held as plain outputs
    pub fn bus_lines_held(&self) -> bool {
        self.bus_lines.is_some()
    }

    /// Hand over a freshly opened bus channel.
    pub(crate) fn attach_bus(&mut self, bus: B) {
        self.bus = Some(bus);
        self.bus_opened = true;
    }

    /// Drop the bus channel, releasing its lines to the GPIO driver.
    ///
    /// A channel that was never opened is nothing to close. Closing one that
    /// is already closed is [`Error::BusClosed`].
    pub(crate) fn close_bus(&mut self) -> Result<(), Error> {
        match self.bus.take() {
            Some(bus) => {
                drop(bus);
                log::debug!("SPI channel closed");
                Ok(())
            }
            None if self.bus_opened => Err(Error::BusClosed),
            None => {
                log::debug!("SPI channel never opened, nothing to close");
                Ok(())
            }
        }
    }

    pub(crate) fn hold_bus_lines(&mut self, lines: BusLines<O>) {
        self.bus_lines = Some(lines);
    }
}

impl<O, I, B> PanelHandle<O, I, B>
where
    O: OutputPin,
    I: InputPin,
    B: SpiDevice,
{
    pub(crate) fn set_panel_power(&mut self, high: bool) -> Result<(), Error> {
        drive(&mut self.panel_power, PinRole::PanelPower, high)
    }

    pub(crate) fn set_reset(&mut self, high: bool) -> Result<(), Error> {
        drive(&mut self.reset, PinRole::Reset, high)
    }

    pub(crate) fn set_border(&mut self, high: bool) -> Result<(), Error> {
        drive(&mut self.border, PinRole::Border, high)
    }

    pub(crate) fn set_discharge(&mut self, high: bool) -> Result<(), Error> {
        drive(&mut self.discharge, PinRole::Discharge, high)
    }

    /// Drive the held bus lines low again, if they are held.
    pub(crate) fn bus_lines_low(&mut self) -> Result<bool, Error> {
        match self.bus_lines.as_mut() {
            Some(lines) => {
                drive(&mut lines.clock, PinRole::ClockLine, false)?;
                drive(&mut lines.data, PinRole::DataLine, false)?;
                drive(&mut lines.chip_select, PinRole::ChipSelect, false)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Read the busy line; `true` while the controller is busy.
    pub fn is_busy(&mut self) -> Result<bool, Error> {
        self.busy.is_high().map_err(|e| Error::Pin {
            role: PinRole::Busy,
            kind: e.kind(),
        })
    }

    /// Poll the busy line until it drops, sleeping `busy_poll_ms` between reads.
    ///
    /// Gives up once `busy_timeout_ms` worth of poll delays have passed with
    /// the line still high. Returns how many reads saw the line high.
    pub fn wait_busy_low(
        &mut self,
        delay: &mut impl DelayNs,
        timing: &Timing,
    ) -> Result<u32, Error> {
        let max_polls = timing.max_busy_polls();
        let mut high_reads = 0u32;

        while self.is_busy()? {
            high_reads += 1;
            delay.delay_ms(timing.busy_poll_ms);
            if high_reads >= max_polls {
                log::error!("busy line still high after {} polls, giving up", high_reads);
                return Err(Error::BusyTimeout {
                    polls: high_reads,
                    timeout_ms: timing.busy_timeout_ms,
                });
            }
        }

        if high_reads > 0 {
            log::debug!("busy line dropped after {} polls", high_reads);
        }
        Ok(high_reads)
    }

    fn bus(&mut self) -> Result<&mut B, Error> {
        self.bus.as_mut().ok_or(Error::BusClosed)
    }

    /// Write the two zero bytes the COG driver needs before it answers.
    pub(crate) fn write_primer(&mut self) -> Result<(), Error> {
        self.bus()?.write(&Cmd::PRIMER).map_err(|e| {
            log::error!("SPI write error for primer: {:?}", e);
            Error::Bus(e.kind())
        })
    }

    /// Full-duplex COG ID read.
    pub(crate) fn read_cog_id(&mut self) -> Result<ControllerId, Error> {
        let mut raw = [0u8; 2];
        self.bus()?.transfer(&mut raw, &Cmd::READ_COG_ID).map_err(|e| {
            log::error!("SPI transfer error for COG ID read: {:?}", e);
            Error::Bus(e.kind())
        })?;
        Ok(ControllerId { raw })
    }
}
