//! COG Driver Power Sequencer
//!
//! This module owns the ordered bring-up and shut-down of the panel's
//! chip-on-glass driver. Every line change and every settling delay happens
//! here, in one place, in a fixed order.
//!
//! ## Architecture
//!
//! ### Entry Points
//! - `begin()` - GPIO init, power-on, SPI init, primer, COG probe, power-off
//! - `power_off()` - rail shutdown and discharge, callable on its own
//!
//! ### Stages (individually callable, guarded by [`SequencerState`])
//! - `init_gpio()` - open reset/panel/discharge/border as low outputs, busy as input
//! - `power_on()` - rail and reset sequencing, chip select held by hand
//! - `init_spi()` - open the bus channel at 4 MHz, mode 0
//! - `send_primer()` - two zero bytes before the first read
//! - `init_controller()` - wait for busy low, read the COG ID
//!
//! ## Critical Implementation Details
//!
//! ### Bus Before Discharge
//!
//! The SPI driver holds the clock, data and chip select lines exclusively.
//! `power_off()` closes the channel first, then re-opens those lines as plain
//! outputs driven low, and only then pulses the discharge line.
//!
//! ### Busy Wait
//!
//! The busy line is polled every `busy_poll_ms`. The wait is bounded by
//! `busy_timeout_ms` and fails with [`Error::BusyTimeout`].

use embedded_hal::delay::DelayNs;

use crate::cog::error::Error;
use crate::cog::interface::{drive, init_low, BusLines, ControllerId, PanelHandle};
use crate::cog::pins::{PinMap, PinRole};
use crate::cog::provider::{BusConfig, IoProvider};
use crate::cog::state::{CancelToken, SequencerState, Stage};
use crate::cog::timing::Timing;

/// Panel handle type for a given provider
pub type Panel<P> =
    PanelHandle<<P as IoProvider>::Output, <P as IoProvider>::Input, <P as IoProvider>::Bus>;

/// Everything the sequencer needs to know about the board
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequencerConfig {
    /// Role to pin number mapping
    pub pins: PinMap,
    /// Settling delays
    pub timing: Timing,
    /// Fail the probe unless the COG driver reports this ID
    pub expected_controller_id: Option<u8>,
    /// Run `power_off` when `begin` fails after the lines were acquired
    pub power_off_on_failure: bool,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        SequencerConfig {
            pins: PinMap::default(),
            timing: Timing::default(),
            expected_controller_id: None,
            power_off_on_failure: true,
        }
    }
}

fn acquire_output<P: IoProvider>(
    provider: &mut P,
    pins: &PinMap,
    role: PinRole,
) -> Result<P::Output, Error> {
    let pin = pins.pin(role);
    let output = provider
        .open_output(pin)
        .map_err(|e| Error::GpioAcquisition {
            role,
            pin,
            source: Box::new(e),
        })?;
    Ok(output)
}

fn acquire_input<P: IoProvider>(
    provider: &mut P,
    pins: &PinMap,
    role: PinRole,
) -> Result<P::Input, Error> {
    let pin = pins.pin(role);
    provider.open_input(pin).map_err(|e| Error::GpioAcquisition {
        role,
        pin,
        source: Box::new(e),
    })
}

/// Drives one panel through power-on, probe and power-off.
///
/// ## Type Parameters
///
/// - `P` - [`IoProvider`] opening lines and the bus channel
/// - `D` - Delay provider for settling times
pub struct Sequencer<P: IoProvider, D> {
    provider: P,
    delay: D,
    config: SequencerConfig,
    cancel: CancelToken,
    state: SequencerState,
    panel: Option<Panel<P>>,
    primed: bool,
    controller_id: Option<ControllerId>,
}

impl<P, D> Sequencer<P, D>
where
    P: IoProvider,
    D: DelayNs,
{
    /// Create a sequencer. Nothing is opened until `begin` or `init_gpio`.
    pub fn new(provider: P, delay: D, config: SequencerConfig) -> Self {
        Sequencer {
            provider,
            delay,
            config,
            cancel: CancelToken::new(),
            state: SequencerState::Uninitialized,
            panel: None,
            primed: false,
            controller_id: None,
        }
    }

    /// Use `token` to cancel a running `begin` between stages.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Current state
    pub fn state(&self) -> SequencerState {
        self.state
    }

    /// Open lines and bus, if acquired
    pub fn panel(&self) -> Option<&Panel<P>> {
        self.panel.as_ref()
    }

    /// COG ID read by the last successful `init_controller`
    pub fn controller_id(&self) -> Option<ControllerId> {
        self.controller_id
    }

    /// Bring the panel up, verify the COG driver answers, then power it off again.
    ///
    /// Any failure is returned as [`Error::Begin`] wrapping the failing stage.
    /// When lines were already acquired and `power_off_on_failure` is set, a
    /// best-effort `power_off` runs before returning.
    pub fn begin(&mut self, bus: &str, chip_select: u8) -> Result<(), Error> {
        if !self.state.can_begin() {
            return Err(Error::Begin(Box::new(Error::InvalidState {
                state: self.state,
                operation: "begin",
            })));
        }

        log::info!(
            "Starting COG sequence on {} (chip select {}) using {} I/O provider",
            bus,
            chip_select,
            self.provider.name()
        );

        match self.run_begin(bus, chip_select) {
            Ok(()) => {
                log::info!("COG sequence complete");
                Ok(())
            }
            Err(err) => {
                log::error!("Begin setup failed: {}", err);
                let powered_off = err.failed_stage() == Some(Stage::PowerOff);
                if self.panel.is_some() && self.config.power_off_on_failure && !powered_off {
                    log::warn!("Powering off after failed begin");
                    if let Err(e) = self.power_off() {
                        log::error!("Power-off after failed begin also failed: {}", e);
                    }
                }
                self.state = SequencerState::Faulted;
                Err(Error::Begin(Box::new(err)))
            }
        }
    }

    fn run_begin(&mut self, bus: &str, chip_select: u8) -> Result<(), Error> {
        self.checkpoint(Stage::GpioInit)?;
        self.init_gpio()?;

        self.checkpoint(Stage::PowerOn)?;
        self.power_on()?;

        self.checkpoint(Stage::SpiInit)?;
        self.init_spi(bus, chip_select)?;

        self.checkpoint(Stage::Primer)?;
        self.send_primer()?;

        self.checkpoint(Stage::ControllerInit)?;
        self.init_controller()?;

        self.power_off()
    }

    fn checkpoint(&mut self, stage: Stage) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            log::warn!("Cancelled before {}", stage);
            self.state = SequencerState::Faulted;
            return Err(Error::Cancelled { stage });
        }
        Ok(())
    }

    fn guard(&self, ok: bool, stage: Stage, operation: &'static str) -> Result<(), Error> {
        if ok {
            Ok(())
        } else {
            Err(Error::InvalidState {
                state: self.state,
                operation,
            }
            .at(stage))
        }
    }

    fn fail(&mut self, stage: Stage, err: Error) -> Error {
        log::error!("{} failed: {}", stage, err);
        self.state = SequencerState::Faulted;
        err.at(stage)
    }

    /// Drop every held line and the bus channel.
    fn release(&mut self) {
        if self.panel.take().is_some() {
            log::debug!("Released previously held lines");
        }
        self.primed = false;
        self.controller_id = None;
    }

    /// Open the control lines: reset, panel power, discharge and border as
    /// outputs driven low, busy as an input.
    pub fn init_gpio(&mut self) -> Result<(), Error> {
        self.guard(self.state.can_begin(), Stage::GpioInit, "open GPIO lines")?;
        self.release();
        log::info!("Opening GPIO lines");

        let res = self.open_control_lines();
        match res {
            Ok(panel) => {
                self.panel = Some(panel);
                self.state = SequencerState::PinsReady;
                Ok(())
            }
            Err(e) => Err(self.fail(Stage::GpioInit, e)),
        }
    }

    fn open_control_lines(&mut self) -> Result<Panel<P>, Error> {
        let pins = self.config.pins;
        let provider = &mut self.provider;

        let reset = init_low(acquire_output(provider, &pins, PinRole::Reset)?, PinRole::Reset)?;
        let panel_power = init_low(
            acquire_output(provider, &pins, PinRole::PanelPower)?,
            PinRole::PanelPower,
        )?;
        let discharge = init_low(
            acquire_output(provider, &pins, PinRole::Discharge)?,
            PinRole::Discharge,
        )?;
        let border = init_low(acquire_output(provider, &pins, PinRole::Border)?, PinRole::Border)?;
        let busy = acquire_input(provider, &pins, PinRole::Busy)?;

        Ok(PanelHandle::new(reset, panel_power, discharge, border, busy))
    }

    /// Power the panel and take the COG driver out of reset.
    ///
    /// Chip select is opened as a plain output for the duration of this step
    /// and released at the end, before the bus channel claims it.
    pub fn power_on(&mut self) -> Result<(), Error> {
        self.guard(
            self.state == SequencerState::PinsReady,
            Stage::PowerOn,
            "power on",
        )?;
        log::info!("Powering on COG driver");
        self.state = SequencerState::PoweringOn;

        let res = self.power_on_sequence();
        match res {
            Ok(()) => {
                self.state = SequencerState::Powered;
                Ok(())
            }
            Err(e) => Err(self.fail(Stage::PowerOn, e)),
        }
    }

    fn power_on_sequence(&mut self) -> Result<(), Error> {
        let timing = self.config.timing;
        let panel = self.panel.as_mut().ok_or(Error::PinsNotAcquired)?;
        let delay = &mut self.delay;

        let mut cs = acquire_output(&mut self.provider, &self.config.pins, PinRole::ChipSelect)?;
        drive(&mut cs, PinRole::ChipSelect, false)?;
        delay.delay_ms(timing.cs_low_ms);

        panel.set_panel_power(true)?;
        delay.delay_ms(timing.panel_on_ms);

        panel.set_reset(true)?;
        panel.set_border(true)?;
        drive(&mut cs, PinRole::ChipSelect, true)?;
        delay.delay_ms(timing.lines_high_ms);

        panel.set_reset(false)?;
        delay.delay_ms(timing.reset_low_ms);

        panel.set_reset(true)?;
        delay.delay_ms(timing.reset_high_ms);

        drop(cs);
        log::debug!("chip select released");
        Ok(())
    }

    /// Open the bus channel at 4 MHz, mode 0.
    pub fn init_spi(&mut self, bus: &str, chip_select: u8) -> Result<(), Error> {
        self.guard(
            self.state == SequencerState::Powered,
            Stage::SpiInit,
            "open the SPI channel",
        )?;
        let config = BusConfig::new(bus, chip_select);
        log::info!(
            "Opening SPI channel {} (chip select {}) at {} Hz, {:?}",
            config.bus,
            config.chip_select,
            config.clock_hz,
            config.mode
        );

        let res = self.open_channel(config);
        match res {
            Ok(()) => {
                self.primed = false;
                self.state = SequencerState::BusReady;
                Ok(())
            }
            Err(e) => Err(self.fail(Stage::SpiInit, e)),
        }
    }

    fn open_channel(&mut self, config: BusConfig) -> Result<(), Error> {
        let panel = self.panel.as_mut().ok_or(Error::PinsNotAcquired)?;
        let channel = self
            .provider
            .open_bus(&config)
            .map_err(|e| Error::BusOpen {
                bus: config.bus.clone(),
                chip_select: config.chip_select,
                source: Box::new(e),
            })?;
        panel.attach_bus(channel);
        Ok(())
    }

    /// Write the two zero bytes the COG driver needs before its ID read.
    pub fn send_primer(&mut self) -> Result<(), Error> {
        self.guard(
            self.state == SequencerState::BusReady,
            Stage::Primer,
            "write the bus primer",
        )?;
        let res = match self.panel.as_mut() {
            Some(panel) => panel.write_primer(),
            None => Err(Error::PinsNotAcquired),
        };
        match res {
            Ok(()) => {
                self.primed = true;
                Ok(())
            }
            Err(e) => Err(self.fail(Stage::Primer, e)),
        }
    }

    /// Wait for the busy line to drop, then read the COG ID.
    ///
    /// The ID is only checked when `expected_controller_id` is configured;
    /// otherwise it is kept for [`controller_id`](Self::controller_id).
    pub fn init_controller(&mut self) -> Result<ControllerId, Error> {
        self.guard(
            self.state == SequencerState::BusReady,
            Stage::ControllerInit,
            "probe the COG driver",
        )?;
        self.guard(
            self.primed,
            Stage::ControllerInit,
            "probe the COG driver without the bus primer",
        )?;
        log::info!("Waiting for COG driver");

        let res = self.probe_controller();
        match res {
            Ok(id) => {
                self.controller_id = Some(id);
                self.state = SequencerState::ControllerVerified;
                Ok(id)
            }
            Err(e) => Err(self.fail(Stage::ControllerInit, e)),
        }
    }

    fn probe_controller(&mut self) -> Result<ControllerId, Error> {
        let timing = self.config.timing;
        let panel = self.panel.as_mut().ok_or(Error::PinsNotAcquired)?;

        panel.wait_busy_low(&mut self.delay, &timing)?;
        let id = panel.read_cog_id()?;
        log::info!("COG driver ID {:#04x} (raw {:02x?})", id.id(), id.raw);

        match self.config.expected_controller_id {
            Some(expected) if expected != id.id() => Err(Error::ControllerProbe {
                expected,
                found: id.id(),
            }),
            Some(_) => Ok(id),
            None => {
                log::debug!("COG driver ID not validated");
                Ok(id)
            }
        }
    }

    /// Shut the rails off and discharge the panel.
    ///
    /// Best effort: every step runs even when an earlier one failed, and the
    /// first failure is returned. Calling it again on a powered-off panel
    /// repeats the line writes and reports [`Error::BusClosed`].
    pub fn power_off(&mut self) -> Result<(), Error> {
        if self.panel.is_none() {
            return Err(Error::PinsNotAcquired.at(Stage::PowerOff));
        }
        log::info!("Powering off COG driver");
        self.state = SequencerState::PoweringOff;
        self.primed = false;

        match self.power_off_sequence() {
            None => {
                log::info!("COG driver powered off and discharged");
                self.state = SequencerState::Idle;
                Ok(())
            }
            Some(e) => Err(self.fail(Stage::PowerOff, e)),
        }
    }

    fn power_off_sequence(&mut self) -> Option<Error> {
        let timing = self.config.timing;
        let pins = self.config.pins;
        let panel = self.panel.as_mut()?;
        let provider = &mut self.provider;
        let delay = &mut self.delay;

        let mut first = None;
        let mut note = |res: Result<(), Error>| {
            if let Err(e) = res {
                log::error!("power-off step failed: {}", e);
                first.get_or_insert(e);
            }
        };

        note(panel.set_reset(false));
        note(panel.set_panel_power(false));
        note(panel.set_border(false));

        note(panel.close_bus());

        if panel.bus_lines_held() {
            note(panel.bus_lines_low().map(|_| ()));
        } else {
            match open_bus_lines(provider, &pins) {
                Ok(lines) => panel.hold_bus_lines(lines),
                Err(e) => note(Err(e)),
            }
        }
        delay.delay_ms(timing.discharge_settle_ms);

        debug_assert!(!panel.bus_open());
        for _ in 0..timing.discharge_pulses {
            note(panel.set_discharge(true));
            delay.delay_ms(timing.discharge_high_ms);
            note(panel.set_discharge(false));
            delay.delay_ms(timing.discharge_low_ms);
        }

        first
    }
}

fn open_bus_lines<P: IoProvider>(
    provider: &mut P,
    pins: &PinMap,
) -> Result<BusLines<P::Output>, Error> {
    let clock = init_low(
        acquire_output(provider, pins, PinRole::ClockLine)?,
        PinRole::ClockLine,
    )?;
    let data = init_low(
        acquire_output(provider, pins, PinRole::DataLine)?,
        PinRole::DataLine,
    )?;
    let chip_select = init_low(
        acquire_output(provider, pins, PinRole::ChipSelect)?,
        PinRole::ChipSelect,
    )?;
    Ok(BusLines {
        clock,
        data,
        chip_select,
    })
}
