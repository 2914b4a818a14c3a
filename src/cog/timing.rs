//! Settling times for the COG power sequence, in milliseconds.
//!
//! These are hardware requirements. Panels with different settling needs get a
//! different [`Timing`], the sequencing code never changes.

/// Delays used by power-on, busy polling and power-off.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timing {
    /// After chip select goes low
    pub cs_low_ms: u32,
    /// After panel power goes high
    pub panel_on_ms: u32,
    /// After reset, border and chip select go high
    pub lines_high_ms: u32,
    /// Reset pulse width
    pub reset_low_ms: u32,
    /// After reset is released
    pub reset_high_ms: u32,
    /// Between busy line reads
    pub busy_poll_ms: u32,
    /// Give up waiting on the busy line after this long
    pub busy_timeout_ms: u32,
    /// After bus lines are forced low, before the first discharge pulse
    pub discharge_settle_ms: u32,
    /// Discharge line high time, per pulse
    pub discharge_high_ms: u32,
    /// Discharge line low time, per pulse
    pub discharge_low_ms: u32,
    /// Number of discharge pulses
    pub discharge_pulses: u8,
}

impl Timing {
    /// Default chip select low time
    pub const CS_LOW_MS: u32 = 5;
    /// Default panel power settle
    pub const PANEL_ON_MS: u32 = 10;
    /// Default wait after lines go high
    pub const LINES_HIGH_MS: u32 = 5;
    /// Default reset pulse width
    pub const RESET_LOW_MS: u32 = 5;
    /// Default wait after reset release
    pub const RESET_HIGH_MS: u32 = 5;
    /// Default busy poll interval
    pub const BUSY_POLL_MS: u32 = 1;
    /// Default busy wait bound, 5 seconds
    pub const BUSY_TIMEOUT_MS: u32 = 5000;
    /// Default settle before discharge
    pub const DISCHARGE_SETTLE_MS: u32 = 150;
    /// Default discharge high time
    pub const DISCHARGE_HIGH_MS: u32 = 150;
    /// Default discharge low time
    pub const DISCHARGE_LOW_MS: u32 = 10;
    /// Default pulse count
    pub const DISCHARGE_PULSES: u8 = 2;

    /// How many busy reads fit in the timeout. Never less than one.
    pub fn max_busy_polls(&self) -> u32 {
        (self.busy_timeout_ms / self.busy_poll_ms.max(1)).max(1)
    }
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            cs_low_ms: Self::CS_LOW_MS,
            panel_on_ms: Self::PANEL_ON_MS,
            lines_high_ms: Self::LINES_HIGH_MS,
            reset_low_ms: Self::RESET_LOW_MS,
            reset_high_ms: Self::RESET_HIGH_MS,
            busy_poll_ms: Self::BUSY_POLL_MS,
            busy_timeout_ms: Self::BUSY_TIMEOUT_MS,
            discharge_settle_ms: Self::DISCHARGE_SETTLE_MS,
            discharge_high_ms: Self::DISCHARGE_HIGH_MS,
            discharge_low_ms: Self::DISCHARGE_LOW_MS,
            discharge_pulses: Self::DISCHARGE_PULSES,
        }
    }
}
