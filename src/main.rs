use anyhow::Context;

use cog_sequencer::backend::rpi::RpiProvider;
use cog_sequencer::{Sequencer, SequencerConfig};
use rppal::hal::Delay;

// Usage: cog-sequencer [BUS] [CHIP_SELECT], defaults SPI0 0
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let bus = args.next().unwrap_or_else(|| "SPI0".to_string());
    let chip_select: u8 = match args.next() {
        Some(cs) => cs
            .parse()
            .with_context(|| format!("invalid chip select {:?}", cs))?,
        None => 0,
    };

    let provider = RpiProvider::new().context("could not open the GPIO peripheral")?;
    let mut sequencer = Sequencer::new(provider, Delay::new(), SequencerConfig::default());

    if let Err(e) = sequencer.begin(&bus, chip_select) {
        log::error!("COG sequence failed in {:?}", e.failed_stage());
        return Err(e.into());
    }

    if let Some(id) = sequencer.controller_id() {
        log::info!("COG driver ID: {:#04x}", id.id());
    }
    log::info!("Panel is powered off and discharged");
    Ok(())
}
