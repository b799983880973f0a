//! Entry point: parses the CLI, stands up logging, opens the serial and
//! tun devices, and hands control to the event loop.

use clap::Parser;
use log::info;

use sixlowpand::config::Config;
use sixlowpand::session::Session;
use sixlowpand::{codec, event_loop, logging, message, serial, tun};

fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    logging::init(config.foreground, config.verbosity)?;

    if let Err(e) = run(config) {
        log::error!("fatal: {e}");
        return Err(e);
    }
    Ok(())
}

fn run(config: Config) -> anyhow::Result<()> {
    let mut serial = serial::SerialLine::open(&config.serial, config.baud)?;

    if config.reset {
        // A pre-bring-up reset is fire-and-forget: the module may not even
        // be listening yet, and the state machine will reset it again on
        // its own initiative if bring-up later stalls.
        let _ = codec::write_message(&mut serial, message::MessageType::Reset.code(), &[]);
    }

    let tun = tun::TunDevice::open(&config.interface)?;
    info!("tun interface {} up", tun.name());

    let network_config = config.network_config();
    let security_config = config.security_config();

    let session = Session::new(
        serial,
        config.interface.clone(),
        config.confignotify.clone(),
        config.mode,
        config.frontend,
        config.diversity,
        config.activityled,
        config.profile,
        network_config,
        security_config,
    );

    info!(
        "starting bring-up on {:?} at {} baud, mode {:?}, region {:?}",
        config.serial, config.baud, config.mode, config.region
    );

    event_loop::run(tun, session)
}
