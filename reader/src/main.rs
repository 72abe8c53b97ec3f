use std::{error::Error, io, path::PathBuf, time::Duration};

use voltlog_core::config::Config;

mod receive;
mod report;
mod source;

/// A frame is sent in one burst, silence this long inside one means the
/// rest of it is not coming.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

fn main() -> Result<(), Box<dyn Error>> {
    pretty_env_logger::init();

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;
    log::debug!("{config:?}");

    let mut link = source::open(&config, POLL_INTERVAL)?;

    log::info!("Waiting for frames...");
    receive::run(&mut link, &config, &mut io::stdout())
}
