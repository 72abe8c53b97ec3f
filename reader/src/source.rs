use std::{error::Error, io::Read, net::TcpStream, time::Duration};

use voltlog_core::config::{Config, Source};

/// Opens the configured link. Reads on it fail with `TimedOut` or
/// `WouldBlock` after `poll` without data.
pub fn open(config: &Config, poll: Duration) -> Result<Box<dyn Read + Send>, Box<dyn Error>> {
    match &config.source {
        Source::Serial { path, baud_rate } => {
            log::info!("Opening serial port '{path}' at {baud_rate} baud...");
            let port = serialport::new(path, *baud_rate)
                .data_bits(serialport::DataBits::Eight)
                .parity(serialport::Parity::None)
                .stop_bits(serialport::StopBits::One)
                .timeout(poll)
                .open()?;
            Ok(Box::new(port))
        }
        Source::Tcp(address) => {
            log::info!("Connecting to the simulator at '{address}'...");
            let stream = TcpStream::connect(address)?;
            stream.set_read_timeout(Some(poll))?;
            Ok(Box::new(stream))
        }
    }
}
