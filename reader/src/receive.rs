use std::{
    error::Error,
    io::{ErrorKind, Read, Write},
    time::Instant,
};

use voltlog_core::{config::Config, DeviceFrame, FrameDecoder, LOG_CAPACITY};

use crate::report::Report;

/// Decodes frames off `link` and writes every frame that differs from the
/// one before to `out`.
///
/// `link` reads must fail with `TimedOut` or `WouldBlock` when the line is
/// quiet. A partial frame is dropped on such a gap, frames are sent in one
/// burst. Returns after the first frame with `once`, otherwise only with an
/// error: the link closed or stayed silent for `timeout_secs`.
pub fn run(
    link: &mut impl Read,
    config: &Config,
    out: &mut impl Write,
) -> Result<(), Box<dyn Error>> {
    let report = Report::from_config(config);
    let mut decoder = FrameDecoder::<LOG_CAPACITY>::new();
    let mut previous: Option<DeviceFrame> = None;
    let mut last_data = Instant::now();
    let mut buffer = [0; 512];

    loop {
        let len = match link.read(&mut buffer) {
            Ok(0) => return Err("link closed".into()),
            Ok(len) => len,
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                if !decoder.is_idle() {
                    log::warn!("Link went quiet halfway a frame, dropping it");
                    decoder.reset();
                }
                if last_data.elapsed() >= config.timeout() {
                    return Err(format!("no data received for {} s", config.timeout_secs).into());
                }
                continue;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        last_data = Instant::now();

        for &byte in &buffer[..len] {
            let frame = match decoder.push(byte) {
                Ok(Some(frame)) => frame,
                Ok(None) => continue,
                Err(e) => {
                    log::warn!("Malformed frame: {e}");
                    continue;
                }
            };

            if previous.as_ref() == Some(&frame) {
                log::debug!("Frame unchanged, {} measurements", frame.count());
            } else {
                report.write(&frame, out)?;
                previous = Some(frame);
            }

            if config.once {
                return Ok(());
            }
        }
    }
}
