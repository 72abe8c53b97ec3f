use std::{error::Error, sync::Arc, time::Duration};

use tokio::{
    net::TcpListener,
    sync::{broadcast, mpsc},
};
use voltlog_core::{
    Action, DeviceCoordinator, Event, Retention, LOG_CAPACITY, TICK_MULTIPLIER,
};

use crate::adc::{DischargeModel, SimulatedAdc};

mod adc;
mod link;

const EVENT_QUEUE_LEN: usize = 4;
const DEFAULT_LISTEN: &str = "127.0.0.1:7878";
const DEFAULT_TICK_MS: u64 = 250;

const VOLT_MAX: f32 = 2.5;
const START_VOLTS: f32 = 2.4;
const NOISE_VOLTS: f32 = 0.005;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    pretty_env_logger::init();

    let listen = std::env::var("VOLTLOG_LISTEN").unwrap_or_else(|_| DEFAULT_LISTEN.into());
    let tick_period = match std::env::var("VOLTLOG_TICK_MS") {
        Ok(ms) => Duration::from_millis(ms.parse()?),
        Err(_) => Duration::from_millis(DEFAULT_TICK_MS),
    };
    if tick_period.is_zero() {
        return Err("VOLTLOG_TICK_MS must be at least 1".into());
    }

    // Drains to roughly a third within a full log worth of super-ticks
    let super_tick = tick_period * u32::from(TICK_MULTIPLIER);
    let model = DischargeModel::new(
        VOLT_MAX,
        START_VOLTS,
        super_tick * LOG_CAPACITY as u32,
        NOISE_VOLTS,
    )?;

    let (events_sender, mut events) = mpsc::channel(EVENT_QUEUE_LEN);
    let (frames, _) = broadcast::channel::<Arc<[u8]>>(16);

    let listener = TcpListener::bind(&listen).await?;
    log::info!("Serving frames on {}", listener.local_addr()?);
    tokio::spawn(link::serve(listener, frames.clone()));

    tokio::spawn(tick(tick_period, events_sender.clone()));
    let mut adc = SimulatedAdc::new(model, events_sender);

    let mut coordinator = DeviceCoordinator::new(TICK_MULTIPLIER);
    let mut saturation_reported = false;

    log::info!(
        "Ticking every {tick_period:?}, conversion every {TICK_MULTIPLIER} ticks, {LOG_CAPACITY} measurements"
    );

    while let Some(event) = events.recv().await {
        match coordinator.handle(event) {
            Action::StartConversion => adc.start_conversion(),
            Action::Transmit => {
                match coordinator.take_retention() {
                    Some(Retention::Retained(measurement)) => {
                        log::debug!("Retained {measurement:?}")
                    }
                    Some(retention) => log::trace!("{retention:?}"),
                    None => {}
                }

                let mut frame = Vec::new();
                let written = match coordinator.transmit(&mut frame) {
                    Ok(written) => written,
                    Err(never) => match never {},
                };
                log::trace!(
                    "Sending {written} bytes, {} measurements",
                    coordinator.log().len()
                );

                // Without readers the frame is lost, as on an unplugged serial line
                let _ = frames.send(frame.into());

                if coordinator.is_saturated() && !saturation_reported {
                    log::info!("Measurement log full, acquisition stopped");
                    saturation_reported = true;
                }
            }
            Action::Wait => {
                log::warn!("{event:?} arrived while in {:?}", coordinator.state())
            }
        }
    }

    Ok(())
}

/// Stands in for the TIM2 interrupt.
async fn tick(period: Duration, events: mpsc::Sender<Event>) {
    let mut interval = tokio::time::interval(period);
    // The first tick of an interval completes immediately, like the first
    // timer update on the board comes one period after start
    interval.tick().await;

    loop {
        interval.tick().await;
        if events.try_send(Event::Tick).is_err() {
            log::error!("Event queue full, tick lost");
        }
    }
}
