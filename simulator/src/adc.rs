use std::time::Duration;

use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal, NormalError};
use tokio::{sync::mpsc, time::Instant};
use voltlog_core::{acquisition::scale_to_u8, Event};

/// Resolution of the simulated converter, same as the STM32F7 ADC.
const RESOLUTION_BITS: u8 = 12;

/// Time between starting a conversion and the complete event.
const CONVERSION_TIME: Duration = Duration::from_micros(500);

/// A battery discharging exponentially towards 0 V, with gaussian read noise.
#[derive(Debug, Clone, Copy)]
pub struct DischargeModel {
    pub volt_max: f32,
    pub start_volts: f32,
    pub time_constant: Duration,
    noise: Normal<f32>,
}

impl DischargeModel {
    pub fn new(
        volt_max: f32,
        start_volts: f32,
        time_constant: Duration,
        noise_volts: f32,
    ) -> Result<Self, NormalError> {
        Ok(Self {
            volt_max,
            start_volts,
            time_constant,
            noise: Normal::new(0.0, noise_volts)?,
        })
    }

    /// Noiseless voltage after `at` of discharging.
    pub fn volts(&self, at: Duration) -> f32 {
        self.start_volts * (-at.as_secs_f32() / self.time_constant.as_secs_f32()).exp()
    }

    /// Raw conversion result at `at`, clamped to the converter range.
    pub fn sample(&self, at: Duration, rng: &mut impl Rng) -> u16 {
        let full_scale = ((1u32 << RESOLUTION_BITS) - 1) as f32;
        let volts = self.volts(at) + self.noise.sample(rng);
        (volts / self.volt_max * full_scale).clamp(0.0, full_scale) as u16
    }
}

/// Samples the model when a conversion is started and delivers the result
/// as an event, like the ADC interrupt does on the board.
pub struct SimulatedAdc {
    model: DischargeModel,
    started: Instant,
    rng: StdRng,
    events: mpsc::Sender<Event>,
}

impl SimulatedAdc {
    pub fn new(model: DischargeModel, events: mpsc::Sender<Event>) -> Self {
        Self {
            model,
            started: Instant::now(),
            rng: StdRng::from_entropy(),
            events,
        }
    }

    pub fn start_conversion(&mut self) {
        let raw = self.model.sample(self.started.elapsed(), &mut self.rng);
        let value = scale_to_u8(raw, RESOLUTION_BITS);
        log::trace!("Converted {raw} -> {value}");

        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(CONVERSION_TIME).await;
            if events.send(Event::ConversionComplete(value)).await.is_err() {
                log::debug!("Coordinator gone, conversion dropped");
            }
        });
    }
}
