use crate::{
    measurement::{LogFull, Measurement, MeasurementLog},
    trigger::SampleTrigger,
    SENTINEL_PREVIOUS,
};

/// Keeps the 8 most significant bits of a `resolution_bits` wide conversion.
pub fn scale_to_u8(raw: u16, resolution_bits: u8) -> u8 {
    let shift = resolution_bits.saturating_sub(u8::BITS as u8);
    (u32::from(raw).checked_shr(shift.into()).unwrap_or(0) & 0xFF) as u8
}

/// A sample is significant when it is strictly below the last retained one.
pub fn is_significant(previous: Option<u8>, value: u8) -> bool {
    value < previous.unwrap_or(SENTINEL_PREVIOUS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Retention {
    Retained(Measurement),
    NotSignificant,
    /// The sample was significant but the log had no room left
    LogFull,
}

/// Peak/decay filter applied to every finished conversion.
///
/// Only the last retained value is compared against, which keeps the per
/// sample cost and the extra memory constant. Following a falling signal
/// this records each new minimum.
#[derive(Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AcquisitionEngine {
    conversions: u32,
}

impl AcquisitionEngine {
    pub const fn new() -> Self {
        Self { conversions: 0 }
    }

    pub fn on_conversion<const N: usize>(
        &mut self,
        value: u8,
        trigger: &mut SampleTrigger,
        log: &mut MeasurementLog<N>,
    ) -> Retention {
        self.conversions = self.conversions.wrapping_add(1);

        if !is_significant(log.last().map(|m| m.value), value) {
            return Retention::NotSignificant;
        }

        let measurement = Measurement::new(trigger.elapsed(), value);
        match log.append(measurement) {
            Ok(()) => {
                trigger.reset_elapsed();
                Retention::Retained(measurement)
            }
            Err(LogFull) => Retention::LogFull,
        }
    }

    /// Conversions evaluated so far, retained or not.
    pub fn conversions(&self) -> u32 {
        self.conversions
    }
}
