use fugit::HertzU32;
use hal::{
    pac,
    rcc::{self, Enable, Reset},
};
use stm32f7xx_hal as hal;

/// Rate TIM2 counts at after the prescaler.
pub const COUNTER_HZ: u32 = 10_000;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TimerConfig {
    pub prescaler: u16,
    pub auto_reload: u32,
}

impl TimerConfig {
    /// Prescaler and reload value for an update event every `period_secs`.
    ///
    /// `None` when the timer clock is not a multiple of [`COUNTER_HZ`] or
    /// the division does not fit the 16 bit prescaler.
    pub fn for_period(timclk: HertzU32, period_secs: u32) -> Option<Self> {
        let timclk = timclk.to_Hz();
        if timclk % COUNTER_HZ != 0 {
            return None;
        }

        let prescaler = (timclk / COUNTER_HZ).checked_sub(1)?;
        let auto_reload = period_secs.checked_mul(COUNTER_HZ)?.checked_sub(1)?;

        Some(Self {
            prescaler: prescaler.try_into().ok()?,
            auto_reload,
        })
    }
}

/// TIM2 as the periodic tick source.
pub struct TickTimer {
    tim2: pac::TIM2,
}

impl TickTimer {
    pub fn init(tim2: pac::TIM2, config: TimerConfig, apb1: &mut rcc::APB1) -> Self {
        <pac::TIM2 as Enable>::enable(apb1);
        <pac::TIM2 as Reset>::reset(apb1);

        tim2.psc.write(|w| unsafe { w.psc().bits(config.prescaler) });
        tim2.arr.write(|w| w.arr().bits(config.auto_reload));

        // Load the prescaler now instead of at the first overflow, then drop
        // the update flag this raised
        tim2.egr.write(|w| w.ug().set_bit());
        tim2.sr.modify(|_, w| w.uif().clear_bit());

        // Interrupt on every update event
        tim2.dier.modify(|_, w| w.uie().enabled());

        // Enable TIM2
        tim2.cr1.modify(|_, w| w.cen().enabled());

        Self { tim2 }
    }

    pub fn clear_interrupt(&mut self) {
        self.tim2.sr.modify(|_, w| w.uif().clear_bit());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fugit::RateExtU32;

    #[test]
    fn default_clock_fifteen_seconds() {
        assert_eq!(
            TimerConfig::for_period(16u32.MHz(), 15),
            Some(TimerConfig {
                prescaler: 1_599,
                auto_reload: 149_999,
            })
        );
    }

    #[test]
    fn full_speed_clock() {
        let config = TimerConfig::for_period(108u32.MHz(), 15).unwrap();
        assert_eq!(config.prescaler, 10_799);
        assert_eq!(config.auto_reload, 149_999);
    }

    #[test]
    fn unusable_clocks() {
        // Not a multiple of the counter rate
        assert_eq!(TimerConfig::for_period(16_000_500u32.Hz(), 15), None);
        // Prescaler above 16 bits
        assert_eq!(TimerConfig::for_period(1_000u32.MHz(), 15), None);
        // Slower than the counter
        assert_eq!(TimerConfig::for_period(0u32.Hz(), 15), None);
        assert_eq!(TimerConfig::for_period(16u32.MHz(), 0), None);
    }
}
