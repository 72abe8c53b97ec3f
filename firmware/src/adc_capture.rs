use hal::{
    pac,
    rcc::{self, Enable, Reset},
};
use stm32f7xx_hal as hal;
use voltlog_core::acquisition::scale_to_u8;

/// ADC1 converting PA3 once per software trigger.
///
/// The end-of-conversion interrupt fires when the result is ready, the
/// handler calls [`AdcCapture::read`] which also clears the flag.
pub struct AdcCapture {
    adc1: pac::ADC1,
}

impl AdcCapture {
    pub const RESOLUTION_BITS: u8 = 12;
    const CHANNEL: u8 = 3;

    pub fn init(adc1: pac::ADC1, apb2: &mut rcc::APB2) -> Self {
        let mut this = Self { adc1 };
        this.init_adc1(apb2);
        this
    }

    /// Configure ADC1 to 12-bits resolution in single conversion mode,
    /// triggered by software and reporting through the EOC interrupt
    fn init_adc1(&mut self, apb2: &mut rcc::APB2) {
        let adc1 = &self.adc1;
        <pac::ADC1 as Enable>::enable(apb2);
        // Power down ADC1
        adc1.cr2.modify(|_, w| w.adon().clear_bit());
        <pac::ADC1 as Reset>::reset(apb2);

        // One conversion per start, no external trigger
        adc1.cr2
            .modify(|_, w| w.cont().single().exten().disabled());
        adc1.cr1
            .modify(|_, w| w.scan().clear_bit().discen().clear_bit());

        // Setup ADC1 resolution to 12 bit
        adc1.cr1.modify(|_, w| w.res().bits(0b00));

        // Longest sampling time, the input is a slow battery voltage
        adc1.smpr2.modify(|_, w| unsafe { w.smp3().bits(0b111) });

        // A sequence of one: PA3
        adc1.sqr1.modify(|_, w| unsafe { w.l().bits(0) });
        adc1.sqr3
            .modify(|_, w| unsafe { w.sq1().bits(Self::CHANNEL) });

        // Enable ADC end-of-conversion and overrun interrupts
        adc1.cr1
            .modify(|_, w| w.eocie().enabled().ovrie().enabled());

        // Power up ADC1
        adc1.cr2.modify(|_, w| w.adon().enabled());
    }

    pub fn start_conversion(&mut self) {
        self.adc1.cr2.modify(|_, w| w.swstart().set_bit());
    }

    /// Fetches the result scaled to 8 bits if a conversion finished since the
    /// last call. Reading DR clears EOC.
    ///
    /// The overrun interrupt shares the vector with EOC, so the handler can
    /// run without a new result in DR.
    pub fn take_result(&mut self) -> Option<u8> {
        let eoc = self.adc1.sr.read().eoc().bit_is_set();
        conversion_result(eoc, || self.adc1.dr.read().data().bits())
    }

    /// Clears and reports an overrun, which only happens when a result was never read.
    pub fn take_overrun(&mut self) -> bool {
        let overrun = self.adc1.sr.read().ovr().bit_is_set();
        if overrun {
            self.adc1.sr.modify(|_, w| w.ovr().clear_bit());
        }
        overrun
    }
}

/// DR is only read when `eoc` is set, a read without EOC returns a stale value.
fn conversion_result(eoc: bool, read_data: impl FnOnce() -> u16) -> Option<u8> {
    eoc.then(|| scale_to_u8(read_data(), AdcCapture::RESOLUTION_BITS))
}
