#![no_main]
#![no_std]
#![feature(type_alias_impl_trait)]

use defmt::unwrap;
use defmt_rtt as _;
use panic_probe as _;
use rtic::app;
use rtic_sync::{
    channel::{Receiver, Sender},
    make_channel,
};
use stm32f7xx_hal::{
    gpio::{Output, Pin},
    prelude::*,
    serial::Serial,
};

use voltlog_core::{
    Action, DeviceCoordinator, Event, Retention, LOG_CAPACITY, TICK_MULTIPLIER, TICK_PERIOD_SECS,
};
use voltlog_firmware::{
    adc_capture::AdcCapture,
    serial::SerialSink,
    tick::{TickTimer, TimerConfig},
};

/// Events posted by the interrupts and not yet digested by the coordinator.
const EVENT_QUEUE_LEN: usize = 4;

#[app(device = stm32f7xx_hal::pac, dispatchers = [CAN1_RX0])]
mod app {
    use super::*;

    #[shared]
    struct Shared {
        adc: AdcCapture,
    }

    #[local]
    struct Local {
        tick_timer: TickTimer,
        tick_led: Pin<'B', 0, Output>,
        adc_led: Pin<'B', 14, Output>,
        tick_events: Sender<'static, Event, EVENT_QUEUE_LEN>,
        conversion_events: Sender<'static, Event, EVENT_QUEUE_LEN>,
    }

    #[init]
    fn init(cx: init::Context) -> (Shared, Local) {
        let p = cx.device;

        defmt::info!(
            "voltlog: tick every {=u32} s, conversion every {=u8} ticks, {=usize} measurements",
            TICK_PERIOD_SECS,
            TICK_MULTIPLIER,
            LOG_CAPACITY
        );

        let mut rcc = p.RCC.constrain();
        // Default HSI clocks, nothing here needs speed
        let clocks = rcc.cfgr.freeze();

        // Setup GPIO
        let (tick_led, adc_led, uart_pins) = {
            let gpioa = p.GPIOA.split();
            let gpiob = p.GPIOB.split();
            let gpiod = p.GPIOD.split();

            let _adc1_in = gpioa.pa3.into_analog();

            let tick_led = gpiob.pb0.into_push_pull_output();
            let mut adc_led = gpiob.pb14.into_push_pull_output();
            adc_led.set_high();

            (
                tick_led,
                adc_led,
                (gpiod.pd8.into_alternate(), gpiod.pd9.into_alternate()),
            )
        };

        let uart = Serial::new(p.USART3, uart_pins, &clocks, Default::default());

        let adc = AdcCapture::init(p.ADC1, &mut rcc.apb2);

        let timer_config = TimerConfig::for_period(clocks.timclk1(), TICK_PERIOD_SECS)
            .unwrap_or_else(|| defmt::panic!("TIM2 cannot produce a {} s tick", TICK_PERIOD_SECS));
        defmt::debug!(
            "TIM2 prescaler {=u16}, reload {=u32}",
            timer_config.prescaler,
            timer_config.auto_reload
        );

        // Both interrupts feed the coordinator through one queue
        let (tick_events, events) = make_channel!(Event, EVENT_QUEUE_LEN);
        let conversion_events = tick_events.clone();

        coordinator::spawn(events, SerialSink::new(uart))
            .unwrap_or_else(|_| defmt::panic!("Failed to start coordinator"));

        // Start ticking last, everything it wakes up exists now
        let tick_timer = TickTimer::init(p.TIM2, timer_config, &mut rcc.apb1);

        (
            Shared { adc },
            Local {
                tick_timer,
                tick_led,
                adc_led,
                tick_events,
                conversion_events,
            },
        )
    }

    /// The acquisition loop
    ///
    /// Waiting for the next event is the only place this task yields; with
    /// nothing else to run the core sleeps in WFI until TIM2 or ADC fire.
    /// Sending a frame busy-waits on the UART, the interrupts still preempt
    /// it and queue their events.
    #[task(
        shared = [adc],
        local = [coordinator: DeviceCoordinator = DeviceCoordinator::new(TICK_MULTIPLIER)],
        priority = 1
    )]
    async fn coordinator(
        mut cx: coordinator::Context,
        mut events: Receiver<'static, Event, EVENT_QUEUE_LEN>,
        mut sink: SerialSink,
    ) {
        let coordinator = cx.local.coordinator;
        let mut saturation_reported = false;

        loop {
            let event = unwrap!(events.recv().await.ok());

            match coordinator.handle(event) {
                Action::StartConversion => {
                    defmt::trace!("Starting conversion");
                    cx.shared.adc.lock(|adc| adc.start_conversion());
                }
                Action::Transmit => {
                    match coordinator.take_retention() {
                        Some(Retention::Retained(measurement)) => {
                            defmt::debug!("Retained {}", measurement)
                        }
                        Some(retention) => defmt::trace!("{}", retention),
                        None => {}
                    }

                    let written = match coordinator.transmit(&mut sink) {
                        Ok(written) => written,
                        Err(never) => match never {},
                    };
                    defmt::trace!(
                        "Sent {=usize} bytes, {=usize} measurements",
                        written,
                        coordinator.log().len()
                    );

                    if coordinator.is_saturated() && !saturation_reported {
                        defmt::info!("Measurement log full, acquisition stopped");
                        saturation_reported = true;
                    }
                }
                Action::Wait => {
                    defmt::warn!("{} arrived while in {}", event, coordinator.state())
                }
            }
        }
    }

    /// Tick source, blinks the tick LED
    #[task(binds = TIM2, local = [tick_timer, tick_led, tick_events], priority = 2)]
    fn on_tick(cx: on_tick::Context) {
        cx.local.tick_timer.clear_interrupt();
        cx.local.tick_led.toggle();

        if cx.local.tick_events.try_send(Event::Tick).is_err() {
            defmt::error!("Event queue full, tick lost");
        }
    }

    /// Conversion complete, blinks the acquisition LED
    #[task(binds = ADC, shared = [adc], local = [adc_led, conversion_events], priority = 2)]
    fn on_conversion(mut cx: on_conversion::Context) {
        let (value, overrun) = cx
            .shared
            .adc
            .lock(|adc| (adc.take_result(), adc.take_overrun()));

        if overrun {
            defmt::warn!("ADC overrun");
        }

        // Overrun only, no new result
        let Some(value) = value else {
            return;
        };
        cx.local.adc_led.toggle();

        if cx
            .local
            .conversion_events
            .try_send(Event::ConversionComplete(value))
            .is_err()
        {
            defmt::error!("Event queue full, conversion lost");
        }
    }
}
