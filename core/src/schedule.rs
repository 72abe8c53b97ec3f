//! The acquisition control loop as an event driven state machine.
//!
//! The device sleeps until one of two interrupts posts an [`Event`]. The
//! [`Coordinator`] digests it and answers with the [`Action`] the caller has
//! to perform before sleeping again:
//!
//! ```text
//! WaitTick --Tick, conversion due--> WaitConversion --ConversionComplete--> Transmit
//! WaitTick --Tick, otherwise-------------------------------------------->  Transmit
//! Transmit --frame drained--> WaitTick
//! ```
//!
//! Once the log is full no conversion is started any more and the loop
//! keeps cycling between `WaitTick` and `Transmit`, resending the same log.

use crate::{
    acquisition::{AcquisitionEngine, Retention},
    frame::{self, ByteSink},
    measurement::MeasurementLog,
    trigger::SampleTrigger,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    WaitTick,
    WaitConversion,
    Transmit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    Tick,
    /// 8-bit result of the conversion that was started
    ConversionComplete(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    StartConversion,
    /// Call [`Coordinator::transmit`]
    Transmit,
    /// Nothing to do, sleep until the next event
    Wait,
}

pub struct Coordinator<const N: usize> {
    state: State,
    trigger: SampleTrigger,
    engine: AcquisitionEngine,
    log: MeasurementLog<N>,
    last_retention: Option<Retention>,
}

impl<const N: usize> Coordinator<N> {
    pub const fn new(multiplier: u8) -> Self {
        Self {
            state: State::WaitTick,
            trigger: SampleTrigger::new(multiplier),
            engine: AcquisitionEngine::new(),
            log: MeasurementLog::new(),
            last_retention: None,
        }
    }

    pub fn handle(&mut self, event: Event) -> Action {
        match (self.state, event) {
            (State::WaitTick, Event::Tick) => {
                let conversion_due = self.trigger.on_tick();

                if conversion_due && !self.log.is_full() {
                    self.state = State::WaitConversion;
                    Action::StartConversion
                } else {
                    self.state = State::Transmit;
                    Action::Transmit
                }
            }
            (State::WaitConversion, Event::ConversionComplete(value)) => {
                self.acquire(value);
                self.state = State::Transmit;
                Action::Transmit
            }
            // Both interrupts do their bookkeeping no matter what the loop
            // is waiting for, only the state stays put
            (_, Event::Tick) => {
                self.trigger.on_tick();
                Action::Wait
            }
            (_, Event::ConversionComplete(value)) => {
                self.acquire(value);
                Action::Wait
            }
        }
    }

    /// Sends the complete log and goes back to waiting for a tick.
    pub fn transmit<S: ByteSink + ?Sized>(&mut self, sink: &mut S) -> Result<usize, S::Error> {
        let written = frame::transmit(self.log.snapshot(), sink)?;
        self.state = State::WaitTick;
        Ok(written)
    }

    fn acquire(&mut self, value: u8) {
        let retention = self
            .engine
            .on_conversion(value, &mut self.trigger, &mut self.log);
        self.last_retention = Some(retention);
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn log(&self) -> &MeasurementLog<N> {
        &self.log
    }

    pub fn trigger(&self) -> &SampleTrigger {
        &self.trigger
    }

    pub fn engine(&self) -> &AcquisitionEngine {
        &self.engine
    }

    /// Outcome of the most recent conversion, taken so it is reported once.
    pub fn take_retention(&mut self) -> Option<Retention> {
        self.last_retention.take()
    }

    /// The log is full, acquisition has stopped for good.
    pub fn is_saturated(&self) -> bool {
        self.log.is_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{frame::FrameDecoder, measurement::Measurement};
    use rand::Rng;

    /// Runs one tick period and returns the frame sent at its end.
    fn period<const N: usize>(
        coordinator: &mut Coordinator<N>,
        mut next_value: impl FnMut() -> u8,
    ) -> Vec<u8> {
        let mut action = coordinator.handle(Event::Tick);
        if action == Action::StartConversion {
            assert_eq!(coordinator.state(), State::WaitConversion);
            action = coordinator.handle(Event::ConversionComplete(next_value()));
        }
        assert_eq!(action, Action::Transmit);
        assert_eq!(coordinator.state(), State::Transmit);

        let mut frame = Vec::<u8>::new();
        coordinator.transmit(&mut frame).unwrap();
        assert_eq!(coordinator.state(), State::WaitTick);
        frame
    }

    fn run<const N: usize>(
        coordinator: &mut Coordinator<N>,
        ticks: usize,
        values: &[u8],
    ) -> Vec<Vec<u8>> {
        let mut values = values.iter().copied();
        (0..ticks)
            .map(|_| {
                period(coordinator, || {
                    values.next().expect("more conversions than values")
                })
            })
            .collect()
    }

    #[test]
    fn starts_waiting_for_a_tick() {
        let coordinator = Coordinator::<4>::new(4);
        assert_eq!(coordinator.state(), State::WaitTick);
        assert!(coordinator.log().is_empty());
    }

    #[test]
    fn conversions_only_on_super_tick_boundaries() {
        let mut coordinator = Coordinator::<8>::new(4);
        let mut conversions = vec![];

        for tick in 0..9 {
            match coordinator.handle(Event::Tick) {
                Action::StartConversion => {
                    conversions.push(tick);
                    coordinator.handle(Event::ConversionComplete(255));
                }
                action => assert_eq!(action, Action::Transmit),
            }
            coordinator.transmit(&mut Vec::<u8>::new()).unwrap();
        }

        assert_eq!(conversions, vec![0, 4, 8]);
    }

    #[test]
    fn equal_sample_is_not_retained() {
        let mut coordinator = Coordinator::<200>::new(4);

        let frames = run(&mut coordinator, 16, &[200, 150, 150, 100]);

        assert_eq!(
            coordinator.log().snapshot(),
            &[
                Measurement::new(0, 200),
                Measurement::new(1, 150),
                Measurement::new(2, 100),
            ]
        );
        assert_eq!(coordinator.log().len(), 3);
        assert_eq!(frames[0], vec![1, 0, 200, 0xFF]);
        assert_eq!(frames[4], vec![2, 0, 200, 1, 150, 0xFF]);
        // Second 150 changed nothing
        assert_eq!(frames[8], frames[4]);
        assert_eq!(frames[15], vec![3, 0, 200, 1, 150, 2, 100, 0xFF]);
    }

    #[test]
    fn full_log_ignores_further_samples() {
        let mut coordinator = Coordinator::<2>::new(1);

        let frames = run(&mut coordinator, 2, &[100, 50]);
        assert!(coordinator.is_saturated());
        assert_eq!(frames[1], vec![2, 1, 100, 1, 50, 0xFF]);

        // Spurious conversion result after saturation
        assert_eq!(coordinator.handle(Event::ConversionComplete(10)), Action::Wait);
        assert_eq!(coordinator.take_retention(), Some(Retention::LogFull));
        assert_eq!(coordinator.log().len(), 2);

        let frames = run(&mut coordinator, 3, &[]);
        assert!(frames.iter().all(|f| *f == vec![2, 1, 100, 1, 50, 0xFF]));
    }

    #[test]
    fn nothing_retained_sends_empty_frames() {
        let mut coordinator = Coordinator::<200>::new(2);

        // Flat at the sentinel value, so never strictly below it
        let frames = run(&mut coordinator, 20, &[255; 10]);

        assert!(frames.iter().all(|f| *f == vec![0x00, 0xFF]));
        assert!(coordinator.log().is_empty());
    }

    #[test]
    fn zero_is_retained_first() {
        let mut coordinator = Coordinator::<200>::new(4);

        let frames = run(&mut coordinator, 8, &[0, 0]);

        assert_eq!(coordinator.log().snapshot(), &[Measurement::new(0, 0)]);
        assert_eq!(frames[7], vec![1, 0, 0, 0xFF]);
    }

    #[test]
    fn saturated_log_stops_conversions() {
        let mut coordinator = Coordinator::<3>::new(1);

        run(&mut coordinator, 3, &[30, 20, 10]);
        assert!(coordinator.is_saturated());

        for _ in 0..10 {
            assert_eq!(coordinator.handle(Event::Tick), Action::Transmit);
            coordinator.transmit(&mut Vec::<u8>::new()).unwrap();
        }
        assert_eq!(coordinator.engine().conversions(), 3);
    }

    #[test]
    fn unexpected_events_keep_state() {
        let mut coordinator = Coordinator::<4>::new(2);

        assert_eq!(coordinator.handle(Event::Tick), Action::StartConversion);
        // A second tick while the conversion is outstanding
        assert_eq!(coordinator.handle(Event::Tick), Action::Wait);
        assert_eq!(coordinator.state(), State::WaitConversion);
        assert_eq!(coordinator.trigger().elapsed(), 1);

        assert_eq!(
            coordinator.handle(Event::ConversionComplete(99)),
            Action::Transmit
        );
        assert_eq!(coordinator.log().snapshot(), &[Measurement::new(1, 99)]);

        // A conversion result while waiting to transmit is still evaluated
        assert_eq!(
            coordinator.handle(Event::ConversionComplete(98)),
            Action::Wait
        );
        assert_eq!(coordinator.state(), State::Transmit);
        assert_eq!(coordinator.log().len(), 2);
    }

    #[test]
    fn repeated_frames_are_identical_without_new_measurements() {
        let mut coordinator = Coordinator::<200>::new(4);

        let frames = run(&mut coordinator, 8, &[120, 130]);

        // Ticks 1..=7 saw no new measurement
        for pair in frames[1..].windows(2) {
            assert_eq!(pair[0], pair[1]);
        }
    }

    #[test]
    fn elapsed_matches_super_ticks_between_retentions() {
        let mut rng = rand::thread_rng();
        let multiplier = 3;
        let mut coordinator = Coordinator::<200>::new(multiplier);

        let mut super_tick = 0u32;
        let mut last_retained_at = 0u32;
        let mut expected = vec![];
        let mut previous = u8::MAX;

        for _ in 0..(600 * multiplier as usize) {
            if coordinator.handle(Event::Tick) == Action::StartConversion {
                // Mostly rising input, so there are long quiet stretches
                let value = if rng.gen_ratio(1, 40) { rng.gen() } else { 255 };
                coordinator.handle(Event::ConversionComplete(value));

                if value < previous && expected.len() < 200 {
                    let elapsed = (super_tick - last_retained_at) % 256;
                    expected.push(Measurement::new(elapsed as u8, value));
                    last_retained_at = super_tick;
                    previous = value;
                }
                super_tick += 1;
            }
            coordinator.transmit(&mut Vec::<u8>::new()).unwrap();
        }

        assert_eq!(coordinator.log().snapshot(), &expected[..]);
    }

    #[test]
    fn decoder_reads_back_what_the_coordinator_sends() {
        let mut coordinator = Coordinator::<200>::new(1);
        let mut decoder = FrameDecoder::<200>::new();

        let frames = run(&mut coordinator, 5, &[90, 80, 85, 70, 60]);
        let mut decoded = vec![];
        decoder.feed(frames.last().unwrap(), |r| decoded.push(r));
        let last = decoded.pop().unwrap().unwrap();

        assert_eq!(last.measurements(), coordinator.log().snapshot());
        let times: Vec<u32> = last.absolute_times().map(|(t, _)| t).collect();
        assert_eq!(times, vec![1, 2, 4, 5]);
    }
}
