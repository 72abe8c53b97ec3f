/// Tick bookkeeping: which tick of the current super-tick we are in and how
/// many super-ticks passed since the last retained measurement.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SampleTrigger {
    multiplier: u8,
    sub_tick: u8,
    elapsed: u8,
}

impl SampleTrigger {
    pub const fn new(multiplier: u8) -> Self {
        assert!(multiplier > 0, "A super-tick needs at least one tick");

        Self {
            multiplier,
            sub_tick: 0,
            elapsed: 0,
        }
    }

    /// Accounts for one tick and reports whether a conversion has to start.
    ///
    /// The decision is taken on the sub-tick value found on entry, so the
    /// very first tick after reset starts a conversion and after that one
    /// tick in every `multiplier` does. The elapsed counter advances when
    /// the sub-tick counter wraps and silently wraps itself after 255.
    pub fn on_tick(&mut self) -> bool {
        let conversion_due = self.sub_tick == 0;

        if self.sub_tick < self.multiplier - 1 {
            self.sub_tick += 1;
        } else {
            self.sub_tick = 0;
            self.elapsed = self.elapsed.wrapping_add(1);
        }

        conversion_due
    }

    pub fn multiplier(&self) -> u8 {
        self.multiplier
    }

    pub fn sub_tick(&self) -> u8 {
        self.sub_tick
    }

    /// Super-ticks since the last retained measurement, modulo 256.
    pub fn elapsed(&self) -> u8 {
        self.elapsed
    }

    pub fn reset_elapsed(&mut self) {
        self.elapsed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_triggers() {
        let mut trigger = SampleTrigger::new(4);
        assert!(trigger.on_tick());
        assert_eq!(trigger.sub_tick(), 1);
        assert_eq!(trigger.elapsed(), 0);
    }

    #[test]
    fn triggers_once_per_super_tick() {
        let mut trigger = SampleTrigger::new(4);

        let fired: Vec<usize> = (0..12).filter(|_| trigger.on_tick()).collect();

        assert_eq!(fired, vec![0, 4, 8]);
    }

    #[test]
    fn elapsed_counts_completed_super_ticks() {
        let mut trigger = SampleTrigger::new(4);

        for _ in 0..3 {
            trigger.on_tick();
        }
        assert_eq!(trigger.elapsed(), 0);

        trigger.on_tick();
        assert_eq!(trigger.elapsed(), 1);
        assert_eq!(trigger.sub_tick(), 0);

        for _ in 0..8 {
            trigger.on_tick();
        }
        assert_eq!(trigger.elapsed(), 3);

        trigger.reset_elapsed();
        assert_eq!(trigger.elapsed(), 0);
        assert_eq!(trigger.sub_tick(), 0);
    }

    #[test]
    fn elapsed_wraps_silently() {
        let mut trigger = SampleTrigger::new(2);

        for _ in 0..(2 * 256) {
            trigger.on_tick();
        }
        assert_eq!(trigger.elapsed(), 0);

        for _ in 0..2 {
            trigger.on_tick();
        }
        assert_eq!(trigger.elapsed(), 1);
    }

    #[test]
    fn multiplier_of_one_triggers_every_tick() {
        let mut trigger = SampleTrigger::new(1);

        for expected_elapsed in 1..=5 {
            assert!(trigger.on_tick());
            assert_eq!(trigger.sub_tick(), 0);
            assert_eq!(trigger.elapsed(), expected_elapsed);
        }
    }

    #[test]
    #[should_panic]
    fn zero_multiplier_is_rejected() {
        let _ = SampleTrigger::new(0);
    }
}
