use core::fmt;

use crate::SENTINEL_FILL;

/// A retained sample and the number of super-ticks since the one retained before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    pub elapsed: u8,
    pub value: u8,
}

impl Measurement {
    pub const fn new(elapsed: u8, value: u8) -> Self {
        Self { elapsed, value }
    }

    const SENTINEL: Self = Self::new(SENTINEL_FILL, SENTINEL_FILL);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LogFull;

impl fmt::Display for LogFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("measurement log is full")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for LogFull {}

/// Append-only store of retained measurements.
///
/// The backing array is filled with [`SENTINEL_FILL`] when the log is created,
/// so slots that were never written are recognisable in a memory dump. Once
/// `N` measurements are stored every further append is refused; nothing is
/// ever overwritten or removed.
pub struct MeasurementLog<const N: usize> {
    entries: [Measurement; N],
    count: usize,
}

impl<const N: usize> MeasurementLog<N> {
    pub const CAPACITY: usize = N;

    pub const fn new() -> Self {
        // The count has to fit the first byte of a frame
        assert!(N <= u8::MAX as usize, "A frame can describe at most 255 measurements");

        Self {
            entries: [Measurement::SENTINEL; N],
            count: 0,
        }
    }

    pub fn append(&mut self, measurement: Measurement) -> Result<(), LogFull> {
        let slot = self.entries.get_mut(self.count).ok_or(LogFull)?;
        *slot = measurement;
        self.count += 1;
        Ok(())
    }

    /// The valid measurements, oldest first.
    pub fn snapshot(&self) -> &[Measurement] {
        &self.entries[..self.count]
    }

    pub fn last(&self) -> Option<&Measurement> {
        self.snapshot().last()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == N
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// The whole backing array, including the untouched sentinel tail.
    pub fn raw_entries(&self) -> &[Measurement; N] {
        &self.entries
    }
}

impl<const N: usize> Default for MeasurementLog<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for MeasurementLog<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeasurementLog")
            .field("capacity", &N)
            .field("entries", &self.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn starts_empty_and_sentinel_filled() {
        let log = MeasurementLog::<8>::new();

        assert!(log.is_empty());
        assert!(log.snapshot().is_empty());
        assert_eq!(log.last(), None);
        assert!(log
            .raw_entries()
            .iter()
            .all(|m| *m == Measurement::new(0xAA, 0xAA)));
    }

    #[test]
    fn append_keeps_order_and_leaves_tail_untouched() {
        let mut log = MeasurementLog::<4>::new();

        log.append(Measurement::new(0, 200)).unwrap();
        log.append(Measurement::new(3, 120)).unwrap();

        assert_eq!(log.len(), 2);
        assert_eq!(
            log.snapshot(),
            &[Measurement::new(0, 200), Measurement::new(3, 120)]
        );
        assert_eq!(log.last(), Some(&Measurement::new(3, 120)));
        assert_eq!(log.raw_entries()[2], Measurement::SENTINEL);
        assert_eq!(log.raw_entries()[3], Measurement::SENTINEL);
    }

    #[test]
    fn refuses_appends_once_full() {
        let mut log = MeasurementLog::<2>::new();

        assert_eq!(log.append(Measurement::new(0, 100)), Ok(()));
        assert_eq!(log.append(Measurement::new(1, 50)), Ok(()));
        assert!(log.is_full());

        assert_eq!(log.append(Measurement::new(1, 10)), Err(LogFull));
        assert_eq!(log.len(), 2);
        assert_eq!(log.last(), Some(&Measurement::new(1, 50)));
    }

    #[test]
    fn zero_capacity_is_always_full() {
        let mut log = MeasurementLog::<0>::new();

        assert!(log.is_full());
        assert_eq!(log.append(Measurement::new(0, 0)), Err(LogFull));
        assert!(log.is_empty());
    }

    #[test]
    fn count_is_monotonic_and_bounded() {
        let mut rng = rand::thread_rng();
        let mut log = MeasurementLog::<16>::new();
        let mut previous_len = 0;

        for _ in 0..100 {
            let _ = log.append(Measurement::new(rng.gen(), rng.gen()));

            assert!(log.len() >= previous_len);
            assert!(log.len() <= log.capacity());
            previous_len = log.len();
        }

        assert!(log.is_full());
    }
}
