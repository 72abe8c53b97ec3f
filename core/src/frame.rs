//! Serial framing of the measurement log.
//!
//! ```text
//! [count][elapsed_0][value_0] ... [elapsed_{count-1}][value_{count-1}][0xFF]
//! ```
//!
//! The whole log is sent every tick period. Elapsed times are relative to
//! the previous measurement, the receiver sums them up.

use core::fmt;

use crate::measurement::Measurement;

pub const FRAME_TERMINATOR: u8 = 0xFF;

/// Number of bytes a frame with `count` measurements takes on the wire.
pub const fn frame_len(count: usize) -> usize {
    2 + 2 * count
}

/// Byte oriented output of a frame.
///
/// `write_byte` returns once the byte was accepted, on the device this means
/// busy-waiting on the transmit register. There is no flow control and no
/// timeout, a stalled receiver stalls the sender.
pub trait ByteSink {
    type Error;

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error>;
}

impl<S: ByteSink + ?Sized> ByteSink for &mut S {
    type Error = S::Error;

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        (**self).write_byte(byte)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BufferFull;

impl<const M: usize> ByteSink for heapless::Vec<u8, M> {
    type Error = BufferFull;

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.push(byte).map_err(|_| BufferFull)
    }
}

#[cfg(feature = "std")]
impl ByteSink for std::vec::Vec<u8> {
    type Error = core::convert::Infallible;

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.push(byte);
        Ok(())
    }
}

/// Writes one complete frame and returns the number of bytes sent.
///
/// Only the first 255 measurements are framed since the count is one byte.
pub fn transmit<S: ByteSink + ?Sized>(
    measurements: &[Measurement],
    sink: &mut S,
) -> Result<usize, S::Error> {
    let measurements = &measurements[..measurements.len().min(u8::MAX as usize)];

    sink.write_byte(measurements.len() as u8)?;
    for measurement in measurements {
        sink.write_byte(measurement.elapsed)?;
        sink.write_byte(measurement.value)?;
    }
    sink.write_byte(FRAME_TERMINATOR)?;

    Ok(frame_len(measurements.len()))
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame<const N: usize> {
    measurements: heapless::Vec<Measurement, N>,
}

impl<const N: usize> Frame<N> {
    pub fn count(&self) -> u8 {
        self.measurements.len() as u8
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    /// Measurements paired with the super-ticks elapsed since the first one
    /// of the run, by summing the relative times.
    pub fn absolute_times(&self) -> impl Iterator<Item = (u32, Measurement)> + '_ {
        self.measurements.iter().scan(0u32, |time, measurement| {
            *time += u32::from(measurement.elapsed);
            Some((*time, *measurement))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// The byte found where the terminator should have been
    MissingTerminator(u8),
    /// The announced count does not fit this decoder
    TooManyMeasurements(u8),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::MissingTerminator(byte) => {
                write!(f, "expected end of frame 0xFF, found {byte:#04X}")
            }
            DecodeError::TooManyMeasurements(count) => {
                write!(f, "frame announces {count} measurements, more than a log can hold")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecodeError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    Count,
    Elapsed,
    Value { elapsed: u8 },
    Terminator,
}

/// Incremental decoder, fed one byte at a time as they come off the link.
///
/// After an error it starts over expecting a count byte. The format carries
/// no sync marker, so a receiver that attached in the middle of a frame
/// should [`reset`](Self::reset) when the link goes quiet between two bursts.
#[derive(Debug)]
pub struct FrameDecoder<const N: usize> {
    state: DecoderState,
    expected: u8,
    measurements: heapless::Vec<Measurement, N>,
}

impl<const N: usize> FrameDecoder<N> {
    pub const fn new() -> Self {
        Self {
            state: DecoderState::Count,
            expected: 0,
            measurements: heapless::Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.state = DecoderState::Count;
        self.expected = 0;
        self.measurements.clear();
    }

    pub fn push(&mut self, byte: u8) -> Result<Option<Frame<N>>, DecodeError> {
        match self.state {
            DecoderState::Count => {
                if usize::from(byte) > N {
                    self.reset();
                    return Err(DecodeError::TooManyMeasurements(byte));
                }

                self.expected = byte;
                self.measurements.clear();
                self.state = if byte == 0 {
                    DecoderState::Terminator
                } else {
                    DecoderState::Elapsed
                };
            }
            DecoderState::Elapsed => {
                self.state = DecoderState::Value { elapsed: byte };
            }
            DecoderState::Value { elapsed } => {
                if self.measurements.push(Measurement::new(elapsed, byte)).is_err() {
                    let expected = self.expected;
                    self.reset();
                    return Err(DecodeError::TooManyMeasurements(expected));
                }

                self.state = if self.measurements.len() == usize::from(self.expected) {
                    DecoderState::Terminator
                } else {
                    DecoderState::Elapsed
                };
            }
            DecoderState::Terminator => {
                self.state = DecoderState::Count;
                if byte != FRAME_TERMINATOR {
                    self.measurements.clear();
                    return Err(DecodeError::MissingTerminator(byte));
                }

                return Ok(Some(Frame {
                    measurements: core::mem::take(&mut self.measurements),
                }));
            }
        }

        Ok(None)
    }

    /// Pushes all `data` and calls `f` for every finished frame or error.
    pub fn feed(&mut self, data: &[u8], mut f: impl FnMut(Result<Frame<N>, DecodeError>)) {
        for &byte in data {
            match self.push(byte) {
                Ok(Some(frame)) => f(Ok(frame)),
                Ok(None) => {}
                Err(e) => f(Err(e)),
            }
        }
    }

    /// True when no partial frame is buffered.
    pub fn is_idle(&self) -> bool {
        self.state == DecoderState::Count
    }
}

impl<const N: usize> Default for FrameDecoder<N> {
    fn default() -> Self {
        Self::new()
    }
}
