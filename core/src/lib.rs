#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod acquisition;
#[cfg(feature = "config")]
pub mod config;
pub mod frame;
pub mod measurement;
pub mod schedule;
pub mod trigger;

pub use acquisition::{AcquisitionEngine, Retention};
pub use frame::{transmit, ByteSink, DecodeError, Frame, FrameDecoder, FRAME_TERMINATOR};
pub use measurement::{LogFull, Measurement, MeasurementLog};
pub use schedule::{Action, Coordinator, Event, State};
pub use trigger::SampleTrigger;

/// Seconds between two tick interrupts.
pub const TICK_PERIOD_SECS: u32 = 15;

/// Ticks per super-tick. One conversion is started per super-tick.
pub const TICK_MULTIPLIER: u8 = 4;

/// Number of measurements the device keeps before it stops acquiring.
pub const LOG_CAPACITY: usize = 200;

/// Fill value of log slots that were never written.
pub const SENTINEL_FILL: u8 = 0xAA;

/// Implicit previous value before anything was retained, so the first sample always is.
pub const SENTINEL_PREVIOUS: u8 = u8::MAX;

pub type DeviceCoordinator = Coordinator<LOG_CAPACITY>;
pub type DeviceFrame = Frame<LOG_CAPACITY>;
