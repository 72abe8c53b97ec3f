use std::io::{self, Write};

use voltlog_core::{config::Config, Frame};

/// Turns decoded frames into minutes and volts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Report {
    pub volt_max: f32,
    pub minutes_per_super_tick: f32,
}

impl Report {
    pub fn from_config(config: &Config) -> Self {
        Self {
            volt_max: config.volt_max,
            minutes_per_super_tick: config.minutes_per_super_tick,
        }
    }

    pub fn resolution(&self) -> f32 {
        self.volt_max / 256.0
    }

    pub fn voltage(&self, value: u8) -> f32 {
        f32::from(value) * self.resolution()
    }

    pub fn minutes(&self, super_ticks: u32) -> f32 {
        super_ticks as f32 * self.minutes_per_super_tick
    }

    /// `(minutes, volts)` for every measurement of the frame.
    pub fn points<const N: usize>(&self, frame: &Frame<N>) -> Vec<(f32, f32)> {
        frame
            .absolute_times()
            .map(|(time, measurement)| (self.minutes(time), self.voltage(measurement.value)))
            .collect()
    }

    /// Writes the resolution, one line per measurement and then the times
    /// and voltages as two semicolon separated rows for pasting in a spreadsheet.
    pub fn write<const N: usize>(&self, frame: &Frame<N>, out: &mut impl Write) -> io::Result<()> {
        let points = self.points(frame);

        writeln!(out, "Resolution: +/- {:.3} V", self.resolution())?;
        // Whole minutes, a partial minute is dropped
        for (minutes, volts) in &points {
            writeln!(out, "{} min. : {volts:.2} V", minutes.trunc())?;
        }

        writeln!(out)?;
        for (minutes, _) in &points {
            write!(out, "{}; ", minutes.trunc())?;
        }
        writeln!(out)?;
        for (_, volts) in &points {
            write!(out, "{volts:.2}; ")?;
        }
        writeln!(out)
    }
}
