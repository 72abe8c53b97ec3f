#![cfg_attr(not(test), no_std)]

pub mod adc_capture;
pub mod serial;
pub mod tick;
