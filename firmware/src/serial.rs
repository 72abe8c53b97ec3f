use core::convert::Infallible;

use stm32f7xx_hal::{
    gpio::{Alternate, Pin},
    pac::USART3,
    prelude::*,
    serial::Serial,
};
use voltlog_core::ByteSink;

/// USART3 on PD8/PD9, wired to the ST-LINK virtual COM port on Nucleo-144 boards.
pub type Usart3 = Serial<USART3, (Pin<'D', 8, Alternate<7>>, Pin<'D', 9, Alternate<7>>)>;

/// Frame output over USART3, one byte at a time.
pub struct SerialSink {
    uart: Usart3,
}

impl SerialSink {
    pub fn new(uart: Usart3) -> Self {
        Self { uart }
    }
}

impl ByteSink for SerialSink {
    type Error = Infallible;

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        // Spin until the transmit data register takes the byte
        loop {
            match self.uart.write(byte) {
                Ok(_) => return Ok(()),
                Err(_) => continue,
            }
        }
    }
}
