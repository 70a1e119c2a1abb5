//! Console byte stream over UART0
//!
//! The receive half lives in the `console_read` task and queues bytes, the
//! control loop picks them up here and answers on the transmit half.

use defmt::debug;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::UART0;
use embassy_rp::uart::{Async, UartTx};
use mower_core::debug::ConsoleIo;

use crate::system::signals::next_console_byte;

pub struct UartConsole {
    tx: UartTx<'static, UART0, Async>,
    led: Output<'static>,
}

impl UartConsole {
    pub fn new(tx: UartTx<'static, UART0, Async>, led: Output<'static>) -> Self {
        Self { tx, led }
    }
}

impl ConsoleIo for UartConsole {
    fn read_byte(&mut self) -> Option<u8> {
        next_console_byte()
    }

    fn write_str(&mut self, text: &str) {
        let sent = self
            .tx
            .blocking_write(text.as_bytes())
            .and_then(|_| self.tx.blocking_write(b"\r\n"));
        if sent.is_err() {
            debug!("console write failed");
        }
    }

    fn set_led(&mut self, on: bool) {
        self.led.set_level(if on { Level::High } else { Level::Low });
    }
}
