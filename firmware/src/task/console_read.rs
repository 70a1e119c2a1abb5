//! Console receive task
//!
//! Reads the UART one byte at a time and queues it for the control loop.

use defmt::{debug, warn};
use embassy_rp::peripherals::UART0;
use embassy_rp::uart::{Async, UartRx};

use crate::system::signals::push_console_byte;

#[embassy_executor::task]
pub async fn console_read(mut rx: UartRx<'static, UART0, Async>) {
    let mut byte = [0u8; 1];
    loop {
        match rx.read(&mut byte).await {
            Ok(()) => {
                if !push_console_byte(byte[0]) {
                    debug!("console queue full, dropped {=u8:x}", byte[0]);
                }
            }
            // Framing or overrun errors, the next read starts clean
            Err(e) => warn!("console read error: {:?}", e),
        }
    }
}
