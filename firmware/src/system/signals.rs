//! Shared statics between tasks
//!
//! The boundary signal block is written by the pulse task and read by the
//! control loop. Console bytes travel from the UART reader to the control
//! loop through a channel that the loop drains without waiting.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use mower_core::boundary::BoundarySignal;

/// Decoded boundary codes, one word per coil
pub static BOUNDARY_SIGNAL: BoundarySignal = BoundarySignal::new();

/// Received console bytes, excess input is dropped
static CONSOLE_RX: Channel<CriticalSectionRawMutex, u8, 32> = Channel::new();

/// Queue a received console byte, false when the queue is full
pub fn push_console_byte(byte: u8) -> bool {
    CONSOLE_RX.try_send(byte).is_ok()
}

/// Next pending console byte, never waits
pub fn next_console_byte() -> Option<u8> {
    CONSOLE_RX.try_receive().ok()
}
