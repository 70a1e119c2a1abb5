//! Control loop
//!
//! Owns the state machine and runs one cycle per tick. Nothing in here
//! blocks for longer than an I2C transfer or an ADC conversion.

use defmt::info;
use embassy_time::{Instant, Ticker, Timer};
use mower_core::board::BoardParts;
use mower_core::MowerStateMachine;

use crate::board::FirmwareBoard;
use crate::system::settings::{mower_config, CYCLE_PERIOD, STARTUP_DELAY};

#[embassy_executor::task]
pub async fn mow(parts: BoardParts<FirmwareBoard>, seed: u64) {
    let mut mower = MowerStateMachine::new(parts, mower_config(), seed);

    Timer::after(STARTUP_DELAY).await;
    mower.start(Instant::now());
    info!("mower started in {}", mower.state().name());

    let mut ticker = Ticker::every(CYCLE_PERIOD);
    loop {
        mower.cycle(Instant::now());
        ticker.next().await;
    }
}
