//! Boundary wire pulse capture
//!
//! Waits for every rising edge on the receiver comparator output and hands
//! its timestamp to the decoder. Whichever coil the control loop has
//! selected at that moment owns the edge.
//!
//! Runs on the interrupt executor, so a control cycle busy with I2C or ADC
//! transfers never delays the timestamp.

use defmt::info;
use embassy_rp::gpio::{Input, Pull};
use embassy_time::Instant;
use mower_core::boundary::PulseDecoder;

use crate::system::resources::BoundaryPulseResources;
use crate::system::settings::mower_config;
use crate::system::signals::BOUNDARY_SIGNAL;

#[embassy_executor::task]
pub async fn boundary_pulse(r: BoundaryPulseResources) {
    let mut pulse = Input::new(r.pulse_pin, Pull::Down);
    let mut decoder = PulseDecoder::new(&mower_config().boundary);

    info!("boundary pulse capture running");

    loop {
        pulse.wait_for_rising_edge().await;
        decoder.on_pulse(&BOUNDARY_SIGNAL, Instant::now().as_micros());
    }
}
