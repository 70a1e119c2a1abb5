//! Mower configuration for this hardware
//!
//! Both the pulse task and the control loop build their view of the wire
//! signal from here, so the codes always agree.

use embassy_time::Duration;
use mower_core::config::BatteryConfig;
use mower_core::power::BatteryChemistry;
use mower_core::MowerConfig;

/// Control loop period
pub const CYCLE_PERIOD: Duration = Duration::from_millis(20);

/// Wait before the first cycle so supplies and sensors settle
pub const STARTUP_DELAY: Duration = Duration::from_millis(500);

/// Configuration of the mower this firmware is built for
pub fn mower_config() -> MowerConfig {
    MowerConfig::default().with_battery(BatteryConfig {
        chemistry: BatteryChemistry::LiIon,
        ..BatteryConfig::default()
    })
}
