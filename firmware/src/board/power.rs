//! Battery voltage and charging contact
//!
//! # Voltage Calculations
//! ```text
//! Pack Voltage = (ADC Value * 3.3V * 5.7) / 4096
//! Where:
//! - 3.3V is ADC reference voltage
//! - 5.7 is the 47k/10k divider ratio, 18.8V full scale
//! - 4096 is ADC resolution (12-bit)
//! ```
//!
//! Filtering and the go-home / full decisions are done by
//! [`mower_core::power::Battery`].

use embassy_rp::adc::Channel;
use embassy_rp::gpio::{Input, Pull};
use mower_core::power::BatterySense;

use crate::system::resources::{read_adc, BatteryResources};

/// ADC reference voltage
const REF_VOLTAGE: f32 = 3.3;

/// Hardware voltage divider ratio
const V_DIVIDER_RATIO: f32 = 5.7;

/// ADC resolution (12-bit = 4096 steps)
const ADC_RANGE: f32 = 4096.0;

pub struct PackSense {
    voltage: Channel<'static>,
    contact: Input<'static>,
    last_voltage: f32,
}

impl PackSense {
    pub fn new(r: BatteryResources) -> Self {
        Self {
            voltage: Channel::new_pin(r.voltage_pin, Pull::None),
            // Charging station contact pulls the pin up when live
            contact: Input::new(r.contact_pin, Pull::Down),
            last_voltage: 0.0,
        }
    }
}

impl BatterySense for PackSense {
    fn read_voltage(&mut self) -> f32 {
        // A failed conversion repeats the previous value rather than a 0V dip
        if let Some(raw) = read_adc(&mut self.voltage) {
            self.last_voltage = raw as f32 * REF_VOLTAGE * V_DIVIDER_RATIO / ADC_RANGE;
        }
        self.last_voltage
    }

    fn charge_contact(&mut self) -> bool {
        self.contact.is_high()
    }
}
