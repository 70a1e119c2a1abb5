//! Battery supervision
//!
//! [`Battery`] turns raw voltage readings and the charging contact into the
//! decisions the state machine needs: go home, fully charged, docked.
//!
//! # Filtering
//! Readings go through a 9 sample moving median. Motor current makes the
//! pack voltage sag and jump, the median keeps a single dip from sending the
//! mower home.
//!
//! # Thresholds
//! Go-home and full-charge voltages come from the pack chemistry and can be
//! overridden in [`BatteryConfig`].

use moving_median::MovingMedian;

use crate::config::BatteryConfig;

/// Voltage median filter window
const VOLTAGE_WINDOW: usize = 9;

/// Pack chemistry, sets the default thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BatteryChemistry {
    /// 12 cell NiMH pack
    NiMh,
    /// 3S Li-Ion pack
    LiIon,
    /// 12V sealed lead acid
    LeadAcid,
}

impl BatteryChemistry {
    pub fn go_home_voltage(self) -> f32 {
        match self {
            BatteryChemistry::NiMh => 11.5,
            BatteryChemistry::LiIon => 10.5,
            BatteryChemistry::LeadAcid => 11.8,
        }
    }

    pub fn full_voltage(self) -> f32 {
        match self {
            BatteryChemistry::NiMh => 14.0,
            BatteryChemistry::LiIon => 12.6,
            BatteryChemistry::LeadAcid => 13.5,
        }
    }
}

/// Charge state as seen by the control core
pub trait PowerSource {
    /// Drop the filter history and start over from a fresh reading
    fn reset_voltage(&mut self);

    /// Take this cycle's voltage and contact readings
    fn update_voltage(&mut self);

    fn is_being_charged(&self) -> bool;

    fn must_charge(&self) -> bool;

    fn is_fully_charged(&self) -> bool;

    /// Filtered pack voltage
    fn voltage(&self) -> f32;
}

/// Raw battery measurements from the hardware
pub trait BatterySense {
    /// Pack voltage in volts
    fn read_voltage(&mut self) -> f32;

    /// Charging station contacts are live
    fn charge_contact(&mut self) -> bool;
}

/// Filtered battery state over a [`BatterySense`]
pub struct Battery<S> {
    sense: S,
    filter: MovingMedian<f32, VOLTAGE_WINDOW>,
    voltage: f32,
    has_reading: bool,
    charging: bool,
    go_home_voltage: f32,
    full_voltage: f32,
}

impl<S: BatterySense> Battery<S> {
    pub fn new(sense: S, config: &BatteryConfig) -> Self {
        Self {
            sense,
            filter: MovingMedian::new(),
            voltage: 0.0,
            has_reading: false,
            charging: false,
            go_home_voltage: config.go_home_voltage(),
            full_voltage: config.full_voltage(),
        }
    }
}

impl<S: BatterySense> PowerSource for Battery<S> {
    fn reset_voltage(&mut self) {
        self.filter = MovingMedian::new();
        self.has_reading = false;
        self.update_voltage();
    }

    fn update_voltage(&mut self) {
        self.filter.add_value(self.sense.read_voltage());
        self.voltage = self.filter.median();
        self.has_reading = true;
        self.charging = self.sense.charge_contact();
    }

    fn is_being_charged(&self) -> bool {
        self.charging
    }

    fn must_charge(&self) -> bool {
        self.has_reading && self.voltage < self.go_home_voltage
    }

    fn is_fully_charged(&self) -> bool {
        self.has_reading && self.voltage >= self.full_voltage
    }

    fn voltage(&self) -> f32 {
        self.voltage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BatteryState, MockBatterySense, Shared};

    fn battery(volts: f32) -> (Battery<MockBatterySense>, Shared<BatteryState>) {
        let sense = MockBatterySense::default();
        let state = sense.state.clone();
        state.borrow_mut().voltage = volts;
        (Battery::new(sense, &BatteryConfig::default()), state)
    }

    #[test]
    fn no_decision_before_first_reading() {
        let (battery, _) = battery(9.0);
        assert!(!battery.must_charge());
        assert!(!battery.is_fully_charged());
    }

    #[test]
    fn low_pack_must_charge() {
        let (mut battery, state) = battery(12.5);
        for _ in 0..VOLTAGE_WINDOW {
            battery.update_voltage();
        }
        assert!(!battery.must_charge());

        state.borrow_mut().voltage = 11.0;
        for _ in 0..VOLTAGE_WINDOW {
            battery.update_voltage();
        }
        assert!(battery.must_charge());
    }

    #[test]
    fn single_sag_is_filtered() {
        let (mut battery, state) = battery(12.5);
        for _ in 0..VOLTAGE_WINDOW {
            battery.update_voltage();
        }
        state.borrow_mut().voltage = 9.0;
        battery.update_voltage();
        assert!(!battery.must_charge());
        assert_eq!(battery.voltage(), 12.5);
    }

    #[test]
    fn reset_voltage_forgets_charger_readings() {
        let (mut battery, state) = battery(14.2);
        for _ in 0..VOLTAGE_WINDOW {
            battery.update_voltage();
        }
        assert!(battery.is_fully_charged());

        state.borrow_mut().voltage = 13.1;
        battery.reset_voltage();

        assert_eq!(battery.voltage(), 13.1);
        assert!(!battery.is_fully_charged());
    }

    #[test]
    fn contact_is_sampled_with_the_voltage() {
        let (mut battery, state) = battery(13.0);
        state.borrow_mut().contact = true;
        assert!(!battery.is_being_charged());
        battery.update_voltage();
        assert!(battery.is_being_charged());
    }

    #[test]
    fn chemistry_and_override_thresholds() {
        let config = BatteryConfig {
            chemistry: BatteryChemistry::LiIon,
            go_home_voltage: Some(11.0),
            full_voltage: None,
        };
        assert_eq!(config.go_home_voltage(), 11.0);
        assert_eq!(config.full_voltage(), 12.6);
        assert!(BatteryChemistry::LeadAcid.go_home_voltage() < BatteryChemistry::LeadAcid.full_voltage());
    }
}
