//! Heading and attitude hardware
//!
//! Which heading source is fitted is found out at boot by probing the I2C
//! bus: an MPU-9150 (accelerometer plus AK8975 magnetometer behind the I2C
//! bypass) is preferred, a plain HMC5883L compass is the fallback and
//! without either the mower runs on open-loop turns alone.
//!
//! Only the IMU can tell tilt. A plain compass never reports a flip, the lift
//! switch works with every variant.

use defmt::{debug, info, warn};
use embassy_rp::gpio::{Input, Pull};
use embassy_rp::i2c::{self, Blocking, I2c};
use embassy_rp::peripherals::I2C0;
use libm::{acosf, atan2f, sqrtf};
use mower_core::heading::{normalize, HeadingSensor};

use crate::system::resources::AttitudeResources;

type Bus = I2c<'static, I2C0, Blocking>;

const HMC5883L_ADDR: u8 = 0x1E;
const HMC5883L_ID_REG: u8 = 0x0A;
const HMC5883L_DATA_REG: u8 = 0x03;

const MPU9150_ADDR: u8 = 0x68;
const MPU9150_WHO_AM_I_REG: u8 = 0x75;
const MPU9150_ACCEL_REG: u8 = 0x3B;
const AK8975_ADDR: u8 = 0x0C;
const AK8975_DATA_REG: u8 = 0x03;

/// Tilt beyond this counts as flipped over
const FLIP_TILT_DEGREES: u16 = 60;

fn heading_degrees(x: f32, y: f32) -> u16 {
    normalize(atan2f(y, x).to_degrees() as i32)
}

/// Fitted heading source
pub enum HeadingUnit {
    None,
    Hmc5883l(Bus),
    Mpu9150(Bus),
}

impl HeadingUnit {
    /// Find out what is on the bus
    pub fn probe(mut bus: Bus) -> Self {
        let mut who = [0u8; 1];
        if bus
            .blocking_write_read(MPU9150_ADDR, &[MPU9150_WHO_AM_I_REG], &mut who)
            .is_ok()
            && who[0] == MPU9150_ADDR
        {
            info!("heading: MPU-9150");
            return HeadingUnit::Mpu9150(bus);
        }

        let mut id = [0u8; 3];
        if bus
            .blocking_write_read(HMC5883L_ADDR, &[HMC5883L_ID_REG], &mut id)
            .is_ok()
            && &id == b"H43"
        {
            info!("heading: HMC5883L");
            return HeadingUnit::Hmc5883l(bus);
        }

        warn!("heading: no compass found, running open loop");
        HeadingUnit::None
    }

    fn configure(&mut self) -> Result<(), i2c::Error> {
        match self {
            HeadingUnit::None => Ok(()),
            HeadingUnit::Hmc5883l(bus) => {
                // 8 sample average at 15 Hz, 1.3 Ga range, continuous mode
                bus.blocking_write(HMC5883L_ADDR, &[0x00, 0x70])?;
                bus.blocking_write(HMC5883L_ADDR, &[0x01, 0x20])?;
                bus.blocking_write(HMC5883L_ADDR, &[0x02, 0x00])
            }
            HeadingUnit::Mpu9150(bus) => {
                // Wake up, then expose the magnetometer on the main bus
                bus.blocking_write(MPU9150_ADDR, &[0x6B, 0x00])?;
                bus.blocking_write(MPU9150_ADDR, &[0x37, 0x02])?;
                bus.blocking_write(AK8975_ADDR, &[0x0A, 0x01])
            }
        }
    }

    /// Heading and tilt, `None` fields when the unit cannot tell
    fn read(&mut self) -> Result<(Option<u16>, Option<u16>), i2c::Error> {
        match self {
            HeadingUnit::None => Ok((None, None)),
            HeadingUnit::Hmc5883l(bus) => {
                let mut raw = [0u8; 6];
                bus.blocking_write_read(HMC5883L_ADDR, &[HMC5883L_DATA_REG], &mut raw)?;
                // Register order is X, Z, Y
                let x = i16::from_be_bytes([raw[0], raw[1]]) as f32;
                let y = i16::from_be_bytes([raw[4], raw[5]]) as f32;
                Ok((Some(heading_degrees(x, y)), None))
            }
            HeadingUnit::Mpu9150(bus) => {
                let mut accel = [0u8; 6];
                bus.blocking_write_read(MPU9150_ADDR, &[MPU9150_ACCEL_REG], &mut accel)?;
                let ax = i16::from_be_bytes([accel[0], accel[1]]) as f32;
                let ay = i16::from_be_bytes([accel[2], accel[3]]) as f32;
                let az = i16::from_be_bytes([accel[4], accel[5]]) as f32;
                let norm = sqrtf(ax * ax + ay * ay + az * az).max(1.0);
                let tilt = acosf((az / norm).clamp(-1.0, 1.0)).to_degrees() as u16;

                // Magnetometer runs in single shot mode, read the last
                // measurement and trigger the next one
                let mut mag = [0u8; 6];
                bus.blocking_write_read(AK8975_ADDR, &[AK8975_DATA_REG], &mut mag)?;
                bus.blocking_write(AK8975_ADDR, &[0x0A, 0x01])?;
                let mx = i16::from_le_bytes([mag[0], mag[1]]) as f32;
                let my = i16::from_le_bytes([mag[2], mag[3]]) as f32;
                Ok((Some(heading_degrees(mx, my)), Some(tilt)))
            }
        }
    }

    fn is_present(&self) -> bool {
        !matches!(self, HeadingUnit::None)
    }
}

/// [`HeadingSensor`] over the probed unit and the lift switch
pub struct Attitude {
    unit: HeadingUnit,
    lift_switch: Input<'static>,
    heading: u16,
    tilt: u16,
}

impl Attitude {
    pub fn new(r: AttitudeResources) -> Self {
        let mut config = i2c::Config::default();
        config.frequency = 400_000;
        let bus = I2c::new_blocking(r.i2c, r.scl_pin, r.sda_pin, config);

        Self {
            unit: HeadingUnit::probe(bus),
            // Switch closes to ground when the body lifts off the chassis
            lift_switch: Input::new(r.lift_pin, Pull::Up),
            heading: 0,
            tilt: 0,
        }
    }
}

impl HeadingSensor for Attitude {
    fn initialize(&mut self) {
        if self.unit.configure().is_err() {
            warn!("heading unit did not accept its configuration");
        }
    }

    fn update_heading(&mut self) {
        match self.unit.read() {
            Ok((heading, tilt)) => {
                if let Some(heading) = heading {
                    self.heading = heading;
                }
                if let Some(tilt) = tilt {
                    self.tilt = tilt;
                }
            }
            // Keep the last reading, one failed transfer is not worth a fault
            Err(_) => debug!("heading read failed"),
        }
    }

    fn heading(&self) -> u16 {
        self.heading
    }

    fn has_flipped(&self) -> bool {
        self.tilt > FLIP_TILT_DEGREES
    }

    fn is_lifted(&self) -> bool {
        self.lift_switch.is_low()
    }

    fn is_present(&self) -> bool {
        self.unit.is_present()
    }

    fn tilt(&self) -> u16 {
        self.tilt
    }
}
