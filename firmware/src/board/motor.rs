//! TB6612FNG motor channels with shunt current sensing
//!
//! Each channel drives one motor through the `tb6612fng` crate and reads its
//! current from the shared ADC. The standby pin of a driver chip is held by
//! one of its channels, dropping that channel would put the chip to sleep.

use defmt::warn;
use embassy_rp::adc::Channel;
use embassy_rp::gpio::{Level, Output, Pull};
use embassy_rp::peripherals::{PIN_26, PIN_27, PIN_28};
use embassy_rp::pwm::{self, Pwm};
use mower_core::motor::MotorOutput;
use tb6612fng::{DriveCommand, Motor};

use crate::system::resources::{read_adc, CutterDriverResources, WheelDriverResources};

/// PWM frequency, cheaper DC motors often work better at lower frequencies
const PWM_FREQ_HZ: u32 = 10_000;

/// ADC reference voltage in mV
const REF_MILLIVOLTS: u32 = 3300;

/// ADC resolution (12-bit = 4096 steps)
const ADC_RANGE: u32 = 4096;

/// Shunt amplifier gain, output mV per A of motor current
const SENSE_MILLIVOLTS_PER_AMP: u32 = 1000;

type DriverMotor = Motor<Output<'static>, Output<'static>, Pwm<'static>>;

/// PWM configuration for the motor frequency at the current system clock
fn pwm_config() -> pwm::Config {
    let clock_freq_hz = embassy_rp::clocks::clk_sys_freq();

    // Smallest divider that keeps the period within 16 bits
    let divider = ((clock_freq_hz / PWM_FREQ_HZ) / 65535 + 1) as u8;
    let period = (clock_freq_hz / (PWM_FREQ_HZ * divider as u32)) as u16 - 1;

    let mut config = pwm::Config::default();
    config.divider = divider.into();
    config.top = period;
    config
}

fn to_milliamps(raw: u16) -> u16 {
    let millivolts = raw as u32 * REF_MILLIVOLTS / ADC_RANGE;
    (millivolts * 1000 / SENSE_MILLIVOLTS_PER_AMP).min(u16::MAX as u32) as u16
}

/// One driver channel plus its current sense input
pub struct MotorChannel {
    name: &'static str,
    motor: DriverMotor,
    sense: Channel<'static>,
    _standby: Option<Output<'static>>,
}

impl MotorChannel {
    fn new(name: &'static str, motor: DriverMotor, sense: Channel<'static>, standby: Option<Output<'static>>) -> Self {
        Self {
            name,
            motor,
            sense,
            _standby: standby,
        }
    }
}

impl MotorOutput for MotorChannel {
    fn set_output(&mut self, speed: i8) {
        let command = match speed {
            0 => DriveCommand::Stop,
            s if s > 0 => DriveCommand::Forward(s as u8),
            s => DriveCommand::Backward(s.unsigned_abs()),
        };
        if self.motor.drive(command).is_err() {
            warn!("{} motor command {} failed", self.name, speed);
        }
    }

    fn read_current(&mut self) -> u16 {
        read_adc(&mut self.sense).map(to_milliamps).unwrap_or(0)
    }
}

/// Blade motor, built first at boot and left stopped
///
/// The direction pins start low and the PWM compare starts at zero, so the
/// blade cannot spin between power up and the first control cycle.
pub fn cutter(r: CutterDriverResources, sense_pin: PIN_28) -> MotorChannel {
    let forward = Output::new(r.forward_pin, Level::Low);
    let backward = Output::new(r.backward_pin, Level::Low);
    let pwm = Pwm::new_output_a(r.slice, r.pwm_pin, pwm_config());
    let mut motor = Motor::new(forward, backward, pwm).expect("cutter motor init");
    motor.drive(DriveCommand::Stop).expect("cutter motor stop");

    let standby = Output::new(r.standby_pin, Level::High);
    let sense = Channel::new_pin(sense_pin, Pull::None);
    MotorChannel::new("cutter", motor, sense, Some(standby))
}

/// Left and right wheel channels
pub fn wheels(r: WheelDriverResources, left_sense: PIN_26, right_sense: PIN_27) -> (MotorChannel, MotorChannel) {
    let config = pwm_config();

    let left_fwd = Output::new(r.left_forward_pin, Level::Low);
    let left_bckw = Output::new(r.left_backward_pin, Level::Low);
    let left_pwm = Pwm::new_output_a(r.left_slice, r.left_pwm_pin, config.clone());
    let left_motor = Motor::new(left_fwd, left_bckw, left_pwm).expect("left motor init");

    let right_fwd = Output::new(r.right_forward_pin, Level::Low);
    let right_bckw = Output::new(r.right_backward_pin, Level::Low);
    let right_pwm = Pwm::new_output_b(r.right_slice, r.right_pwm_pin, config);
    let right_motor = Motor::new(right_fwd, right_bckw, right_pwm).expect("right motor init");

    let standby = Output::new(r.standby_pin, Level::High);
    let left = MotorChannel::new(
        "left",
        left_motor,
        Channel::new_pin(left_sense, Pull::None),
        Some(standby),
    );
    let right = MotorChannel::new("right", right_motor, Channel::new_pin(right_sense, Pull::None), None);
    (left, right)
}

