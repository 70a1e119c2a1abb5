//! Hardware Resource Management
//!
//! Splits the RP2350 peripherals into one group per owner with
//! `assign_resources!`, so every pin has exactly one user.
//!
//! # Resource Groups
//! - Wheel driver: TB6612FNG for both drive wheels
//! - Cutter driver: second TB6612FNG, channel A drives the blade motor
//! - Current and battery sense: ADC inputs
//! - Boundary: comparator output and the coil multiplexer select lines
//! - Attitude: I2C bus for compass/IMU plus the lift switch
//! - Console: UART0 with its DMA channels and the status LED
//!
//! # Shared Resources
//! The ADC is read by the wheel, cutter and battery adapters. It lives in a
//! blocking mutex and every read holds the lock only for one conversion.

use core::cell::RefCell;

use assign_resources::assign_resources;
use embassy_rp::adc::{Adc, Blocking, Channel, Config as AdcConfig};
use embassy_rp::bind_interrupts;
use embassy_rp::peripherals::{self, ADC, UART0};
use embassy_rp::uart::InterruptHandler as UartInterruptHandler;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

/// Global ADC instance, `None` until [`init_adc`] ran
static SHARED_ADC: Mutex<CriticalSectionRawMutex, RefCell<Option<Adc<'static, Blocking>>>> =
    Mutex::new(RefCell::new(None));

/// Initializes the ADC peripheral.
///
/// Called once from main before any adapter that reads an analog input is
/// constructed.
pub fn init_adc(adc: ADC) {
    let adc = Adc::new_blocking(adc, AdcConfig::default());
    SHARED_ADC.lock(|cell| {
        cell.replace(Some(adc));
    });
}

/// One blocking conversion on `channel`, `None` if the ADC is missing or failed
pub fn read_adc(channel: &mut Channel<'static>) -> Option<u16> {
    SHARED_ADC.lock(|cell| {
        cell.borrow_mut()
            .as_mut()
            .and_then(|adc| adc.blocking_read(channel).ok())
    })
}

assign_resources! {
    /// TB6612FNG driving the two wheel motors
    wheel_driver: WheelDriverResources {
        standby_pin: PIN_22,
        // Left wheel, motor A
        left_slice: PWM_SLICE4,
        left_pwm_pin: PIN_8,
        left_forward_pin: PIN_21,
        left_backward_pin: PIN_20,
        // Right wheel, motor B
        right_slice: PWM_SLICE5,
        right_pwm_pin: PIN_11,
        right_forward_pin: PIN_19,
        right_backward_pin: PIN_18,
    },
    /// Second TB6612FNG, only channel A is used for the blade
    cutter_driver: CutterDriverResources {
        standby_pin: PIN_4,
        slice: PWM_SLICE0,
        pwm_pin: PIN_0,
        forward_pin: PIN_2,
        backward_pin: PIN_3,
    },
    /// Shunt amplifier outputs of the three motors
    current_sense: CurrentSenseResources {
        left_pin: PIN_26,
        right_pin: PIN_27,
        cutter_pin: PIN_28,
    },
    /// Pack voltage divider and charging station contact
    battery: BatteryResources {
        voltage_pin: PIN_29,
        contact_pin: PIN_6,
    },
    /// Comparator output of the boundary receiver
    boundary_pulse: BoundaryPulseResources {
        pulse_pin: PIN_7,
    },
    /// Analog multiplexer selecting the receiver coil
    coil_select: CoilSelectResources {
        select_a_pin: PIN_14,
        select_b_pin: PIN_15,
    },
    /// Compass or IMU on I2C0 and the lift switch
    attitude: AttitudeResources {
        i2c: I2C0,
        sda_pin: PIN_12,
        scl_pin: PIN_13,
        lift_pin: PIN_5,
    },
    /// Setup/debug console
    console: ConsoleResources {
        uart: UART0,
        tx_pin: PIN_16,
        rx_pin: PIN_17,
        tx_dma: DMA_CH0,
        rx_dma: DMA_CH1,
        led_pin: PIN_25,
    },
}

bind_interrupts!(pub struct Irqs {
    UART0_IRQ => UartInterruptHandler<UART0>;
});
