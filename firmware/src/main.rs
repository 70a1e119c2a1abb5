//! Mower firmware entry point
//!
//! Brings up the peripherals in a safe order, builds the board adapters and
//! spawns the control loop plus the two input tasks feeding it.

#![no_std]
#![no_main]

use crate::board::coil::CoilMux;
use crate::board::compass::Attitude;
use crate::board::console::UartConsole;
use crate::board::power::PackSense;
use crate::board::status::{LogDisplay, LogErrors};
use crate::board::{motor, FirmwareBoard};
use crate::system::resources::{
    self, AssignedResources, AttitudeResources, BatteryResources, BoundaryPulseResources,
    CoilSelectResources, ConsoleResources, CurrentSenseResources, CutterDriverResources, Irqs,
    WheelDriverResources,
};
use crate::system::settings::mower_config;
use crate::system::signals::BOUNDARY_SIGNAL;
use crate::task::{boundary_pulse::boundary_pulse, console_read::console_read, mow::mow};
use defmt::info;
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_rp::adc::Channel;
use embassy_rp::block::ImageDef;
use embassy_rp::config::Config;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::interrupt;
use embassy_rp::interrupt::{InterruptExt, Priority};
use embassy_rp::uart::{self, Uart};
use embassy_time::Instant;
use mower_core::board::BoardParts;
use mower_core::debug::SetupDebug;
use mower_core::power::Battery;
use {defmt_rtt as _, panic_probe as _};

/// Firmware image type for bootloader
#[link_section = ".start_block"]
#[used]
pub static IMAGE_DEF: ImageDef = ImageDef::secure_exe();

/// Hardware adapters
mod board;
/// System core modules
mod system;
/// Task implementations
mod task;

/// Runs the pulse capture above the control loop so edges are stamped on arrival
static EXECUTOR_HIGH: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn SWI_IRQ_1() {
    EXECUTOR_HIGH.on_interrupt()
}

/// Console baud rate
const CONSOLE_BAUDRATE: u32 = 115_200;

/// Seed for the random turns, boot time mixed with temperature sensor noise
fn random_seed(temperature: &mut Channel<'static>) -> u64 {
    let mut seed = Instant::now().as_ticks();
    for _ in 0..16 {
        let noise = resources::read_adc(temperature).unwrap_or(0) as u64;
        seed = seed.rotate_left(5) ^ noise;
    }
    seed
}

/// Firmware entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Config::default());

    // Split the resources into separate groups, one per owner
    let r = split_resources!(p);

    // The blade motor is the dangerous one, pin it to stopped before anything else
    let cutter = motor::cutter(r.cutter_driver, r.current_sense.cutter_pin);
    let (left_wheel, right_wheel) =
        motor::wheels(r.wheel_driver, r.current_sense.left_pin, r.current_sense.right_pin);

    // The ADC must be up before the first cycle reads currents or the pack
    resources::init_adc(p.ADC);
    let mut temperature = Channel::new_temp_sensor(p.ADC_TEMP_SENSOR);
    let seed = random_seed(&mut temperature);

    let mut uart_config = uart::Config::default();
    uart_config.baudrate = CONSOLE_BAUDRATE;
    let uart = Uart::new(
        r.console.uart,
        r.console.tx_pin,
        r.console.rx_pin,
        Irqs,
        r.console.tx_dma,
        r.console.rx_dma,
        uart_config,
    );
    let (tx, rx) = uart.split();
    let led = Output::new(r.console.led_pin, Level::Low);

    let config = mower_config();
    let parts = BoardParts::<FirmwareBoard> {
        left_wheel,
        right_wheel,
        cutter,
        coils: CoilMux::new(r.coil_select),
        signal: &BOUNDARY_SIGNAL,
        heading: Attitude::new(r.attitude),
        power: Battery::new(PackSense::new(r.battery), &config.battery),
        errors: LogErrors::default(),
        display: LogDisplay::default(),
        console: SetupDebug::new(UartConsole::new(tx, led)),
        // No real time clock fitted, mowing is always allowed
        schedule: None,
    };

    info!("peripherals ready, seed {=u64:x}", seed);

    // Pulse capture first so the wire is already decoded when the loop starts
    interrupt::SWI_IRQ_1.set_priority(Priority::P2);
    let pulse_spawner = EXECUTOR_HIGH.start(interrupt::SWI_IRQ_1);
    pulse_spawner.spawn(boundary_pulse(r.boundary_pulse)).unwrap();
    spawner.spawn(console_read(rx)).unwrap();
    spawner.spawn(mow(parts, seed)).unwrap();
}
