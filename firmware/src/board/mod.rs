//! RP2350 adapters for the control core
//!
//! Every collaborator the state machine needs is implemented here on top of
//! embassy-rp peripherals, [`FirmwareBoard`] ties them together.

pub mod coil;
pub mod compass;
pub mod console;
pub mod motor;
pub mod power;
pub mod status;

use mower_core::board::{AlwaysCut, Board};
use mower_core::debug::SetupDebug;
use mower_core::power::Battery;

/// The mower as wired on this board
pub struct FirmwareBoard;

impl Board for FirmwareBoard {
    type Wheel = motor::MotorChannel;
    type Cutter = motor::MotorChannel;
    type Coils = coil::CoilMux;
    type Heading = compass::Attitude;
    type Power = Battery<power::PackSense>;
    type Errors = status::LogErrors;
    type Display = status::LogDisplay;
    type Console = SetupDebug<console::UartConsole>;
    // No real time clock fitted
    type Schedule = AlwaysCut;
}
