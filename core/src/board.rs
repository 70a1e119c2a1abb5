//! Hardware wiring of the state machine
//!
//! A [`Board`] names the concrete type behind every collaborator, the
//! matching [`BoardParts`] carries the instances into
//! [`crate::MowerStateMachine::new`]. Everything is constructed once at boot
//! and lives for the lifetime of the program.

use crate::boundary::{BoundarySignal, CoilSelect};
use crate::debug::DebugConsole;
use crate::error::ErrorSink;
use crate::heading::HeadingSensor;
use crate::motor::MotorOutput;
use crate::power::PowerSource;

/// Low rate status output
pub trait Display {
    fn initialize(&mut self);
    fn clear(&mut self);
    fn print(&mut self, text: &str);
    /// Push what was printed since the last clear
    fn update(&mut self);
}

/// Gate on when mowing is allowed, consulted before leaving the dock
pub trait CutSchedule {
    fn time_to_cut(&mut self) -> bool;
}

/// Schedule for boards without a clock, mowing is always allowed
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysCut;

impl CutSchedule for AlwaysCut {
    fn time_to_cut(&mut self) -> bool {
        true
    }
}

/// Concrete collaborator types of one hardware variant
pub trait Board {
    type Wheel: MotorOutput;
    type Cutter: MotorOutput;
    type Coils: CoilSelect;
    type Heading: HeadingSensor;
    type Power: PowerSource;
    type Errors: ErrorSink;
    type Display: Display;
    type Console: DebugConsole;
    type Schedule: CutSchedule;
}

/// Collaborator instances handed to the state machine
pub struct BoardParts<B: Board> {
    pub left_wheel: B::Wheel,
    pub right_wheel: B::Wheel,
    pub cutter: B::Cutter,
    pub coils: B::Coils,
    /// Shared with the pulse interrupt
    pub signal: &'static BoundarySignal,
    pub heading: B::Heading,
    pub power: B::Power,
    pub errors: B::Errors,
    pub display: B::Display,
    pub console: B::Console,
    /// `None` when no clock is fitted
    pub schedule: Option<B::Schedule>,
}
