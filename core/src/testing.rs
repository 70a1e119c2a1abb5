//! Recording doubles for the hardware traits, shared by the unit tests

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::string::String;
use std::vec::Vec;

use crate::board::{Board, BoardParts, CutSchedule, Display};
use crate::boundary::{BoundaryClassification, BoundaryOrientation, BoundarySignal, CoilSelect};
use crate::config::MowerConfig;
use crate::debug::{ConsoleIo, SetupDebug};
use crate::error::{ErrorCode, ErrorSink};
use crate::heading::HeadingSensor;
use crate::motion::MotionController;
use crate::motor::MotorOutput;
use crate::mower::MowerStateMachine;
use crate::power::{BatterySense, PowerSource};

pub type Shared<T> = Rc<RefCell<T>>;

fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

#[derive(Debug, Default)]
pub struct MotorState {
    /// Every value written to the output, in order
    pub outputs: Vec<i8>,
    pub current: u16,
}

impl MotorState {
    pub fn last(&self) -> i8 {
        self.outputs.last().copied().unwrap_or(0)
    }
}

#[derive(Debug, Default, Clone)]
pub struct MockMotor {
    pub state: Shared<MotorState>,
}

impl MotorOutput for MockMotor {
    fn set_output(&mut self, speed: i8) {
        self.state.borrow_mut().outputs.push(speed);
    }

    fn read_current(&mut self) -> u16 {
        self.state.borrow().current
    }
}

#[derive(Debug, Default, Clone)]
pub struct RecordingCoils {
    pub log: Shared<Vec<BoundaryOrientation>>,
}

impl CoilSelect for RecordingCoils {
    fn select(&mut self, orientation: BoundaryOrientation) {
        self.log.borrow_mut().push(orientation);
    }
}

#[derive(Debug)]
pub struct HeadingState {
    pub heading: u16,
    pub flipped: bool,
    pub lifted: bool,
    pub present: bool,
    pub tilt: u16,
}

impl Default for HeadingState {
    fn default() -> Self {
        Self {
            heading: 0,
            flipped: false,
            lifted: false,
            present: true,
            tilt: 0,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct MockHeading {
    pub state: Shared<HeadingState>,
}

impl HeadingSensor for MockHeading {
    fn initialize(&mut self) {}

    fn update_heading(&mut self) {}

    fn heading(&self) -> u16 {
        self.state.borrow().heading
    }

    fn has_flipped(&self) -> bool {
        self.state.borrow().flipped
    }

    fn is_lifted(&self) -> bool {
        self.state.borrow().lifted
    }

    fn is_present(&self) -> bool {
        self.state.borrow().present
    }

    fn tilt(&self) -> u16 {
        self.state.borrow().tilt
    }
}

#[derive(Debug, Default)]
pub struct BatteryState {
    pub voltage: f32,
    pub contact: bool,
}

#[derive(Debug, Default, Clone)]
pub struct MockBatterySense {
    pub state: Shared<BatteryState>,
}

impl BatterySense for MockBatterySense {
    fn read_voltage(&mut self) -> f32 {
        self.state.borrow().voltage
    }

    fn charge_contact(&mut self) -> bool {
        self.state.borrow().contact
    }
}

/// Power source with the decisions set directly by the test
#[derive(Debug)]
pub struct PowerState {
    pub voltage: f32,
    pub charging: bool,
    pub must_charge: bool,
    pub full: bool,
    pub resets: u32,
}

impl Default for PowerState {
    fn default() -> Self {
        Self {
            voltage: 12.6,
            charging: false,
            must_charge: false,
            full: false,
            resets: 0,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct MockPower {
    pub state: Shared<PowerState>,
}

impl PowerSource for MockPower {
    fn reset_voltage(&mut self) {
        self.state.borrow_mut().resets += 1;
    }

    fn update_voltage(&mut self) {}

    fn is_being_charged(&self) -> bool {
        self.state.borrow().charging
    }

    fn must_charge(&self) -> bool {
        self.state.borrow().must_charge
    }

    fn is_fully_charged(&self) -> bool {
        self.state.borrow().full
    }

    fn voltage(&self) -> f32 {
        self.state.borrow().voltage
    }
}

#[derive(Debug, Default, Clone)]
pub struct MockErrors {
    pub flagged: Shared<Vec<ErrorCode>>,
}

impl ErrorSink for MockErrors {
    fn flag(&mut self, code: ErrorCode) {
        self.flagged.borrow_mut().push(code);
    }
}

#[derive(Debug, Default, Clone)]
pub struct MockDisplay {
    pub lines: Shared<Vec<String>>,
    pub updates: Shared<u32>,
}

impl Display for MockDisplay {
    fn initialize(&mut self) {}

    fn clear(&mut self) {
        self.lines.borrow_mut().clear();
    }

    fn print(&mut self, text: &str) {
        self.lines.borrow_mut().push(text.into());
    }

    fn update(&mut self) {
        *self.updates.borrow_mut() += 1;
    }
}

#[derive(Debug, Default)]
struct IoState {
    input: VecDeque<u8>,
    output: String,
    led: bool,
}

/// Console bytes fed by the test, replies collected line by line
#[derive(Debug, Default, Clone)]
pub struct ScriptedIo {
    state: Shared<IoState>,
}

impl ScriptedIo {
    pub fn new(input: &str) -> Self {
        let io = Self::default();
        io.push(input);
        io
    }

    pub fn push(&self, input: &str) {
        self.state.borrow_mut().input.extend(input.bytes());
    }

    pub fn output(&self) -> String {
        self.state.borrow().output.clone()
    }

    pub fn led(&self) -> bool {
        self.state.borrow().led
    }
}

impl ConsoleIo for ScriptedIo {
    fn read_byte(&mut self) -> Option<u8> {
        self.state.borrow_mut().input.pop_front()
    }

    fn write_str(&mut self, text: &str) {
        let mut state = self.state.borrow_mut();
        state.output.push_str(text);
        state.output.push('\n');
    }

    fn set_led(&mut self, on: bool) {
        self.state.borrow_mut().led = on;
    }
}

#[derive(Debug, Clone)]
pub struct MockSchedule {
    pub cut: Shared<bool>,
}

impl Default for MockSchedule {
    fn default() -> Self {
        Self { cut: shared(true) }
    }
}

impl CutSchedule for MockSchedule {
    fn time_to_cut(&mut self) -> bool {
        *self.cut.borrow()
    }
}

pub struct MockBoard;

impl Board for MockBoard {
    type Wheel = MockMotor;
    type Cutter = MockMotor;
    type Coils = RecordingCoils;
    type Heading = MockHeading;
    type Power = MockPower;
    type Errors = MockErrors;
    type Display = MockDisplay;
    type Console = SetupDebug<ScriptedIo>;
    type Schedule = MockSchedule;
}

/// Handles into every double behind a test state machine
pub struct Rig {
    pub left: Shared<MotorState>,
    pub right: Shared<MotorState>,
    pub cutter: Shared<MotorState>,
    pub heading: Shared<HeadingState>,
    pub power: Shared<PowerState>,
    pub errors: Shared<Vec<ErrorCode>>,
    pub display: Shared<Vec<String>>,
    pub schedule: Shared<bool>,
    pub io: ScriptedIo,
    pub signal: &'static BoundarySignal,
}

impl Rig {
    /// Publish fresh codes for both side coils, stamped `now_ms`
    pub fn boundary(&self, left: BoundaryClassification, right: BoundaryClassification, now_ms: u64) {
        for (orientation, class) in [(BoundaryOrientation::Left, left), (BoundaryOrientation::Right, right)] {
            let strength = match class {
                BoundaryClassification::Inside => 10,
                BoundaryClassification::Outside => -10,
                BoundaryClassification::Unknown => 0,
            };
            self.signal.publish(orientation, class, now_ms, strength);
        }
    }

    pub fn flagged(&self) -> Vec<ErrorCode> {
        self.errors.borrow().clone()
    }
}

pub fn mower() -> (MowerStateMachine<MockBoard>, Rig) {
    mower_with(MowerConfig::default())
}

pub fn mower_with(config: MowerConfig) -> (MowerStateMachine<MockBoard>, Rig) {
    let (left, right, cutter) = (MockMotor::default(), MockMotor::default(), MockMotor::default());
    let heading = MockHeading::default();
    let power = MockPower::default();
    let errors = MockErrors::default();
    let display = MockDisplay::default();
    let schedule = MockSchedule::default();
    let io = ScriptedIo::default();
    let signal: &'static BoundarySignal = Box::leak(Box::new(BoundarySignal::new()));

    let rig = Rig {
        left: left.state.clone(),
        right: right.state.clone(),
        cutter: cutter.state.clone(),
        heading: heading.state.clone(),
        power: power.state.clone(),
        errors: errors.flagged.clone(),
        display: display.lines.clone(),
        schedule: schedule.cut.clone(),
        io: io.clone(),
        signal,
    };

    let parts = BoardParts::<MockBoard> {
        left_wheel: left,
        right_wheel: right,
        cutter,
        coils: RecordingCoils::default(),
        signal,
        heading,
        power,
        errors,
        display,
        console: SetupDebug::new(io),
        schedule: Some(schedule),
    };
    (MowerStateMachine::new(parts, config, 7), rig)
}

pub type TestMotion = MotionController<MockMotor, MockMotor, MockHeading>;

pub struct MotionHandles {
    pub left: Shared<MotorState>,
    pub right: Shared<MotorState>,
    pub cutter: Shared<MotorState>,
    pub heading: Shared<HeadingState>,
}

pub fn motion() -> (TestMotion, MotionHandles) {
    let (left, right, cutter) = (MockMotor::default(), MockMotor::default(), MockMotor::default());
    let heading = MockHeading::default();
    let handles = MotionHandles {
        left: left.state.clone(),
        right: right.state.clone(),
        cutter: cutter.state.clone(),
        heading: heading.state.clone(),
    };
    let motion = MotionController::new(left, right, cutter, heading, &MowerConfig::default(), 42);
    (motion, handles)
}
