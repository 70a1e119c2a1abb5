//! Setup and debug console
//!
//! A single character command interpreter used while installing the mower:
//! spin each wheel and the cutter on their own, check the boundary signal on
//! every coil and read back heading and tilt.
//!
//! Sending `D` from any state hands control to the console. While it has
//! control the state machine only services the console, all motors start
//! out stopped.
//!
//! | Key | Action |
//! |-----|--------|
//! | `H` | help |
//! | `L` / `R` | toggle left / right wheel |
//! | `C` | toggle cutter |
//! | `S` | boundary signals |
//! | `G` | heading, tilt and currents |
//! | `T` | toggle status LED |
//! | `E` | clear a latched fault |
//! | `I` | leave into Idle |
//! | `Q` | leave into the previous state (Mowing if that was Idle) |

use core::fmt::Write;

use heapless::String;

use crate::boundary::BoundarySnapshot;
use crate::error::ErrorCode;
use crate::state::MowerState;

const HELP: &str = "\
setup/debug commands:
  H help
  L toggle left wheel
  R toggle right wheel
  C toggle cutter
  S boundary signals
  G heading and tilt
  T toggle LED
  E clear fault
  I idle
  Q quit";

/// Byte stream the console reads commands from and writes replies to
pub trait ConsoleIo {
    fn read_byte(&mut self) -> Option<u8>;
    fn write_str(&mut self, text: &str);
    fn set_led(&mut self, _on: bool) {}
}

/// Boundary readings for the `S` command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryReport {
    pub snapshot: BoundarySnapshot,
    pub left: i32,
    pub right: i32,
    pub center: i32,
}

/// Heading, attitude and current readings for the `G` command
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionReport {
    pub heading: u16,
    pub target: u16,
    pub tilt: u16,
    pub flipped: bool,
    pub lifted: bool,
    pub left_current: u16,
    pub right_current: u16,
    pub cutter_current: u16,
    pub voltage: f32,
}

/// What the console may do to the mower
pub trait Workbench {
    fn stop_all(&mut self);
    /// Returns whether the wheel now runs
    fn toggle_left_wheel(&mut self) -> bool;
    fn toggle_right_wheel(&mut self) -> bool;
    fn toggle_cutter(&mut self) -> bool;
    fn boundary_report(&self) -> BoundaryReport;
    fn motion_report(&self) -> MotionReport;
    /// Returns the fault that was cleared, if any
    fn clear_fault(&mut self) -> Option<ErrorCode>;
}

/// Collaborator polled once per cycle by the state machine
pub trait DebugConsole {
    /// State to continue in, `SetupDebug` when the operator asked for it
    fn try_enter_setup_debug_mode(&mut self, current: MowerState) -> MowerState;

    /// Handle pending commands, `Some` with the state to leave into
    fn service(&mut self, bench: &mut dyn Workbench) -> Option<MowerState>;
}

/// Console over any [`ConsoleIo`]
pub struct SetupDebug<I> {
    io: I,
    entered_from: MowerState,
    led: bool,
}

impl<I: ConsoleIo> SetupDebug<I> {
    pub fn new(io: I) -> Self {
        Self {
            io,
            entered_from: MowerState::Idle,
            led: false,
        }
    }

    pub fn io(&mut self) -> &mut I {
        &mut self.io
    }

    fn print_fmt(&mut self, args: core::fmt::Arguments) {
        let mut line: String<128> = String::new();
        // Overlong lines are cut short
        let _ = line.write_fmt(args);
        self.io.write_str(&line);
    }

    fn print_signals(&mut self, report: BoundaryReport) {
        self.print_fmt(format_args!(
            "left {:?} {}  right {:?} {}",
            report.snapshot.left, report.left, report.snapshot.right, report.right
        ));
        if let Some(center) = report.snapshot.center {
            self.print_fmt(format_args!("center {:?} {}", center, report.center));
        }
    }

    fn print_motion(&mut self, report: MotionReport) {
        self.print_fmt(format_args!(
            "heading {} target {} tilt {} flipped {} lifted {}",
            report.heading, report.target, report.tilt, report.flipped, report.lifted
        ));
        self.print_fmt(format_args!(
            "current L {} R {} C {} mA, battery {:.2} V",
            report.left_current, report.right_current, report.cutter_current, report.voltage
        ));
    }

    fn leave(&mut self, bench: &mut dyn Workbench, next: MowerState) -> Option<MowerState> {
        bench.stop_all();
        self.print_fmt(format_args!("leaving setup, {}", next.name()));
        Some(next)
    }
}

impl<I: ConsoleIo> DebugConsole for SetupDebug<I> {
    fn try_enter_setup_debug_mode(&mut self, current: MowerState) -> MowerState {
        if current == MowerState::SetupDebug {
            return current;
        }
        while let Some(byte) = self.io.read_byte() {
            if byte.eq_ignore_ascii_case(&b'd') {
                self.entered_from = current;
                self.io.write_str(HELP);
                return MowerState::SetupDebug;
            }
        }
        current
    }

    fn service(&mut self, bench: &mut dyn Workbench) -> Option<MowerState> {
        while let Some(byte) = self.io.read_byte() {
            match byte.to_ascii_uppercase() {
                b'H' | b'D' => self.io.write_str(HELP),
                b'L' => {
                    let on = bench.toggle_left_wheel();
                    self.print_fmt(format_args!("left wheel {}", if on { "on" } else { "off" }));
                }
                b'R' => {
                    let on = bench.toggle_right_wheel();
                    self.print_fmt(format_args!("right wheel {}", if on { "on" } else { "off" }));
                }
                b'C' => {
                    let on = bench.toggle_cutter();
                    self.print_fmt(format_args!("cutter {}", if on { "on" } else { "off" }));
                }
                b'S' => {
                    let report = bench.boundary_report();
                    self.print_signals(report);
                }
                b'G' => {
                    let report = bench.motion_report();
                    self.print_motion(report);
                }
                b'T' => {
                    self.led = !self.led;
                    self.io.set_led(self.led);
                    self.print_fmt(format_args!("led {}", if self.led { "on" } else { "off" }));
                }
                b'E' => match bench.clear_fault() {
                    Some(code) => self.print_fmt(format_args!("cleared {}", code.as_str())),
                    None => self.io.write_str("no fault"),
                },
                b'I' => return self.leave(bench, MowerState::Idle),
                b'Q' => {
                    let next = match self.entered_from {
                        MowerState::Idle | MowerState::SetupDebug => MowerState::Mowing,
                        state => state,
                    };
                    return self.leave(bench, next);
                }
                b'\r' | b'\n' | b' ' => {}
                _ => self.io.write_str("unknown command, H for help"),
            }
        }
        None
    }
}
