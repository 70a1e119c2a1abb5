//! Behavioural state machine
//!
//! [`MowerStateMachine::cycle`] is called at a fixed rate by the firmware.
//! Every cycle runs the same sequence:
//!
//! 1. Read the sensors once: heading, battery, boundary snapshot
//! 2. Tilt check, a tilt stops everything and latches a fault
//! 3. Lift check and the lift recovery sequence
//! 4. Setup/debug console, and holding still while a fault is latched
//! 5. Boundary lost detection
//! 6. Dispatch to the handler of the current state
//! 7. Motor ramp ticks
//! 8. Status display refresh
//!
//! Handlers live in their own modules and get their per-state context plus
//! the [`Devices`]. The context is rebuilt on every transition, so no timer
//! survives a change of state.

use core::fmt::Write;

use embassy_time::Instant;
use heapless::String;

use crate::board::{Board, BoardParts, CutSchedule, Display};
use crate::boundary::{BoundaryClassification, BoundaryOrientation, BoundarySensor, BoundarySnapshot};
use crate::config::MowerConfig;
use crate::debug::{BoundaryReport, DebugConsole, MotionReport, Workbench};
use crate::error::{ErrorCode, ErrorSink};
use crate::heading::HeadingSensor;
use crate::motion::{ManeuverKind, ManeuverStatus, MotionController};
use crate::power::PowerSource;
use crate::state::MowerState;

mod charging;
mod docking;
mod launching;
mod mowing;
mod searching;

#[cfg(test)]
mod tests;

pub use charging::ChargingContext;
pub use docking::{DockingContext, DockingPhase};
pub use launching::LaunchingContext;
pub use mowing::{MowingContext, MowingPhase};
pub use searching::{SearchContext, SearchPhase};

/// Per-state private data
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StateContext {
    Idle,
    Mowing(MowingContext),
    Launching(LaunchingContext),
    Docking(DockingContext),
    LookingForBoundary(SearchContext),
    Charging(ChargingContext),
    SetupDebug,
}

impl StateContext {
    fn enter(state: MowerState, now: Instant) -> Self {
        match state {
            MowerState::Idle => StateContext::Idle,
            MowerState::Mowing => StateContext::Mowing(MowingContext::new(now)),
            MowerState::Launching => StateContext::Launching(LaunchingContext::default()),
            MowerState::Docking => StateContext::Docking(DockingContext::new(now)),
            MowerState::LookingForBoundary => StateContext::LookingForBoundary(SearchContext::new(now)),
            MowerState::Charging => StateContext::Charging(ChargingContext::new(now)),
            MowerState::SetupDebug => StateContext::SetupDebug,
        }
    }
}

/// Lift recovery progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LiftRecovery {
    /// Reversing off whatever lifted the body
    BackingOff,
    /// Still lifted after backing off, waiting for it to clear
    Holding,
    /// Free again, random turn before resuming
    Turning,
}

/// Everything the handlers drive or read
pub struct Devices<B: Board> {
    pub(crate) motion: MotionController<B::Wheel, B::Cutter, B::Heading>,
    pub(crate) boundary: BoundarySensor<B::Coils>,
    pub(crate) power: B::Power,
    pub(crate) errors: B::Errors,
    pub(crate) display: B::Display,
    pub(crate) schedule: Option<B::Schedule>,
    pub(crate) config: MowerConfig,
    /// This cycle's boundary classification
    pub(crate) snapshot: BoundarySnapshot,
    pub(crate) fault: Option<ErrorCode>,
    pub(crate) last_error: Option<ErrorCode>,
}

impl<B: Board> Devices<B> {
    /// Report a fault, fatal codes stop everything and latch first
    pub(crate) fn flag(&mut self, code: ErrorCode) {
        if code.is_fatal() {
            self.motion.hard_stop();
            self.fault = Some(code);
            log_error!("fatal error {:?}, holding", code);
        } else {
            log_warn!("error {:?}", code);
        }
        self.last_error = Some(code);
        self.errors.flag(code);
    }

    pub(crate) fn time_to_cut(&mut self) -> bool {
        self.schedule
            .as_mut()
            .map_or(true, |schedule| schedule.time_to_cut())
    }
}

impl<B: Board> Workbench for Devices<B> {
    fn stop_all(&mut self) {
        self.motion.hard_stop();
    }

    fn toggle_left_wheel(&mut self) -> bool {
        let left = if self.motion.left_wheel().target() == 0 {
            self.config.drive.full_speed
        } else {
            0
        };
        let right = self.motion.right_wheel().target();
        self.motion.set_wheels(left, right);
        left != 0
    }

    fn toggle_right_wheel(&mut self) -> bool {
        let right = if self.motion.right_wheel().target() == 0 {
            self.config.drive.full_speed
        } else {
            0
        };
        let left = self.motion.left_wheel().target();
        self.motion.set_wheels(left, right);
        right != 0
    }

    fn toggle_cutter(&mut self) -> bool {
        if self.motion.cutter().is_running() {
            self.motion.stop_cutter();
        } else {
            self.motion.start_cutter();
        }
        self.motion.cutter().is_running()
    }

    fn boundary_report(&self) -> BoundaryReport {
        BoundaryReport {
            snapshot: self.snapshot,
            left: self.boundary.signal(BoundaryOrientation::Left),
            right: self.boundary.signal(BoundaryOrientation::Right),
            center: self.boundary.signal(BoundaryOrientation::Center),
        }
    }

    fn motion_report(&self) -> MotionReport {
        let compass = self.motion.compass();
        MotionReport {
            heading: compass.heading(),
            target: compass.target_heading(),
            tilt: compass.sensor().tilt(),
            flipped: compass.has_flipped(),
            lifted: compass.is_lifted(),
            left_current: self.motion.left_wheel().get_current(),
            right_current: self.motion.right_wheel().get_current(),
            cutter_current: self.motion.cutter().get_current(),
            voltage: self.power.voltage(),
        }
    }

    fn clear_fault(&mut self) -> Option<ErrorCode> {
        let cleared = self.fault.take();
        if let Some(code) = cleared {
            log_info!("fault {:?} cleared", code);
        }
        cleared
    }
}

/// The orchestrator
pub struct MowerStateMachine<B: Board> {
    devices: Devices<B>,
    console: B::Console,
    state: MowerState,
    context: StateContext,
    lift: Option<LiftRecovery>,
    no_signal_since: Option<Instant>,
    boundary_lost_reported: bool,
    last_display: Option<Instant>,
    faulted: bool,
}

impl<B: Board> MowerStateMachine<B> {
    /// Wire up the collaborators, the cutter is forced off before anything
    /// else is touched
    pub fn new(parts: BoardParts<B>, config: MowerConfig, seed: u64) -> Self {
        let mut motion = MotionController::new(
            parts.left_wheel,
            parts.right_wheel,
            parts.cutter,
            parts.heading,
            &config,
            seed,
        );
        motion.initialize();

        let boundary = BoundarySensor::new(parts.signal, parts.coils, &config.boundary);
        let mut display = parts.display;
        display.initialize();

        Self {
            devices: Devices {
                motion,
                boundary,
                power: parts.power,
                errors: parts.errors,
                display,
                schedule: parts.schedule,
                config,
                snapshot: BoundarySnapshot::new(BoundaryClassification::Unknown, BoundaryClassification::Unknown),
                fault: None,
                last_error: None,
            },
            console: parts.console,
            state: MowerState::Idle,
            context: StateContext::Idle,
            lift: None,
            no_signal_since: None,
            boundary_lost_reported: false,
            last_display: None,
            faulted: false,
        }
    }

    /// Leave Idle for Charging when docked, Mowing otherwise
    pub fn start(&mut self, now: Instant) {
        self.devices.power.reset_voltage();
        let initial = if self.devices.power.is_being_charged() {
            MowerState::Charging
        } else {
            MowerState::Mowing
        };
        log_info!("starting in {:?}, battery {}V", initial, self.devices.power.voltage());
        self.enter(initial, now);
    }

    pub fn state(&self) -> MowerState {
        self.state
    }

    pub fn context(&self) -> &StateContext {
        &self.context
    }

    /// Switch state from outside the control loop, e.g. to Idle
    pub fn request_state(&mut self, state: MowerState, now: Instant) {
        log_info!("state {:?} requested", state);
        self.enter(state, now);
    }

    pub fn fault(&self) -> Option<ErrorCode> {
        self.devices.fault
    }

    pub fn clear_fault(&mut self) {
        self.devices.clear_fault();
    }

    pub fn last_error(&self) -> Option<ErrorCode> {
        self.devices.last_error
    }

    pub fn current_maneuver(&self) -> Option<ManeuverKind> {
        self.devices.motion.current_maneuver()
    }

    pub fn snapshot(&self) -> BoundarySnapshot {
        self.devices.snapshot
    }

    fn enter(&mut self, next: MowerState, now: Instant) {
        if next != self.state {
            log_info!("{:?} -> {:?}", self.state, next);
        }
        let motion = &mut self.devices.motion;
        motion.abort();
        if self.state == MowerState::Docking {
            motion.set_docking_mode(false);
        }

        match next {
            MowerState::Idle | MowerState::Launching | MowerState::LookingForBoundary => {
                motion.stop();
                motion.stop_cutter();
            }
            MowerState::Mowing => {
                motion.stop();
                motion.compass_mut().set_new_target_heading();
            }
            MowerState::Docking => {
                motion.stop();
                motion.stop_cutter();
                motion.set_docking_mode(true);
            }
            MowerState::Charging | MowerState::SetupDebug => motion.hard_stop(),
        }

        self.state = next;
        self.context = StateContext::enter(next, now);
        self.lift = None;
    }

    /// One control cycle
    pub fn cycle(&mut self, now: Instant) {
        // Sensors, the only reads of this cycle
        self.devices.motion.compass_mut().update();
        self.devices.power.update_voltage();
        self.devices.boundary.poll(now);
        self.devices.snapshot = self.devices.boundary.snapshot(now);

        if self.devices.motion.compass().has_flipped() {
            if self.devices.fault != Some(ErrorCode::Tilt) {
                self.devices.flag(ErrorCode::Tilt);
            }
            self.devices.motion.hard_stop();
            self.finish(now);
            return;
        }

        if self.handle_lift(now) {
            self.finish(now);
            return;
        }

        self.poll_console(now);
        if self.state == MowerState::SetupDebug {
            self.finish(now);
            return;
        }
        if self.devices.fault.is_some() {
            self.devices.motion.hard_stop();
            self.faulted = true;
            self.finish(now);
            return;
        }
        if self.faulted {
            // Fault cleared, start the state over
            self.faulted = false;
            self.enter(self.state, now);
        }

        if let Some(next) = self.check_boundary_lost(now) {
            self.enter(next, now);
            self.finish(now);
            return;
        }

        let next = match &mut self.context {
            StateContext::Mowing(ctx) => mowing::run(ctx, &mut self.devices, now),
            StateContext::LookingForBoundary(ctx) => searching::run(ctx, &mut self.devices, now),
            StateContext::Docking(ctx) => docking::run(ctx, &mut self.devices, now),
            StateContext::Charging(ctx) => charging::run(ctx, &mut self.devices, now),
            StateContext::Launching(ctx) => launching::run(ctx, &mut self.devices, now),
            StateContext::Idle | StateContext::SetupDebug => None,
        };
        if let Some(next) = next {
            self.enter(next, now);
        }

        self.finish(now);
    }

    fn finish(&mut self, now: Instant) {
        self.devices.motion.tick(now);
        self.refresh_display(now);
    }

    /// True while lift recovery owns the wheels
    fn handle_lift(&mut self, now: Instant) -> bool {
        let driving = matches!(
            self.state,
            MowerState::Mowing | MowerState::Launching | MowerState::Docking | MowerState::LookingForBoundary
        );
        let lifted = self.devices.motion.compass().is_lifted();

        let Some(phase) = self.lift else {
            if driving && lifted && self.devices.fault.is_none() {
                log_warn!("lifted in {:?}, backing off", self.state);
                self.devices.motion.hard_stop();
                self.devices.motion.lift_back_off(now);
                self.lift = Some(LiftRecovery::BackingOff);
                return true;
            }
            return false;
        };

        let motion = &mut self.devices.motion;
        match phase {
            LiftRecovery::BackingOff => {
                if motion.poll(now, &self.devices.snapshot) == ManeuverStatus::Running {
                    return true;
                }
                if lifted {
                    self.devices.flag(ErrorCode::Lift);
                    self.devices.motion.hard_stop();
                    self.lift = Some(LiftRecovery::Holding);
                } else {
                    motion.turn_random(now);
                    self.lift = Some(LiftRecovery::Turning);
                }
                true
            }
            LiftRecovery::Holding => {
                if !lifted {
                    log_info!("lift cleared");
                    motion.turn_random(now);
                    self.lift = Some(LiftRecovery::Turning);
                }
                true
            }
            LiftRecovery::Turning => {
                if motion.poll(now, &self.devices.snapshot) == ManeuverStatus::Running {
                    return true;
                }
                // Resume the interrupted state from scratch
                self.enter(self.state, now);
                false
            }
        }
    }

    fn poll_console(&mut self, now: Instant) {
        let requested = self.console.try_enter_setup_debug_mode(self.state);
        if requested != self.state {
            self.enter(requested, now);
        }
        if self.state == MowerState::SetupDebug {
            if let Some(next) = self.console.service(&mut self.devices) {
                self.enter(next, now);
            }
        }
    }

    fn check_boundary_lost(&mut self, now: Instant) -> Option<MowerState> {
        if !self.devices.snapshot.no_signal() {
            self.no_signal_since = None;
            self.boundary_lost_reported = false;
            return None;
        }
        let since = *self.no_signal_since.get_or_insert(now);
        if now.saturating_duration_since(since) < self.devices.config.boundary.boundary_lost_timeout
            || self.boundary_lost_reported
        {
            return None;
        }
        match self.state {
            MowerState::Mowing | MowerState::Docking => {
                self.boundary_lost_reported = true;
                self.devices.flag(ErrorCode::BoundaryLost);
                Some(MowerState::LookingForBoundary)
            }
            MowerState::LookingForBoundary => {
                self.boundary_lost_reported = true;
                self.devices.flag(ErrorCode::BoundaryLost);
                None
            }
            _ => None,
        }
    }

    fn refresh_display(&mut self, now: Instant) {
        let period = self.devices.config.timing.display_period;
        if self
            .last_display
            .is_some_and(|last| now.saturating_duration_since(last) < period)
        {
            return;
        }
        self.last_display = Some(now);

        let devices = &mut self.devices;
        let display = &mut devices.display;
        display.clear();

        let mut line: String<32> = String::new();
        let _ = write!(line, "{} {:.1}V", self.state.name(), devices.power.voltage());
        display.print(&line);

        line.clear();
        let _ = write!(
            line,
            "L{:+} R{:+}",
            devices.boundary.signal(BoundaryOrientation::Left),
            devices.boundary.signal(BoundaryOrientation::Right)
        );
        display.print(&line);

        if let Some(code) = devices.fault.or(devices.last_error) {
            line.clear();
            let _ = write!(line, "err {}", code.as_str());
            display.print(&line);
        }
        display.update();
    }
}
