use embassy_time::Instant;

use super::{MowerStateMachine, StateContext};
use crate::boundary::BoundaryClassification::{self, Inside, Outside, Unknown};
use crate::error::ErrorCode;
use crate::motion::ManeuverKind;
use crate::state::MowerState;
use crate::testing::{mower, MockBoard, Rig};

const CYCLE_MS: u64 = 20;

fn ms(value: u64) -> Instant {
    Instant::from_millis(value)
}

/// State machine driven at a fixed cycle with fresh boundary codes every cycle
struct Sim {
    mower: MowerStateMachine<MockBoard>,
    rig: Rig,
    t: u64,
    left: BoundaryClassification,
    right: BoundaryClassification,
}

impl Sim {
    fn new() -> Self {
        let (mower, rig) = mower();
        Self {
            mower,
            rig,
            t: 0,
            left: Inside,
            right: Inside,
        }
    }

    fn started() -> Self {
        let mut sim = Self::new();
        sim.mower.start(ms(0));
        sim
    }

    fn in_state(state: MowerState) -> Self {
        let mut sim = Self::started();
        sim.mower.request_state(state, ms(0));
        sim
    }

    fn coils(&mut self, left: BoundaryClassification, right: BoundaryClassification) {
        self.left = left;
        self.right = right;
    }

    fn step(&mut self) {
        self.t += CYCLE_MS;
        if self.left != Unknown || self.right != Unknown {
            self.rig.boundary(self.left, self.right, self.t);
        }
        self.mower.cycle(ms(self.t));
    }

    fn run_for(&mut self, duration_ms: u64) {
        let end = self.t + duration_ms;
        while self.t < end {
            self.step();
        }
    }

    /// Step until `done` holds, false when `limit_ms` ran out first
    fn run_until(&mut self, limit_ms: u64, mut done: impl FnMut(&Self) -> bool) -> bool {
        let end = self.t + limit_ms;
        while self.t < end {
            self.step();
            if done(self) {
                return true;
            }
        }
        false
    }

    fn state(&self) -> MowerState {
        self.mower.state()
    }

    fn maneuver(&self) -> Option<ManeuverKind> {
        self.mower.current_maneuver()
    }

    fn all_outputs_zero(&self) -> bool {
        self.rig.left.borrow().last() == 0
            && self.rig.right.borrow().last() == 0
            && self.rig.cutter.borrow().last() == 0
    }
}

#[test]
fn stays_idle_until_started() {
    let mut sim = Sim::new();
    sim.run_for(1_000);

    assert_eq!(sim.state(), MowerState::Idle);
    assert!(sim.rig.left.borrow().outputs.iter().all(|&o| o == 0));
    assert!(sim.rig.cutter.borrow().outputs.iter().all(|&o| o == 0));
}

#[test]
fn start_picks_charging_when_docked() {
    let mut sim = Sim::new();
    sim.rig.power.borrow_mut().charging = true;
    sim.mower.start(ms(0));
    assert_eq!(sim.state(), MowerState::Charging);

    let mut sim = Sim::new();
    sim.mower.start(ms(0));
    assert_eq!(sim.state(), MowerState::Mowing);
    assert_eq!(sim.rig.power.borrow().resets, 1);
}

#[test]
fn mowing_runs_cutter_and_drives_forward() {
    let mut sim = Sim::started();
    sim.run_for(500);

    assert_eq!(sim.state(), MowerState::Mowing);
    assert!(sim.rig.cutter.borrow().last() > 0);
    assert!(sim.rig.left.borrow().last() > 0);
    assert!(sim.rig.right.borrow().last() > 0);
}

#[test]
fn low_battery_stops_cutter_in_the_same_cycle() {
    let mut sim = Sim::started();
    sim.run_for(500);
    assert!(sim.rig.cutter.borrow().last() > 0);

    sim.rig.power.borrow_mut().must_charge = true;
    sim.step();

    assert_eq!(sim.state(), MowerState::LookingForBoundary);
    assert_eq!(sim.rig.cutter.borrow().last(), 0);
}

#[test]
fn wire_found_while_searching_starts_docking_without_driving_on() {
    let mut sim = Sim::in_state(MowerState::LookingForBoundary);
    sim.run_for(800);
    let before = sim.rig.left.borrow().last();
    let written = sim.rig.left.borrow().outputs.len();
    assert!(before > 0);

    sim.coils(Outside, Inside);
    sim.step();

    assert_eq!(sim.state(), MowerState::Docking);
    let left = sim.rig.left.borrow();
    assert!(left.outputs[written..].iter().all(|&o| o < before));
}

#[test]
fn charging_contact_while_docking_stops_everything() {
    let mut sim = Sim::in_state(MowerState::Docking);
    sim.coils(Outside, Inside);
    sim.run_for(500);
    assert!(sim.rig.left.borrow().last() > 0);

    sim.rig.power.borrow_mut().charging = true;
    sim.step();

    assert_eq!(sim.state(), MowerState::Charging);
    assert!(sim.all_outputs_zero());
}

#[test]
fn docking_follows_the_wire_with_the_left_coil() {
    let mut sim = Sim::in_state(MowerState::Docking);
    sim.coils(Outside, Inside);
    sim.run_for(300);
    assert!(sim.rig.left.borrow().last() > sim.rig.right.borrow().last());

    sim.coils(Inside, Inside);
    sim.run_for(300);
    assert!(sim.rig.left.borrow().last() < sim.rig.right.borrow().last());
}

#[test]
fn third_docking_collision_drives_around_the_obstacle() {
    let mut sim = Sim::in_state(MowerState::Docking);
    sim.coils(Outside, Inside);
    sim.rig.left.borrow_mut().current = 3_000;

    let mut reverses = 0;
    let mut previous = None;
    let escaped = sim.run_until(8_000, |sim| {
        let current = sim.maneuver();
        if current == Some(ManeuverKind::Reverse) && previous != current {
            reverses += 1;
        }
        previous = current;
        current == Some(ManeuverKind::DockingEscape)
    });

    assert!(escaped);
    assert_eq!(reverses, 2);
    match sim.mower.context() {
        StateContext::Docking(ctx) => assert_eq!(ctx.collision_count, 0),
        other => panic!("unexpected context {:?}", other),
    }
}

#[test]
fn losing_the_wire_while_docking_goes_searching() {
    let mut sim = Sim::in_state(MowerState::Docking);
    sim.coils(Inside, Inside);

    assert!(sim.run_until(11_000, |sim| sim.state() == MowerState::LookingForBoundary));
    assert!(sim.t > 10_000);
    assert!(sim.rig.flagged().is_empty());
}

#[test]
fn tilt_stops_everything_and_is_flagged_first() {
    let mut sim = Sim::started();
    sim.run_for(500);

    sim.rig.heading.borrow_mut().flipped = true;
    sim.step();

    assert!(sim.all_outputs_zero());
    assert_eq!(sim.rig.flagged(), vec![ErrorCode::Tilt]);
    assert_eq!(sim.mower.fault(), Some(ErrorCode::Tilt));

    sim.run_for(1_000);
    assert!(sim.all_outputs_zero());
    assert_eq!(sim.rig.flagged().len(), 1);
}

#[test]
fn tilt_fault_holds_until_cleared_from_the_console() {
    let mut sim = Sim::started();
    sim.run_for(200);
    sim.rig.heading.borrow_mut().flipped = true;
    sim.step();
    sim.rig.heading.borrow_mut().flipped = false;
    sim.run_for(500);
    assert!(sim.all_outputs_zero());

    sim.rig.io.push("DE");
    sim.step();
    assert_eq!(sim.state(), MowerState::SetupDebug);
    assert_eq!(sim.mower.fault(), None);
    assert!(sim.rig.io.output().contains("cleared tilt"));

    sim.rig.io.push("Q");
    sim.run_for(500);
    assert_eq!(sim.state(), MowerState::Mowing);
    assert!(sim.rig.left.borrow().last() > 0);
}

#[test]
fn console_toggles_wheels_and_returns_to_previous_state() {
    let mut sim = Sim::started();
    sim.run_for(300);

    sim.rig.io.push("d");
    sim.step();
    assert_eq!(sim.state(), MowerState::SetupDebug);
    assert!(sim.all_outputs_zero());

    sim.rig.io.push("L");
    sim.run_for(200);
    assert!(sim.rig.left.borrow().last() > 0);
    assert_eq!(sim.rig.right.borrow().last(), 0);

    sim.rig.io.push("q");
    sim.step();
    assert_eq!(sim.state(), MowerState::Mowing);
}

#[test]
fn both_coils_outside_backs_up_until_left_is_inside() {
    let mut sim = Sim::started();
    sim.run_for(200);

    sim.coils(Outside, Outside);
    sim.step();
    assert_eq!(sim.maneuver(), Some(ManeuverKind::BackUntilInside));
    sim.run_for(400);
    assert!(sim.rig.left.borrow().last() < 0);

    sim.coils(Inside, Outside);
    sim.step();
    assert_ne!(sim.maneuver(), Some(ManeuverKind::BackUntilInside));
    assert!(sim.rig.flagged().is_empty());
}

#[test]
fn backing_up_off_the_wire_turns_away_before_cruising() {
    let mut sim = Sim::started();
    sim.run_for(200);

    for _ in 0..3 {
        sim.coils(Outside, Outside);
        sim.step();
        assert_eq!(sim.maneuver(), Some(ManeuverKind::BackUntilInside));
        sim.run_for(200);

        sim.coils(Inside, Inside);
        sim.step();
        assert_eq!(sim.maneuver(), Some(ManeuverKind::Turn));
        assert!(sim.run_until(3_000, |sim| sim.maneuver().is_none()));
    }
    assert_eq!(sim.state(), MowerState::Mowing);
    assert!(sim.rig.flagged().is_empty());
}

#[test]
fn left_coil_outside_escapes_to_the_right() {
    let mut sim = Sim::started();
    sim.run_for(200);

    sim.coils(Outside, Inside);
    sim.step();
    assert_eq!(sim.maneuver(), Some(ManeuverKind::BoundaryEscape));

    sim.coils(Inside, Inside);
    assert!(sim.run_until(3_000, |sim| sim.maneuver().is_none()));
    assert_eq!(sim.state(), MowerState::Mowing);
    assert!(sim.rig.flagged().is_empty());
}

#[test]
fn persistent_stall_is_fatal_after_the_retry() {
    let mut sim = Sim::started();
    sim.run_for(200);
    sim.rig.right.borrow_mut().current = 3_000;

    assert!(sim.run_until(1_000, |sim| sim.maneuver() == Some(ManeuverKind::ObstacleEscape)));
    assert!(sim.run_until(10_000, |sim| sim.mower.fault().is_some()));

    assert_eq!(sim.mower.fault(), Some(ErrorCode::WheelOverload));
    assert_eq!(sim.rig.flagged(), vec![ErrorCode::WheelOverload]);
    assert!(sim.all_outputs_zero());
}

#[test]
fn cutter_overload_stops_the_blade_and_backs_away() {
    let mut sim = Sim::started();
    sim.run_for(200);
    sim.rig.cutter.borrow_mut().current = 5_000;

    assert!(sim.run_until(2_000, |sim| !sim.rig.flagged().is_empty()));

    assert_eq!(sim.rig.flagged(), vec![ErrorCode::CutterOverload]);
    assert_eq!(sim.rig.cutter.borrow().last(), 0);
    assert_eq!(sim.maneuver(), Some(ManeuverKind::ObstacleEscape));
    assert_eq!(sim.mower.fault(), None);
}

#[test]
fn boundary_lost_while_mowing_goes_searching_and_flags_once() {
    let mut sim = Sim::started();
    sim.coils(Unknown, Unknown);

    assert!(sim.run_until(6_000, |sim| sim.state() == MowerState::LookingForBoundary));
    assert!(sim.t >= 5_000);
    assert_eq!(sim.rig.flagged(), vec![ErrorCode::BoundaryLost]);

    sim.run_for(6_000);
    assert_eq!(sim.state(), MowerState::LookingForBoundary);
    assert_eq!(sim.rig.flagged(), vec![ErrorCode::BoundaryLost]);
}

#[test]
fn lift_backs_off_and_resumes_once_cleared() {
    let mut sim = Sim::started();
    sim.run_for(300);

    sim.rig.heading.borrow_mut().lifted = true;
    sim.step();
    assert_eq!(sim.maneuver(), Some(ManeuverKind::LiftBackOff));
    assert_eq!(sim.rig.cutter.borrow().last(), 0);

    assert!(sim.run_until(2_000, |sim| !sim.rig.flagged().is_empty()));
    assert_eq!(sim.rig.flagged(), vec![ErrorCode::Lift]);
    sim.run_for(500);
    assert!(sim.all_outputs_zero());

    sim.rig.heading.borrow_mut().lifted = false;
    sim.step();
    assert_eq!(sim.maneuver(), Some(ManeuverKind::Turn));
    assert!(sim.run_until(3_000, |sim| sim.maneuver().is_none()));

    // Wheels ramp out of the pivot before driving on
    assert!(sim.run_until(2_000, |sim| sim.rig.left.borrow().last() > 0));
    assert_eq!(sim.state(), MowerState::Mowing);
}

#[test]
fn short_lift_is_not_flagged() {
    let mut sim = Sim::started();
    sim.run_for(300);

    sim.rig.heading.borrow_mut().lifted = true;
    sim.step();
    sim.rig.heading.borrow_mut().lifted = false;
    sim.run_for(3_000);

    assert!(sim.rig.flagged().is_empty());
    assert_eq!(sim.state(), MowerState::Mowing);
}

#[test]
fn lost_charging_contact_gives_up_after_three_nudges() {
    let mut sim = Sim::new();
    sim.rig.power.borrow_mut().charging = true;
    sim.mower.start(ms(0));
    sim.run_for(1_000);
    sim.rig.power.borrow_mut().charging = false;

    let mut nudges = 0;
    let mut previous = None;
    let gave_up = sim.run_until(120_000, |sim| {
        let current = sim.maneuver();
        if current == Some(ManeuverKind::Nudge) && previous != current {
            nudges += 1;
        }
        previous = current;
        sim.state() == MowerState::LookingForBoundary
    });

    assert!(gave_up);
    assert_eq!(nudges, 3);
    assert!(sim.t > 80_000);
}

#[test]
fn restored_contact_resets_the_nudge_count() {
    let mut sim = Sim::new();
    sim.rig.power.borrow_mut().charging = true;
    sim.mower.start(ms(0));
    sim.rig.power.borrow_mut().charging = false;

    assert!(sim.run_until(25_000, |sim| sim.maneuver() == Some(ManeuverKind::Nudge)));
    sim.rig.power.borrow_mut().charging = true;
    assert!(sim.run_until(5_000, |sim| sim.maneuver().is_none()));
    sim.step();

    match sim.mower.context() {
        StateContext::Charging(ctx) => assert_eq!(ctx.failed_nudges, 0),
        other => panic!("unexpected context {:?}", other),
    }
    assert_eq!(sim.state(), MowerState::Charging);
}

#[test]
fn full_battery_launches_then_mows() {
    let mut sim = Sim::new();
    sim.rig.power.borrow_mut().charging = true;
    sim.mower.start(ms(0));
    sim.run_for(200);
    assert_eq!(sim.state(), MowerState::Charging);

    sim.rig.power.borrow_mut().full = true;
    sim.step();
    assert_eq!(sim.state(), MowerState::Launching);
    sim.rig.power.borrow_mut().charging = false;

    sim.run_for(1_000);
    assert_eq!(sim.maneuver(), Some(ManeuverKind::Launch));
    assert!(sim.rig.left.borrow().last() < 0);

    assert!(sim.run_until(8_000, |sim| sim.state() == MowerState::Mowing));
    assert_eq!(sim.rig.power.borrow().resets, 2);
}

#[test]
fn charged_mower_waits_for_schedule_and_wire() {
    let mut sim = Sim::new();
    {
        let mut power = sim.rig.power.borrow_mut();
        power.charging = true;
        power.full = true;
    }
    *sim.rig.schedule.borrow_mut() = false;
    sim.mower.start(ms(0));
    sim.run_for(2_000);
    assert_eq!(sim.state(), MowerState::Charging);

    // Let the last codes age out before the schedule opens
    sim.coils(Unknown, Unknown);
    sim.run_for(2_500);
    *sim.rig.schedule.borrow_mut() = true;
    sim.run_for(1_000);
    assert_eq!(sim.state(), MowerState::Charging);

    sim.coils(Inside, Inside);
    sim.step();
    assert_eq!(sim.state(), MowerState::Launching);
}

#[test]
fn request_idle_stops_motors() {
    let mut sim = Sim::started();
    sim.run_for(500);

    sim.mower.request_state(MowerState::Idle, ms(sim.t));
    assert_eq!(sim.rig.cutter.borrow().last(), 0);
    sim.run_for(1_000);

    assert_eq!(sim.state(), MowerState::Idle);
    assert!(sim.all_outputs_zero());
}

#[test]
fn display_shows_state_voltage_and_last_error() {
    let mut sim = Sim::new();
    sim.step();
    assert_eq!(sim.rig.display.borrow()[0], "IDLE 12.6V");

    sim.mower.start(ms(sim.t));
    sim.rig.heading.borrow_mut().flipped = true;
    sim.run_for(5_000);

    let lines = sim.rig.display.borrow();
    assert_eq!(lines[0], "MOWING 12.6V");
    assert_eq!(lines[1], "L+10 R+10");
    assert_eq!(lines[2], "err tilt");
}
