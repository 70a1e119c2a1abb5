//! Mowing: cut in straight lines, turn away from the wire and obstacles

use embassy_time::Instant;

use super::Devices;
use crate::board::Board;
use crate::boundary::BoundaryOrientation;
use crate::error::ErrorCode;
use crate::motion::{ManeuverError, ManeuverStatus, TurnDirection};
use crate::power::PowerSource;
use crate::state::MowerState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MowingPhase {
    Cruising,
    /// Both coils outside, reversing until the left one is back in
    BackingUp,
    /// Backing off the wire and turning away from it
    Escaping { direction: TurnDirection, retried: bool },
    AvoidingObstacle { retried: bool },
    /// Periodic random turn
    Turning,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MowingContext {
    pub time_at_turning: Instant,
    pub phase: MowingPhase,
}

impl MowingContext {
    pub fn new(now: Instant) -> Self {
        Self {
            time_at_turning: now,
            phase: MowingPhase::Cruising,
        }
    }

    /// Fresh heading and turn timer after any turn
    fn resume<B: Board>(&mut self, dev: &mut Devices<B>, now: Instant) {
        dev.motion.compass_mut().set_new_target_heading();
        self.time_at_turning = now;
        self.phase = MowingPhase::Cruising;
    }
}

pub(super) fn run<B: Board>(ctx: &mut MowingContext, dev: &mut Devices<B>, now: Instant) -> Option<MowerState> {
    if dev.power.must_charge() {
        log_info!("battery low ({}V), heading home", dev.power.voltage());
        return Some(MowerState::LookingForBoundary);
    }

    if ctx.phase != MowingPhase::Cruising {
        let status = dev.motion.poll(now, &dev.snapshot);
        if status == ManeuverStatus::Running {
            return None;
        }
        maneuver_finished(ctx, dev, status, now);
        return None;
    }

    let snapshot = dev.snapshot;
    if snapshot.both_outside() {
        log_info!("both coils outside, backing up");
        dev.motion.go_backward_until_inside(BoundaryOrientation::Left, now);
        ctx.phase = MowingPhase::BackingUp;
        return None;
    }
    if snapshot.is_outside(BoundaryOrientation::Left) {
        dev.motion.escape_boundary(TurnDirection::Right, now);
        ctx.phase = MowingPhase::Escaping {
            direction: TurnDirection::Right,
            retried: false,
        };
        return None;
    }
    if snapshot.is_outside(BoundaryOrientation::Right) {
        dev.motion.escape_boundary(TurnDirection::Left, now);
        ctx.phase = MowingPhase::Escaping {
            direction: TurnDirection::Left,
            retried: false,
        };
        return None;
    }

    if dev.motion.cutter().is_overloaded() {
        dev.flag(ErrorCode::CutterOverload);
        dev.motion.stop_cutter();
        dev.motion.escape_obstacle(now);
        ctx.phase = MowingPhase::AvoidingObstacle { retried: false };
        return None;
    }
    if dev.motion.turn_if_obstacle(now) {
        ctx.phase = MowingPhase::AvoidingObstacle { retried: false };
        return None;
    }

    if now.saturating_duration_since(ctx.time_at_turning) >= dev.config.timing.turn_interval {
        dev.motion.turn_random(now);
        ctx.phase = MowingPhase::Turning;
        return None;
    }

    dev.motion.start_cutter();
    dev.motion.cruise(now);
    None
}

fn maneuver_finished<B: Board>(ctx: &mut MowingContext, dev: &mut Devices<B>, status: ManeuverStatus, now: Instant) {
    let failure = match status {
        ManeuverStatus::Failed(error) => Some(error),
        _ => None,
    };

    match (ctx.phase, failure) {
        (MowingPhase::BackingUp, None) => {
            // Still facing the wire, turn away before cruising again
            dev.motion.turn_random(now);
            ctx.phase = MowingPhase::Turning;
        }
        (_, None) => ctx.resume(dev, now),
        (MowingPhase::BackingUp, Some(_)) => {
            dev.flag(ErrorCode::BoundaryLost);
            dev.motion.turn_random(now);
            ctx.phase = MowingPhase::Turning;
        }
        (MowingPhase::Escaping { direction, retried: false }, Some(error)) => {
            log_info!("release turn failed ({:?}), retrying", error);
            dev.motion.escape_boundary(direction, now);
            ctx.phase = MowingPhase::Escaping {
                direction,
                retried: true,
            };
        }
        (MowingPhase::Escaping { retried: true, .. }, Some(_)) => {
            dev.flag(ErrorCode::ManeuverFailed);
            ctx.resume(dev, now);
        }
        (MowingPhase::AvoidingObstacle { retried: false }, Some(_)) => {
            dev.motion.escape_obstacle(now);
            ctx.phase = MowingPhase::AvoidingObstacle { retried: true };
        }
        (MowingPhase::AvoidingObstacle { retried: true }, Some(_)) => {
            dev.flag(ErrorCode::WheelOverload);
            ctx.resume(dev, now);
        }
        (MowingPhase::Turning, Some(ManeuverError::WheelOverload)) => {
            dev.motion.escape_obstacle(now);
            ctx.phase = MowingPhase::AvoidingObstacle { retried: false };
        }
        (MowingPhase::Turning | MowingPhase::Cruising, Some(_)) => ctx.resume(dev, now),
    }
}
