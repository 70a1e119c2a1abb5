//! Looking for the boundary: drive around with the cutter off until the
//! left coil crosses the wire, then start docking

use embassy_time::Instant;

use super::Devices;
use crate::board::Board;
use crate::boundary::BoundaryOrientation;
use crate::error::ErrorCode;
use crate::motion::{ManeuverError, ManeuverStatus};
use crate::state::MowerState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SearchPhase {
    Cruising,
    Turning,
    AvoidingObstacle { retried: bool },
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SearchContext {
    pub time_at_turning: Instant,
    pub phase: SearchPhase,
}

impl SearchContext {
    pub fn new(now: Instant) -> Self {
        Self {
            time_at_turning: now,
            phase: SearchPhase::Cruising,
        }
    }
}

pub(super) fn run<B: Board>(ctx: &mut SearchContext, dev: &mut Devices<B>, now: Instant) -> Option<MowerState> {
    if dev.snapshot.is_outside(BoundaryOrientation::Left) {
        log_info!("wire found");
        return Some(MowerState::Docking);
    }

    dev.motion.stop_cutter();

    if ctx.phase != SearchPhase::Cruising {
        let status = dev.motion.poll(now, &dev.snapshot);
        match (ctx.phase, status) {
            (_, ManeuverStatus::Running) => {}
            (SearchPhase::Turning, ManeuverStatus::Failed(ManeuverError::WheelOverload))
            | (SearchPhase::AvoidingObstacle { retried: false }, ManeuverStatus::Failed(_)) => {
                let retried = matches!(ctx.phase, SearchPhase::AvoidingObstacle { .. });
                dev.motion.escape_obstacle(now);
                ctx.phase = SearchPhase::AvoidingObstacle { retried };
            }
            (SearchPhase::AvoidingObstacle { retried: true }, ManeuverStatus::Failed(_)) => {
                dev.flag(ErrorCode::WheelOverload);
                ctx.phase = SearchPhase::Cruising;
            }
            _ => {
                dev.motion.compass_mut().set_new_target_heading();
                ctx.time_at_turning = now;
                ctx.phase = SearchPhase::Cruising;
            }
        }
        return None;
    }

    if dev.motion.turn_if_obstacle(now) {
        ctx.phase = SearchPhase::AvoidingObstacle { retried: false };
        return None;
    }

    if now.saturating_duration_since(ctx.time_at_turning) >= dev.config.timing.turn_interval {
        dev.motion.turn_random(now);
        ctx.phase = SearchPhase::Turning;
        return None;
    }

    dev.motion.cruise(now);
    None
}
