//! Launching: back off the charging station and turn into the lawn

use embassy_time::Instant;

use super::Devices;
use crate::board::Board;
use crate::error::ErrorCode;
use crate::motion::ManeuverStatus;
use crate::power::PowerSource;
use crate::state::MowerState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LaunchingContext {
    pub started: bool,
}

pub(super) fn run<B: Board>(ctx: &mut LaunchingContext, dev: &mut Devices<B>, now: Instant) -> Option<MowerState> {
    if !ctx.started {
        dev.motion.launch(now);
        ctx.started = true;
        return None;
    }

    match dev.motion.poll(now, &dev.snapshot) {
        ManeuverStatus::Running => None,
        ManeuverStatus::Failed(error) => {
            log_warn!("launch failed: {:?}", error);
            dev.flag(ErrorCode::ManeuverFailed);
            dev.power.reset_voltage();
            Some(MowerState::Mowing)
        }
        ManeuverStatus::Done | ManeuverStatus::Idle => {
            dev.power.reset_voltage();
            dev.motion.compass_mut().set_new_target_heading();
            Some(MowerState::Mowing)
        }
    }
}
