//! Charging: sit on the contacts, nudge back onto them when contact is
//! lost, launch once full and it is time to cut

use embassy_time::Instant;

use super::Devices;
use crate::board::Board;
use crate::motion::ManeuverStatus;
use crate::power::PowerSource;
use crate::state::MowerState;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChargingContext {
    /// Last cycle the contacts were closed, or the end of the last nudge
    pub last_contact: Instant,
    /// Nudges in a row that did not bring the contact back
    pub failed_nudges: u8,
    pub nudging: bool,
}

impl ChargingContext {
    pub fn new(now: Instant) -> Self {
        Self {
            last_contact: now,
            failed_nudges: 0,
            nudging: false,
        }
    }
}

pub(super) fn run<B: Board>(ctx: &mut ChargingContext, dev: &mut Devices<B>, now: Instant) -> Option<MowerState> {
    if ctx.nudging {
        if dev.motion.poll(now, &dev.snapshot) == ManeuverStatus::Running {
            return None;
        }
        ctx.nudging = false;
        ctx.last_contact = now;
        dev.motion.hard_stop();
    }

    if dev.power.is_being_charged() {
        ctx.last_contact = now;
        ctx.failed_nudges = 0;
    } else if now.saturating_duration_since(ctx.last_contact) > dev.config.timing.contact_lost_timeout {
        if ctx.failed_nudges >= dev.config.timing.max_failed_nudges {
            log_warn!("no charging contact after {} nudges", ctx.failed_nudges);
            return Some(MowerState::LookingForBoundary);
        }
        ctx.failed_nudges += 1;
        log_info!("charging contact lost, nudge {}", ctx.failed_nudges);
        dev.motion.nudge(now);
        ctx.nudging = true;
        return None;
    }

    if dev.power.is_fully_charged() && dev.time_to_cut() && !dev.snapshot.no_signal() {
        log_info!("charged to {}V, launching", dev.power.voltage());
        return Some(MowerState::Launching);
    }
    None
}
