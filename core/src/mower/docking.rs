//! Docking: follow the wire with the left coil until the charging contacts
//! close
//!
//! Collisions while docking are usually the charging station itself or
//! something parked on the wire. The first ones only get a short back off,
//! after `collision_limit` collisions within the quiet window the mower
//! drives around the obstacle instead.

use embassy_time::{Duration, Instant};

use super::Devices;
use crate::board::Board;
use crate::boundary::BoundaryOrientation;
use crate::motion::{ManeuverStatus, TurnDirection};
use crate::power::PowerSource;
use crate::state::MowerState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DockingPhase {
    Tracking,
    /// Short reverse after a collision
    BackingOff,
    /// Driving around an obstacle on the wire
    Escaping,
    /// Right coil found outside, turning back in
    Correcting,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DockingContext {
    pub last_collision: Option<Instant>,
    pub collision_count: u8,
    /// Last time the left coil was outside, i.e. on the wire
    pub last_outside: Instant,
    pub last_right_check: Instant,
    pub phase: DockingPhase,
}

impl DockingContext {
    pub fn new(now: Instant) -> Self {
        Self {
            last_collision: None,
            collision_count: 0,
            last_outside: now,
            last_right_check: now,
            phase: DockingPhase::Tracking,
        }
    }

    /// Count a collision, true when it is time to escape around the obstacle
    pub fn register_collision(&mut self, now: Instant, quiet_window: Duration, limit: u8) -> bool {
        if self
            .last_collision
            .is_some_and(|last| now.saturating_duration_since(last) > quiet_window)
        {
            self.collision_count = 0;
        }
        self.last_collision = Some(now);
        self.collision_count += 1;

        if self.collision_count >= limit {
            self.collision_count = 0;
            true
        } else {
            false
        }
    }
}

pub(super) fn run<B: Board>(ctx: &mut DockingContext, dev: &mut Devices<B>, now: Instant) -> Option<MowerState> {
    if dev.power.is_being_charged() {
        log_info!("charging contact made");
        return Some(MowerState::Charging);
    }

    let timing = dev.config.timing;
    let snapshot = dev.snapshot;

    if snapshot.is_outside(BoundaryOrientation::Left) {
        ctx.last_outside = now;
    }

    if ctx.phase != DockingPhase::Tracking {
        if dev.motion.poll(now, &snapshot) != ManeuverStatus::Running {
            ctx.phase = DockingPhase::Tracking;
        }
        return None;
    }

    if now.saturating_duration_since(ctx.last_outside) > timing.docking_lost_timeout {
        log_info!("lost the wire while docking");
        return Some(MowerState::LookingForBoundary);
    }

    if dev.motion.wheels_overloaded() {
        if ctx.register_collision(now, timing.collision_quiet_window, timing.collision_limit) {
            log_info!("repeated collisions, driving around");
            dev.motion.docking_escape(now);
            ctx.phase = DockingPhase::Escaping;
        } else {
            log_debug!("collision {} while docking", ctx.collision_count);
            dev.motion.reverse_for(timing.docking_nudge_reverse, now);
            ctx.phase = DockingPhase::BackingOff;
        }
        return None;
    }

    if now.saturating_duration_since(ctx.last_right_check) >= timing.right_check_interval {
        ctx.last_right_check = now;
        if snapshot.is_outside(BoundaryOrientation::Right) {
            dev.motion.correction_turn(TurnDirection::Right, timing.right_correction_angle, now);
            ctx.phase = DockingPhase::Correcting;
            return None;
        }
    }

    dev.motion.track_boundary(snapshot.left);
    None
}
