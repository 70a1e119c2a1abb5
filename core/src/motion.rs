//! Maneuvers and speed compensation
//!
//! [`MotionController`] owns both wheels, the cutter and the compass. It
//! offers two kinds of operations:
//!
//! - Continuous driving, re-issued every cycle by the state handlers:
//!   [`MotionController::run_forward_over_time`], the two compensations and
//!   boundary tracking.
//! - Maneuvers, short queues of timed segments started once and then advanced
//!   by [`MotionController::poll`] every cycle. Nothing ever blocks, so the
//!   safety checks keep running while the mower is backing up or turning.
//!
//! A maneuver that cannot complete reports a [`ManeuverError`] and stops.
//! Retrying is up to the caller.
//!
//! # Segments
//! - `Pause` - wheels stopped for a fixed time
//! - `Drive` - fixed wheel speeds for a fixed time
//! - `Pivot` - open loop pivot, duration from the degrees-per-ms calibration
//! - `ReverseUntilInside` - back up until a coil is inside, bounded by a timeout
//! - `Release` - keep pivoting until every coil is inside, bounded by an angle

use embassy_time::{Duration, Instant};
use heapless::Vec;
use nanorand::{Rng, WyRand};

use crate::boundary::{BoundaryClassification, BoundaryOrientation, BoundarySnapshot};
use crate::config::{DriveConfig, MowerConfig, TimingConfig, MAX_SPEED};
use crate::heading::{Compass, HeadingSensor};
use crate::motor::{CutterMotor, MotorOutput, WheelMotor};

/// Longest segment queue of any maneuver
const MAX_SEGMENTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TurnDirection {
    Left,
    Right,
}

impl TurnDirection {
    pub fn opposite(self) -> Self {
        match self {
            TurnDirection::Left => TurnDirection::Right,
            TurnDirection::Right => TurnDirection::Left,
        }
    }

    /// Heading change of a turn, clockwise positive
    fn signed(self, degrees: u16) -> i16 {
        match self {
            TurnDirection::Left => -(degrees as i16),
            TurnDirection::Right => degrees as i16,
        }
    }
}

/// What a maneuver is for, used in logs and by the handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ManeuverKind {
    Turn,
    Reverse,
    BackUntilInside,
    BoundaryEscape,
    ObstacleEscape,
    DockingEscape,
    Correction,
    Nudge,
    Launch,
    LiftBackOff,
}

/// Why a maneuver gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ManeuverError {
    /// Wheels stalled during a pivot
    WheelOverload,
    /// Coils still not inside after the full release angle
    TurnFailed,
    /// Backing up never brought the coil back inside
    BoundaryNotReacquired,
    /// Cancelled from outside
    Aborted,
}

/// Result of advancing the running maneuver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ManeuverStatus {
    /// Nothing running
    Idle,
    Running,
    /// Finished this cycle, reported once
    Done,
    /// Gave up this cycle, reported once
    Failed(ManeuverError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Segment {
    Pause(Duration),
    Drive { left: i8, right: i8, duration: Duration },
    Pivot { direction: TurnDirection, degrees: u16 },
    ReverseUntilInside { orientation: BoundaryOrientation, timeout: Duration },
    Release { direction: TurnDirection, max_degrees: u16 },
}

enum Step {
    Continue,
    Complete,
    Fail(ManeuverError),
}

struct Maneuver {
    kind: ManeuverKind,
    segments: Vec<Segment, MAX_SEGMENTS>,
    index: usize,
    segment_started: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ForwardRamp {
    start_speed: i8,
    end_speed: i8,
    duration: Duration,
    started: Instant,
}

impl ForwardRamp {
    fn speed(&self, now: Instant) -> i8 {
        let elapsed = now.saturating_duration_since(self.started).as_millis();
        let total = self.duration.as_millis();
        if elapsed >= total {
            return self.end_speed;
        }
        let span = self.end_speed as i64 - self.start_speed as i64;
        (self.start_speed as i64 + span * elapsed as i64 / total as i64) as i8
    }
}

/// Forward speed after the cutter load reduction
///
/// Non-increasing in `load`: between the low and high load marks the speed
/// drops linearly down to `min_load_speed_percent` of the input.
pub fn cutter_load_speed(speed: i8, load: u16, drive: &DriveConfig) -> i8 {
    if speed <= 0 || load <= drive.cutter_load_low {
        return speed;
    }
    let span = drive.cutter_load_high.saturating_sub(drive.cutter_load_low).max(1) as i32;
    let excess = ((load - drive.cutter_load_low) as i32).min(span);
    let max_cut = 100 - drive.min_load_speed_percent.min(100) as i32;
    let cut = max_cut * excess / span;
    (speed as i32 * (100 - cut) / 100) as i8
}

/// Left and right wheel speeds correcting a heading error
///
/// Positive `error` means the mower points clockwise of its target, so it
/// steers left. The correction is bounded by both the configured maximum
/// and the speed itself, a wheel is never driven backwards.
pub fn heading_correction(speed: i8, error: i16, drive: &DriveConfig) -> (i8, i8) {
    if speed <= 0 {
        return (speed, speed);
    }
    let limit = (drive.max_heading_correction as i32).min(speed as i32);
    let correction = ((error as f32 * drive.heading_gain) as i32).clamp(-limit, limit);
    let left = (speed as i32 - correction).clamp(0, MAX_SPEED as i32);
    let right = (speed as i32 + correction).clamp(0, MAX_SPEED as i32);
    (left as i8, right as i8)
}

/// Drives the wheels and cutter on behalf of the state handlers
pub struct MotionController<W, C, H> {
    left: WheelMotor<W>,
    right: WheelMotor<W>,
    cutter: CutterMotor<C>,
    compass: Compass<H>,
    rng: WyRand,
    drive: DriveConfig,
    timing: TimingConfig,
    ramp: Option<ForwardRamp>,
    maneuver: Option<Maneuver>,
}

impl<W, C, H> MotionController<W, C, H>
where
    W: MotorOutput,
    C: MotorOutput,
    H: HeadingSensor,
{
    pub fn new(left: W, right: W, cutter: C, heading: H, config: &MowerConfig, seed: u64) -> Self {
        Self {
            left: WheelMotor::new(left, &config.drive),
            right: WheelMotor::new(right, &config.drive),
            cutter: CutterMotor::new(cutter, &config.drive),
            compass: Compass::new(heading),
            rng: WyRand::new_seed(seed),
            drive: config.drive,
            timing: config.timing,
            ramp: None,
            maneuver: None,
        }
    }

    /// Cutter off first, then wheels, then the heading sensor
    pub fn initialize(&mut self) {
        self.cutter.initialize();
        self.left.hard_stop();
        self.right.hard_stop();
        self.compass.initialize();
    }

    pub fn compass(&self) -> &Compass<H> {
        &self.compass
    }

    pub fn compass_mut(&mut self) -> &mut Compass<H> {
        &mut self.compass
    }

    pub fn left_wheel(&self) -> &WheelMotor<W> {
        &self.left
    }

    pub fn right_wheel(&self) -> &WheelMotor<W> {
        &self.right
    }

    pub fn cutter(&self) -> &CutterMotor<C> {
        &self.cutter
    }

    /// Apply ramps and sample currents, once per cycle
    pub fn tick(&mut self, now: Instant) {
        self.left.tick(now);
        self.right.tick(now);
        self.cutter.tick(now);
    }

    pub fn wheels_overloaded(&self) -> bool {
        self.left.is_overloaded() || self.right.is_overloaded()
    }

    pub fn reset_overload(&mut self) {
        self.left.reset_overload();
        self.right.reset_overload();
    }

    /// Faster wheel response while following the wire
    pub fn set_docking_mode(&mut self, docking: bool) {
        let rate = if docking {
            self.drive.docking_ramp_rate
        } else {
            self.drive.ramp_rate
        };
        self.left.set_ramp_rate(rate);
        self.right.set_ramp_rate(rate);
    }

    pub fn start_cutter(&mut self) {
        self.cutter.start();
    }

    pub fn stop_cutter(&mut self) {
        self.cutter.stop();
    }

    /// Ramped stop of both wheels, cancels the forward ramp
    pub fn stop(&mut self) {
        self.ramp = None;
        self.set_targets(0, 0);
    }

    /// Everything off now, any maneuver is dropped
    pub fn hard_stop(&mut self) {
        self.ramp = None;
        self.maneuver = None;
        self.left.hard_stop();
        self.right.hard_stop();
        self.cutter.stop();
    }

    /// Drop the running maneuver and stop the wheels
    pub fn abort(&mut self) -> ManeuverStatus {
        match self.maneuver.take() {
            Some(maneuver) => {
                log_debug!("{:?} aborted", maneuver.kind);
                self.stop();
                ManeuverStatus::Failed(ManeuverError::Aborted)
            }
            None => ManeuverStatus::Idle,
        }
    }

    /// Fixed wheel speeds outside of any ramp or maneuver
    pub fn set_wheels(&mut self, left: i8, right: i8) {
        self.ramp = None;
        self.set_targets(left, right);
    }

    fn set_targets(&mut self, left: i8, right: i8) {
        self.left.set_speed(left);
        self.right.set_speed(right);
    }

    /// Linear ramp from `start_speed` to `end_speed` over `duration`
    ///
    /// Calling it again with the same parameters continues the running ramp
    /// instead of starting over. Both wheels get the ramp speed, which is
    /// also returned so the compensations can refine it.
    pub fn run_forward_over_time(
        &mut self,
        start_speed: i8,
        end_speed: i8,
        duration: Duration,
        now: Instant,
    ) -> i8 {
        let same = self.ramp.is_some_and(|r| {
            r.start_speed == start_speed && r.end_speed == end_speed && r.duration == duration
        });
        if !same {
            self.ramp = Some(ForwardRamp {
                start_speed,
                end_speed,
                duration,
                started: now,
            });
        }
        let speed = self.ramp.map(|r| r.speed(now)).unwrap_or(end_speed);
        self.set_targets(speed, speed);
        speed
    }

    /// Reduce `speed` according to the current cutter load
    pub fn compensate_speed_to_cutter_load(&self, speed: i8) -> i8 {
        cutter_load_speed(speed, self.cutter.get_current(), &self.drive)
    }

    /// Split `speed` into wheel speeds that steer back to the target heading
    pub fn compensate_speed_to_compass_heading(&self, speed: i8) -> (i8, i8) {
        if !self.compass.is_present() {
            return (speed, speed);
        }
        heading_correction(speed, self.compass.heading_error(), &self.drive)
    }

    /// Ramped forward drive with both compensations applied
    pub fn cruise(&mut self, now: Instant) {
        let base = self.run_forward_over_time(
            self.drive.slow_speed,
            self.drive.full_speed,
            self.timing.acceleration_duration,
            now,
        );
        let loaded = self.compensate_speed_to_cutter_load(base);
        let (left, right) = self.compensate_speed_to_compass_heading(loaded);
        self.set_targets(left, right);
    }

    /// Follow the wire with the left coil on it
    pub fn track_boundary(&mut self, left_coil: BoundaryClassification) {
        let (fast, slow) = (self.drive.full_speed, self.drive.slow_speed);
        let (left, right) = match left_coil {
            BoundaryClassification::Outside => (fast, slow),
            BoundaryClassification::Inside => (slow, fast),
            BoundaryClassification::Unknown => (slow, slow),
        };
        self.set_wheels(left, right);
    }

    pub fn is_busy(&self) -> bool {
        self.maneuver.is_some()
    }

    pub fn current_maneuver(&self) -> Option<ManeuverKind> {
        self.maneuver.as_ref().map(|m| m.kind)
    }

    fn begin(&mut self, kind: ManeuverKind, segments: &[Segment], now: Instant) {
        let mut queue = Vec::new();
        for segment in segments.iter().take(MAX_SEGMENTS) {
            let _ = queue.push(*segment);
        }
        log_debug!("{:?} started", kind);
        self.ramp = None;
        self.reset_overload();
        self.maneuver = Some(Maneuver {
            kind,
            segments: queue,
            index: 0,
            segment_started: now,
        });
    }

    fn reverse_segment(&self, duration: Duration) -> Segment {
        let speed = -self.drive.full_speed;
        Segment::Drive {
            left: speed,
            right: speed,
            duration,
        }
    }

    fn random_turn(&mut self) -> (TurnDirection, u16) {
        let min = self.timing.random_turn_min;
        let max = self.timing.random_turn_max.max(min);
        let degrees = self.rng.generate_range(min..=max);
        let direction = if self.rng.generate_range(0_u8..2) == 0 {
            TurnDirection::Left
        } else {
            TurnDirection::Right
        };
        (direction, degrees)
    }

    pub fn turn_left(&mut self, degrees: u16, now: Instant) {
        self.turn(TurnDirection::Left, degrees, now);
    }

    pub fn turn_right(&mut self, degrees: u16, now: Instant) {
        self.turn(TurnDirection::Right, degrees, now);
    }

    pub fn turn(&mut self, direction: TurnDirection, degrees: u16, now: Instant) {
        self.begin(ManeuverKind::Turn, &[Segment::Pivot { direction, degrees }], now);
    }

    /// Pivot a random angle in a random direction
    pub fn turn_random(&mut self, now: Instant) {
        let (direction, degrees) = self.random_turn();
        self.turn(direction, degrees, now);
    }

    /// Turn left away from the wire until every coil is inside again
    pub fn turn_to_release_left(&mut self, degrees: u16, now: Instant) {
        self.turn_to_release(TurnDirection::Left, degrees, now);
    }

    /// Turn right away from the wire until every coil is inside again
    pub fn turn_to_release_right(&mut self, degrees: u16, now: Instant) {
        self.turn_to_release(TurnDirection::Right, degrees, now);
    }

    fn turn_to_release(&mut self, direction: TurnDirection, degrees: u16, now: Instant) {
        let release = Segment::Release {
            direction,
            max_degrees: self.timing.release_max_extra,
        };
        self.begin(
            ManeuverKind::Turn,
            &[Segment::Pivot { direction, degrees }, release],
            now,
        );
    }

    /// Back off the wire, then turn away until released
    pub fn escape_boundary(&mut self, direction: TurnDirection, now: Instant) {
        let segments = [
            self.reverse_segment(self.timing.boundary_reverse),
            Segment::Pivot {
                direction,
                degrees: self.timing.release_angle,
            },
            Segment::Release {
                direction,
                max_degrees: self.timing.release_max_extra,
            },
        ];
        self.begin(ManeuverKind::BoundaryEscape, &segments, now);
    }

    /// Reverse until `orientation` reads inside, for at most the configured timeout
    pub fn go_backward_until_inside(&mut self, orientation: BoundaryOrientation, now: Instant) {
        let segment = Segment::ReverseUntilInside {
            orientation,
            timeout: self.timing.go_backward_timeout,
        };
        self.begin(ManeuverKind::BackUntilInside, &[segment], now);
    }

    pub fn reverse_for(&mut self, duration: Duration, now: Instant) {
        let segment = self.reverse_segment(duration);
        self.begin(ManeuverKind::Reverse, &[segment], now);
    }

    /// Stop, back away and turn somewhere random
    pub fn escape_obstacle(&mut self, now: Instant) {
        let (direction, degrees) = self.random_turn();
        let segments = [
            Segment::Pause(self.timing.obstacle_pause),
            self.reverse_segment(self.timing.obstacle_reverse),
            Segment::Pivot { direction, degrees },
        ];
        self.begin(ManeuverKind::ObstacleEscape, &segments, now);
    }

    /// Start an obstacle escape when a wheel is overloaded
    ///
    /// Returns true when the escape was started. The caller re-arms its turn
    /// timer and takes a new target heading once it completes.
    pub fn turn_if_obstacle(&mut self, now: Instant) -> bool {
        if self.is_busy() || !self.wheels_overloaded() {
            return false;
        }
        log_info!(
            "obstacle, wheel current {} / {}",
            self.left.get_current(),
            self.right.get_current()
        );
        self.escape_obstacle(now);
        true
    }

    /// Drive around something blocking the wire, then head back toward it
    pub fn docking_escape(&mut self, now: Instant) {
        let angle = self.timing.docking_escape_angle;
        let forward = self.drive.full_speed;
        let segments = [
            self.reverse_segment(self.timing.docking_nudge_reverse),
            Segment::Pivot {
                direction: TurnDirection::Right,
                degrees: angle,
            },
            Segment::Drive {
                left: forward,
                right: forward,
                duration: self.timing.docking_escape_forward,
            },
            Segment::Pivot {
                direction: TurnDirection::Left,
                degrees: angle,
            },
        ];
        self.begin(ManeuverKind::DockingEscape, &segments, now);
    }

    /// Short back off and a small turn
    pub fn correction_turn(&mut self, direction: TurnDirection, degrees: u16, now: Instant) {
        let segments = [
            Segment::Pause(self.timing.obstacle_pause),
            self.reverse_segment(self.timing.docking_nudge_reverse),
            Segment::Pivot { direction, degrees },
        ];
        self.begin(ManeuverKind::Correction, &segments, now);
    }

    /// Back off and drive onto the charging contacts again
    pub fn nudge(&mut self, now: Instant) {
        let forward = self.drive.slow_speed;
        let segments = [
            self.reverse_segment(self.timing.nudge_reverse),
            Segment::Drive {
                left: forward,
                right: forward,
                duration: self.timing.nudge_forward,
            },
        ];
        self.begin(ManeuverKind::Nudge, &segments, now);
    }

    /// Reverse off the station, stop and turn somewhere random
    pub fn launch(&mut self, now: Instant) {
        let (direction, degrees) = self.random_turn();
        let segments = [
            self.reverse_segment(self.timing.launch_reverse),
            Segment::Pause(self.timing.obstacle_pause),
            Segment::Pivot { direction, degrees },
        ];
        self.begin(ManeuverKind::Launch, &segments, now);
    }

    /// Brief reverse after a lift, then hold still for the re-check
    pub fn lift_back_off(&mut self, now: Instant) {
        let segments = [
            self.reverse_segment(self.timing.lift_reverse),
            Segment::Pause(self.timing.obstacle_pause),
        ];
        self.begin(ManeuverKind::LiftBackOff, &segments, now);
    }

    /// Advance the running maneuver
    pub fn poll(&mut self, now: Instant, boundary: &BoundarySnapshot) -> ManeuverStatus {
        let Some(mut maneuver) = self.maneuver.take() else {
            return ManeuverStatus::Idle;
        };

        loop {
            let Some(segment) = maneuver.segments.get(maneuver.index).copied() else {
                log_debug!("{:?} done", maneuver.kind);
                self.set_targets(0, 0);
                return ManeuverStatus::Done;
            };

            let elapsed = now.saturating_duration_since(maneuver.segment_started);
            match self.run_segment(segment, elapsed, boundary) {
                Step::Continue => {
                    self.maneuver = Some(maneuver);
                    return ManeuverStatus::Running;
                }
                Step::Complete => {
                    maneuver.index += 1;
                    maneuver.segment_started = now;
                }
                Step::Fail(error) => {
                    log_debug!("{:?} failed: {:?}", maneuver.kind, error);
                    self.set_targets(0, 0);
                    return ManeuverStatus::Failed(error);
                }
            }
        }
    }

    fn pivot_time(&self, degrees: u16) -> Duration {
        Duration::from_millis(degrees as u64 * self.drive.ms_per_degree as u64)
    }

    fn pivot(&mut self, direction: TurnDirection) {
        let speed = self.drive.turn_speed;
        match direction {
            TurnDirection::Left => self.set_targets(-speed, speed),
            TurnDirection::Right => self.set_targets(speed, -speed),
        }
    }

    fn run_segment(&mut self, segment: Segment, elapsed: Duration, boundary: &BoundarySnapshot) -> Step {
        match segment {
            Segment::Pause(duration) => {
                self.set_targets(0, 0);
                if elapsed >= duration {
                    Step::Complete
                } else {
                    Step::Continue
                }
            }
            Segment::Drive {
                left,
                right,
                duration,
            } => {
                if elapsed >= duration {
                    Step::Complete
                } else {
                    self.set_targets(left, right);
                    Step::Continue
                }
            }
            Segment::Pivot { direction, degrees } => {
                if self.wheels_overloaded() {
                    return Step::Fail(ManeuverError::WheelOverload);
                }
                if elapsed >= self.pivot_time(degrees) {
                    self.compass.shift_target(direction.signed(degrees));
                    Step::Complete
                } else {
                    self.pivot(direction);
                    Step::Continue
                }
            }
            Segment::ReverseUntilInside {
                orientation,
                timeout,
            } => {
                if boundary.is_inside(orientation) {
                    Step::Complete
                } else if elapsed >= timeout {
                    Step::Fail(ManeuverError::BoundaryNotReacquired)
                } else {
                    let speed = -self.drive.full_speed;
                    self.set_targets(speed, speed);
                    Step::Continue
                }
            }
            Segment::Release {
                direction,
                max_degrees,
            } => {
                let turned = (elapsed.as_millis() / self.drive.ms_per_degree.max(1) as u64)
                    .min(max_degrees as u64) as u16;
                if boundary.all_inside() {
                    self.compass.shift_target(direction.signed(turned));
                    Step::Complete
                } else if self.wheels_overloaded() || turned >= max_degrees {
                    self.compass.shift_target(direction.signed(turned));
                    Step::Fail(ManeuverError::TurnFailed)
                } else {
                    self.pivot(direction);
                    Step::Continue
                }
            }
        }
    }
}
