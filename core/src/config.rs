//! Tunable constants for the control core
//!
//! [`MowerConfig::default`] carries the reference values for a standard Liam
//! chassis (two 12V gear motors, 24V cutter, NiMH pack). Firmware builds start
//! from the default and override what differs on their hardware; tests use the
//! `with_*` helpers to shorten timings.

use embassy_time::Duration;

use crate::power::BatteryChemistry;

/// Largest magnitude accepted as a wheel or cutter speed command
pub const MAX_SPEED: i8 = 100;

/// Complete configuration handed to the state machine at construction
#[derive(Debug, Clone, Default)]
pub struct MowerConfig {
    pub drive: DriveConfig,
    pub boundary: BoundaryConfig,
    pub battery: BatteryConfig,
    pub timing: TimingConfig,
}

impl MowerConfig {
    pub fn with_drive(mut self, drive: DriveConfig) -> Self {
        self.drive = drive;
        self
    }

    pub fn with_boundary(mut self, boundary: BoundaryConfig) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn with_battery(mut self, battery: BatteryConfig) -> Self {
        self.battery = battery;
        self
    }

    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }
}

/// Wheel, cutter and compensation parameters
#[derive(Debug, Clone, Copy)]
pub struct DriveConfig {
    /// Cruising speed while mowing and searching
    pub full_speed: i8,
    /// Speed the forward ramp starts from
    pub slow_speed: i8,
    /// Wheel speed used for pivot turns
    pub turn_speed: i8,
    /// Cutter speed once spun up
    pub cutter_speed: i8,
    /// Wheel ramp in speed units per second
    pub ramp_rate: u16,
    /// Wheel ramp while docking, wheels have to react fast to the wire
    pub docking_ramp_rate: u16,
    /// Cutter spin-up ramp in speed units per second
    pub cutter_ramp_rate: u16,
    /// Open loop pivot calibration
    pub ms_per_degree: u32,
    /// Filtered wheel current above which a wheel counts as loaded (mA)
    pub wheel_overload_current: u16,
    /// Filtered cutter current above which the cutter counts as stalled (mA)
    pub cutter_overload_current: u16,
    /// How long a current has to stay above its threshold
    pub overload_dwell: Duration,
    /// Cutter current where forward speed reduction starts (mA)
    pub cutter_load_low: u16,
    /// Cutter current where forward speed reduction is at its maximum (mA)
    pub cutter_load_high: u16,
    /// Remaining share of the speed at maximum cutter load, in percent
    pub min_load_speed_percent: u8,
    /// Speed units of correction per degree of heading error
    pub heading_gain: f32,
    /// Upper bound for the heading correction
    pub max_heading_correction: i8,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            full_speed: 100,
            slow_speed: 40,
            turn_speed: 80,
            cutter_speed: 100,
            ramp_rate: 250,
            docking_ramp_rate: 1000,
            cutter_ramp_rate: 50,
            ms_per_degree: 8,
            wheel_overload_current: 1800,
            cutter_overload_current: 4000,
            overload_dwell: Duration::from_millis(300),
            cutter_load_low: 1000,
            cutter_load_high: 3000,
            min_load_speed_percent: 50,
            heading_gain: 1.0,
            max_heading_correction: 30,
        }
    }
}

/// Boundary wire decoding and supervision parameters
#[derive(Debug, Clone, Copy)]
pub struct BoundaryConfig {
    /// Length of one pulse unit of the wire signal in microseconds
    pub pulse_unit_us: u32,
    /// Intervals (in pulse units) seen by a coil inside the wire
    pub inside_code: &'static [u16],
    /// Intervals (in pulse units) seen by a coil outside the wire
    pub outside_code: &'static [u16],
    /// A classification older than this decays to unknown
    pub signal_timeout: Duration,
    /// Time each coil stays selected before the next one is
    pub coil_dwell: Duration,
    /// Whether the optional center coil is fitted
    pub center_coil: bool,
    /// Both side coils unknown for this long means the wire signal is gone
    pub boundary_lost_timeout: Duration,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            pulse_unit_us: 100,
            inside_code: &[85],
            outside_code: &[5],
            signal_timeout: Duration::from_millis(2000),
            coil_dwell: Duration::from_millis(150),
            center_coil: false,
            boundary_lost_timeout: Duration::from_millis(5000),
        }
    }
}

/// Battery supervision parameters
#[derive(Debug, Clone, Copy)]
pub struct BatteryConfig {
    pub chemistry: BatteryChemistry,
    /// Overrides the chemistry go-home voltage when set
    pub go_home_voltage: Option<f32>,
    /// Overrides the chemistry full-charge voltage when set
    pub full_voltage: Option<f32>,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            chemistry: BatteryChemistry::NiMh,
            go_home_voltage: None,
            full_voltage: None,
        }
    }
}

impl BatteryConfig {
    pub fn go_home_voltage(&self) -> f32 {
        self.go_home_voltage
            .unwrap_or(self.chemistry.go_home_voltage())
    }

    pub fn full_voltage(&self) -> f32 {
        self.full_voltage.unwrap_or(self.chemistry.full_voltage())
    }
}

/// Behaviour timings
#[derive(Debug, Clone, Copy)]
pub struct TimingConfig {
    /// Random turn interval while mowing or searching
    pub turn_interval: Duration,
    /// Forward ramp from slow to full speed
    pub acceleration_duration: Duration,
    /// Smallest random turn
    pub random_turn_min: u16,
    /// Largest random turn
    pub random_turn_max: u16,
    /// Reverse before turning away from the wire
    pub boundary_reverse: Duration,
    /// Angle of the first release turn
    pub release_angle: u16,
    /// Extra pivot allowed while waiting for all coils to come back inside
    pub release_max_extra: u16,
    /// Bound for backing up until a coil is inside again
    pub go_backward_timeout: Duration,
    /// Stop before backing away from an obstacle
    pub obstacle_pause: Duration,
    /// Reverse away from an obstacle
    pub obstacle_reverse: Duration,
    /// Collisions further apart than this are not counted together
    pub collision_quiet_window: Duration,
    /// Collisions within the quiet window before escaping around the obstacle
    pub collision_limit: u8,
    /// Short reverse after a docking collision
    pub docking_nudge_reverse: Duration,
    /// Forward leg of the docking escape
    pub docking_escape_forward: Duration,
    /// Angle of each docking escape turn
    pub docking_escape_angle: u16,
    /// Docking gives up when the left coil has not been outside for this long
    pub docking_lost_timeout: Duration,
    /// Interval of the right coil check while docking
    pub right_check_interval: Duration,
    /// Correction turn when the right coil is found outside while docking
    pub right_correction_angle: u16,
    /// Charging contact may be lost for this long before a nudge
    pub contact_lost_timeout: Duration,
    /// Reverse leg of a re-dock nudge
    pub nudge_reverse: Duration,
    /// Forward leg of a re-dock nudge
    pub nudge_forward: Duration,
    /// Failed nudges before docking again from the wire
    pub max_failed_nudges: u8,
    /// Reverse off the charging station
    pub launch_reverse: Duration,
    /// Back off after a lift was detected
    pub lift_reverse: Duration,
    /// Status display refresh
    pub display_period: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            turn_interval: Duration::from_secs(20),
            acceleration_duration: Duration::from_millis(1500),
            random_turn_min: 90,
            random_turn_max: 180,
            boundary_reverse: Duration::from_millis(800),
            release_angle: 30,
            release_max_extra: 180,
            go_backward_timeout: Duration::from_millis(3000),
            obstacle_pause: Duration::from_millis(200),
            obstacle_reverse: Duration::from_millis(1000),
            collision_quiet_window: Duration::from_secs(10),
            collision_limit: 3,
            docking_nudge_reverse: Duration::from_millis(700),
            docking_escape_forward: Duration::from_millis(1500),
            docking_escape_angle: 90,
            docking_lost_timeout: Duration::from_secs(10),
            right_check_interval: Duration::from_millis(1500),
            right_correction_angle: 20,
            contact_lost_timeout: Duration::from_secs(20),
            nudge_reverse: Duration::from_millis(1000),
            nudge_forward: Duration::from_millis(1500),
            max_failed_nudges: 3,
            launch_reverse: Duration::from_millis(4000),
            lift_reverse: Duration::from_millis(500),
            display_period: Duration::from_secs(5),
        }
    }
}
