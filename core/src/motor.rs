//! Wheel and cutter motors
//!
//! The hardware only has to provide [`MotorOutput`]: apply a signed speed and
//! read back a current. Ramping, current filtering and overload debouncing
//! happen here, driven by [`WheelMotor::tick`] / [`CutterMotor::tick`] once
//! per control cycle.
//!
//! # Ramping
//! Speed changes are slew limited to the configured rate (speed units per
//! second, at least one unit per tick) so a direction reversal never slams
//! the gearbox. [`WheelMotor::hard_stop`] bypasses the ramp.
//!
//! # Overload
//! Current is filtered through a 5 sample moving median. A motor counts as
//! overloaded once the filtered current stayed above the threshold for the
//! whole dwell time, which keeps start-up inrush from reading as a stall.

use embassy_time::{Duration, Instant};
use moving_median::MovingMedian;

use crate::config::{DriveConfig, MAX_SPEED};

/// Samples in the current median filter
const CURRENT_WINDOW: usize = 5;

/// Hardware side of one motor channel
pub trait MotorOutput {
    /// Apply a signed speed in -100..=100
    fn set_output(&mut self, speed: i8);

    /// Motor current in mA
    fn read_current(&mut self) -> u16;
}

/// Median filtered current with debounced threshold detection
struct CurrentMonitor {
    filter: MovingMedian<f32, CURRENT_WINDOW>,
    current: u16,
    threshold: u16,
    dwell: Duration,
    above_since: Option<Instant>,
    overloaded: bool,
}

impl CurrentMonitor {
    fn new(threshold: u16, dwell: Duration) -> Self {
        Self {
            filter: MovingMedian::new(),
            current: 0,
            threshold,
            dwell,
            above_since: None,
            overloaded: false,
        }
    }

    fn sample(&mut self, raw: u16, now: Instant) {
        self.filter.add_value(raw as f32);
        self.current = self.filter.median() as u16;

        if self.current > self.threshold {
            let since = *self.above_since.get_or_insert(now);
            self.overloaded = now.saturating_duration_since(since) >= self.dwell;
        } else {
            self.above_since = None;
            self.overloaded = false;
        }
    }

    fn reset(&mut self) {
        self.filter = MovingMedian::new();
        self.current = 0;
        self.above_since = None;
        self.overloaded = false;
    }
}

/// Slew limited step from `actual` toward `target`
fn ramp_toward(actual: i8, target: i8, rate: u16, elapsed: Duration) -> i8 {
    let step = ((rate as u64 * elapsed.as_millis()) / 1000).clamp(1, 2 * MAX_SPEED as u64) as i16;
    let delta = (target as i16 - actual as i16).clamp(-step, step);
    (actual as i16 + delta) as i8
}

/// One drive wheel
pub struct WheelMotor<O> {
    output: O,
    target: i8,
    actual: i8,
    ramp_rate: u16,
    last_tick: Option<Instant>,
    monitor: CurrentMonitor,
}

impl<O: MotorOutput> WheelMotor<O> {
    pub fn new(output: O, config: &DriveConfig) -> Self {
        Self {
            output,
            target: 0,
            actual: 0,
            ramp_rate: config.ramp_rate,
            last_tick: None,
            monitor: CurrentMonitor::new(config.wheel_overload_current, config.overload_dwell),
        }
    }

    /// New target speed, reached gradually by [`Self::tick`]
    pub fn set_speed(&mut self, speed: i8) {
        self.target = speed.clamp(-MAX_SPEED, MAX_SPEED);
    }

    pub fn target(&self) -> i8 {
        self.target
    }

    /// Speed currently applied to the hardware
    pub fn speed(&self) -> i8 {
        self.actual
    }

    pub fn set_ramp_rate(&mut self, rate: u16) {
        self.ramp_rate = rate;
    }

    pub fn tick(&mut self, now: Instant) {
        let elapsed = self
            .last_tick
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or(Duration::from_ticks(0));
        self.last_tick = Some(now);

        if self.actual != self.target {
            self.actual = ramp_toward(self.actual, self.target, self.ramp_rate, elapsed);
            self.output.set_output(self.actual);
        }

        let raw = self.output.read_current();
        self.monitor.sample(raw, now);
    }

    /// Output to zero right now, skipping the ramp
    pub fn hard_stop(&mut self) {
        self.target = 0;
        self.actual = 0;
        self.output.set_output(0);
    }

    /// Filtered current in mA
    pub fn get_current(&self) -> u16 {
        self.monitor.current
    }

    pub fn is_overloaded(&self) -> bool {
        self.monitor.overloaded
    }

    /// Forget current history, used once an obstacle has been dealt with
    pub fn reset_overload(&mut self) {
        self.monitor.reset();
    }
}

/// Cutting blade motor
pub struct CutterMotor<O> {
    output: O,
    speed: i8,
    actual: i8,
    running: bool,
    ramp_rate: u16,
    last_tick: Option<Instant>,
    monitor: CurrentMonitor,
}

impl<O: MotorOutput> CutterMotor<O> {
    pub fn new(output: O, config: &DriveConfig) -> Self {
        Self {
            output,
            speed: config.cutter_speed.clamp(0, MAX_SPEED),
            actual: 0,
            running: false,
            ramp_rate: config.cutter_ramp_rate,
            last_tick: None,
            monitor: CurrentMonitor::new(config.cutter_overload_current, config.overload_dwell),
        }
    }

    /// Force the blade off, the first thing done with the cutter at boot
    pub fn initialize(&mut self) {
        self.output.set_output(0);
        self.actual = 0;
        self.running = false;
    }

    /// Spin up, ramped by [`Self::tick`]
    pub fn start(&mut self) {
        if !self.running {
            log_debug!("cutter start");
        }
        self.running = true;
    }

    /// Stop immediately, the blade is never ramped down
    pub fn stop(&mut self) {
        if self.running {
            log_debug!("cutter stop");
        }
        self.running = false;
        self.actual = 0;
        self.output.set_output(0);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn speed(&self) -> i8 {
        self.actual
    }

    pub fn tick(&mut self, now: Instant) {
        let elapsed = self
            .last_tick
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or(Duration::from_ticks(0));
        self.last_tick = Some(now);

        let target = if self.running { self.speed } else { 0 };
        if self.actual != target {
            self.actual = ramp_toward(self.actual, target, self.ramp_rate, elapsed);
            self.output.set_output(self.actual);
        }

        let raw = self.output.read_current();
        self.monitor.sample(raw, now);
    }

    /// Filtered blade current in mA, the grass load
    pub fn get_current(&self) -> u16 {
        self.monitor.current
    }

    pub fn is_overloaded(&self) -> bool {
        self.monitor.overloaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockMotor;

    fn config() -> DriveConfig {
        DriveConfig {
            ramp_rate: 250,
            cutter_ramp_rate: 100,
            wheel_overload_current: 1800,
            overload_dwell: Duration::from_millis(300),
            ..DriveConfig::default()
        }
    }

    #[test]
    fn speed_ramps_at_bounded_rate() {
        let motor = MockMotor::default();
        let state = motor.state.clone();
        let mut wheel = WheelMotor::new(motor, &config());

        wheel.set_speed(100);
        wheel.tick(Instant::from_millis(0));
        assert_eq!(wheel.speed(), 1);

        for i in 1..=4 {
            wheel.tick(Instant::from_millis(i * 20));
        }
        // 250 units/s over 80ms
        assert_eq!(wheel.speed(), 21);

        let outputs = state.borrow().outputs.clone();
        assert!(outputs.windows(2).all(|w| (w[1] as i16 - w[0] as i16).abs() <= 5));
    }

    #[test]
    fn reversal_passes_through_zero_gradually() {
        let mut wheel = WheelMotor::new(MockMotor::default(), &config());
        wheel.set_speed(20);
        for i in 0..20 {
            wheel.tick(Instant::from_millis(i * 20));
        }
        assert_eq!(wheel.speed(), 20);

        wheel.set_speed(-20);
        wheel.tick(Instant::from_millis(400));
        assert_eq!(wheel.speed(), 15);
        for i in 21..40 {
            wheel.tick(Instant::from_millis(i * 20));
        }
        assert_eq!(wheel.speed(), -20);
    }

    #[test]
    fn set_speed_is_clamped() {
        let mut wheel = WheelMotor::new(MockMotor::default(), &config());
        wheel.set_speed(-128);
        assert_eq!(wheel.target(), -MAX_SPEED);
    }

    #[test]
    fn hard_stop_skips_the_ramp() {
        let motor = MockMotor::default();
        let state = motor.state.clone();
        let mut wheel = WheelMotor::new(motor, &config());
        wheel.set_speed(100);
        for i in 0..30 {
            wheel.tick(Instant::from_millis(i * 20));
        }

        wheel.hard_stop();

        assert_eq!(wheel.speed(), 0);
        assert_eq!(state.borrow().last(), 0);
    }

    #[test]
    fn overload_needs_the_full_dwell() {
        let motor = MockMotor::default();
        let state = motor.state.clone();
        let mut wheel = WheelMotor::new(motor, &config());
        state.borrow_mut().current = 2500;

        wheel.tick(Instant::from_millis(0));
        wheel.tick(Instant::from_millis(50));
        wheel.tick(Instant::from_millis(100));
        assert!(!wheel.is_overloaded());

        for t in (150..=600).step_by(50) {
            wheel.tick(Instant::from_millis(t));
        }
        assert!(wheel.is_overloaded());
        assert_eq!(wheel.get_current(), 2500);

        state.borrow_mut().current = 300;
        for t in (650..=900).step_by(50) {
            wheel.tick(Instant::from_millis(t));
        }
        assert!(!wheel.is_overloaded());
    }

    #[test]
    fn reset_overload_drops_the_current_history() {
        let motor = MockMotor::default();
        let state = motor.state.clone();
        let mut wheel = WheelMotor::new(motor, &config());
        state.borrow_mut().current = 2500;
        for t in (0..=600).step_by(50) {
            wheel.tick(Instant::from_millis(t));
        }
        assert!(wheel.is_overloaded());

        wheel.reset_overload();
        state.borrow_mut().current = 300;
        wheel.tick(Instant::from_millis(650));

        assert_eq!(wheel.get_current(), 300);
        assert!(!wheel.is_overloaded());
    }

    #[test]
    fn single_current_spike_is_filtered() {
        let motor = MockMotor::default();
        let state = motor.state.clone();
        let mut wheel = WheelMotor::new(motor, &config());

        for (i, current) in [500, 500, 5000, 500, 500, 500, 500, 500].into_iter().enumerate() {
            state.borrow_mut().current = current;
            wheel.tick(Instant::from_millis(i as u64 * 100));
            assert!(wheel.get_current() < 1800);
            assert!(!wheel.is_overloaded());
        }
    }

    #[test]
    fn cutter_initialize_forces_output_off_first() {
        let motor = MockMotor::default();
        let state = motor.state.clone();
        let mut cutter = CutterMotor::new(motor, &config());

        cutter.initialize();

        assert_eq!(state.borrow().outputs, vec![0]);
        assert!(!cutter.is_running());
    }

    #[test]
    fn cutter_spins_up_gradually_and_stops_at_once() {
        let motor = MockMotor::default();
        let state = motor.state.clone();
        let mut cutter = CutterMotor::new(motor, &config());
        cutter.initialize();

        cutter.start();
        cutter.tick(Instant::from_millis(0));
        cutter.tick(Instant::from_millis(100));
        assert_eq!(cutter.speed(), 11);
        assert!(cutter.is_running());

        cutter.stop();
        assert_eq!(cutter.speed(), 0);
        assert_eq!(state.borrow().last(), 0);
        cutter.tick(Instant::from_millis(200));
        assert_eq!(cutter.speed(), 0);
    }
}
