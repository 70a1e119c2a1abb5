//! Heading and attitude sensing
//!
//! The hardware side implements [`HeadingSensor`]. Which implementation is
//! used is decided at startup (no sensor, plain compass or 9-axis IMU), the
//! control core only ever sees the trait.
//!
//! [`Compass`] wraps the sensor and owns the single live target heading used
//! for straight line correction.

/// Source of heading and tilt information
pub trait HeadingSensor {
    /// Configure the device and take a first reading
    fn initialize(&mut self);

    /// Refresh the cached reading, called once per control cycle
    fn update_heading(&mut self);

    /// Heading in degrees, 0..=359
    fn heading(&self) -> u16;

    /// Mower is upside down or tilted beyond recovery
    fn has_flipped(&self) -> bool;

    /// Lift switch pressed or the body tipped up
    fn is_lifted(&self) -> bool;

    /// False when there is no heading source, compass correction is then off
    fn is_present(&self) -> bool {
        true
    }

    /// Tilt from level in degrees, for the debug console
    fn tilt(&self) -> u16 {
        0
    }
}

/// Stand-in when no compass or IMU is fitted
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHeadingSensor;

impl HeadingSensor for NoHeadingSensor {
    fn initialize(&mut self) {}

    fn update_heading(&mut self) {}

    fn heading(&self) -> u16 {
        0
    }

    fn has_flipped(&self) -> bool {
        false
    }

    fn is_lifted(&self) -> bool {
        false
    }

    fn is_present(&self) -> bool {
        false
    }
}

/// Wrap any angle into 0..=359
pub fn normalize(degrees: i32) -> u16 {
    degrees.rem_euclid(360) as u16
}

/// Signed shortest difference `current - target`, in -180..=180
///
/// Positive means the mower points clockwise of the target.
pub fn heading_difference(current: u16, target: u16) -> i16 {
    let mut difference = current as i16 - target as i16;
    if difference > 180 {
        difference -= 360;
    } else if difference < -180 {
        difference += 360;
    }
    difference
}

/// Heading sensor plus target heading bookkeeping
pub struct Compass<H> {
    sensor: H,
    target: u16,
}

impl<H: HeadingSensor> Compass<H> {
    pub fn new(sensor: H) -> Self {
        Self { sensor, target: 0 }
    }

    pub fn initialize(&mut self) {
        self.sensor.initialize();
        self.sensor.update_heading();
        self.target = self.sensor.heading();
    }

    pub fn update(&mut self) {
        self.sensor.update_heading();
    }

    pub fn heading(&self) -> u16 {
        self.sensor.heading()
    }

    pub fn target_heading(&self) -> u16 {
        self.target
    }

    /// Take the current heading as the new target
    pub fn set_new_target_heading(&mut self) {
        self.target = self.sensor.heading();
    }

    /// Move the target by a signed angle, positive is clockwise
    pub fn shift_target(&mut self, degrees: i16) {
        self.target = normalize(self.target as i32 + degrees as i32);
    }

    /// Signed error of the current heading against the target
    pub fn heading_error(&self) -> i16 {
        heading_difference(self.sensor.heading(), self.target)
    }

    pub fn has_flipped(&self) -> bool {
        self.sensor.has_flipped()
    }

    pub fn is_lifted(&self) -> bool {
        self.sensor.is_lifted()
    }

    pub fn is_present(&self) -> bool {
        self.sensor.is_present()
    }

    pub fn sensor(&self) -> &H {
        &self.sensor
    }
}
