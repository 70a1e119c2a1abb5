//! Fault codes and the sink they are reported to

/// Faults the control core can report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorCode {
    /// Mower tipped over
    Tilt,
    /// Mower still lifted after backing off
    Lift,
    /// Wheels stuck even after the obstacle escape was retried
    WheelOverload,
    /// Boundary wire signal gone or not reacquired
    BoundaryLost,
    /// A turn or reverse maneuver failed twice in a row
    ManeuverFailed,
    /// Cutter current above its limit
    CutterOverload,
}

impl ErrorCode {
    /// Fatal codes latch a fault that keeps the wheels and cutter stopped
    /// until it is cleared from outside.
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorCode::Tilt | ErrorCode::WheelOverload)
    }

    /// Short text for the status display
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Tilt => "tilt",
            ErrorCode::Lift => "lift",
            ErrorCode::WheelOverload => "stuck",
            ErrorCode::BoundaryLost => "no wire",
            ErrorCode::ManeuverFailed => "turn failed",
            ErrorCode::CutterOverload => "cutter",
        }
    }
}

/// Receiver of flagged faults
///
/// Notification only. Stopping the motors for fatal codes is done by the
/// state machine before the code is flagged.
pub trait ErrorSink {
    fn flag(&mut self, code: ErrorCode);
}
