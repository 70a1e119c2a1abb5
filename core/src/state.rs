//! Behavioural states of the mower

/// Exactly one state is active at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MowerState {
    /// Passive rest, only left on request
    Idle,
    Mowing,
    /// Reversing off the charging station
    Launching,
    /// Following the wire home
    Docking,
    /// Driving around until the wire is found
    LookingForBoundary,
    Charging,
    /// Operator console has control
    SetupDebug,
}

impl MowerState {
    pub fn name(self) -> &'static str {
        match self {
            MowerState::Idle => "IDLE",
            MowerState::Mowing => "MOWING",
            MowerState::Launching => "LAUNCHING",
            MowerState::Docking => "DOCKING",
            MowerState::LookingForBoundary => "SEARCHING",
            MowerState::Charging => "CHARGING",
            MowerState::SetupDebug => "SETUP",
        }
    }
}
