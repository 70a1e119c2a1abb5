//! Boundary wire sensing
//!
//! The wire signal generator drives a repeating pulse pattern through the
//! perimeter wire. A coil on the mower picks it up and a comparator turns it
//! into rising edges on one interrupt line. Seen from outside the wire the
//! induced signal is inverted, so the intervals between edges differ and the
//! pattern tells inside from outside.
//!
//! Only one coil can be connected to the comparator at a time. The work is
//! split between two sides that share a [`BoundarySignal`]:
//!
//! - [`PulseDecoder`] runs in interrupt context. It times the edges, matches
//!   them against the configured codes and publishes the result for whichever
//!   coil is currently selected. It never selects a coil.
//! - [`BoundarySensor`] runs in the control loop. It owns the coil multiplexer,
//!   rotates the selection and turns the published codes into a
//!   [`BoundaryClassification`], decaying to `Unknown` once the last code is
//!   older than the signal timeout.
//!
//! Each published code is a single atomic word per coil (classification plus
//! a millisecond stamp), so the loop never sees a half written update.

use core::sync::atomic::{AtomicI32, AtomicU32, AtomicU8, Ordering};

use embassy_time::{Duration, Instant};

use crate::config::BoundaryConfig;

/// Physical receiver coil
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BoundaryOrientation {
    Left,
    Right,
    Center,
}

impl BoundaryOrientation {
    fn index(self) -> usize {
        match self {
            BoundaryOrientation::Left => 0,
            BoundaryOrientation::Right => 1,
            BoundaryOrientation::Center => 2,
        }
    }

    fn from_index(index: u8) -> Self {
        match index {
            1 => BoundaryOrientation::Right,
            2 => BoundaryOrientation::Center,
            _ => BoundaryOrientation::Left,
        }
    }
}

/// Interpretation of the latest code seen by one coil
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BoundaryClassification {
    Inside,
    Outside,
    /// No code decoded within the signal timeout
    Unknown,
}

impl BoundaryClassification {
    fn to_bits(self) -> u32 {
        match self {
            BoundaryClassification::Unknown => 0,
            BoundaryClassification::Inside => 1,
            BoundaryClassification::Outside => 2,
        }
    }

    fn from_bits(bits: u32) -> Self {
        match bits & CLASS_MASK {
            1 => BoundaryClassification::Inside,
            2 => BoundaryClassification::Outside,
            _ => BoundaryClassification::Unknown,
        }
    }
}

const CLASS_BITS: u32 = 2;
const CLASS_MASK: u32 = (1 << CLASS_BITS) - 1;
/// Millisecond stamps wrap after about 12 days, ages are computed modulo this
const STAMP_MASK: u32 = (1 << (32 - CLASS_BITS)) - 1;
/// Signal strength saturates here
const MAX_STRENGTH: i32 = 100;

/// State shared between the pulse interrupt and the control loop
///
/// Meant to live in a `static`.
pub struct BoundarySignal {
    selected: AtomicU8,
    codes: [AtomicU32; 3],
    strength: [AtomicI32; 3],
}

impl Default for BoundarySignal {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundarySignal {
    pub const fn new() -> Self {
        Self {
            selected: AtomicU8::new(0),
            codes: [AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0)],
            strength: [AtomicI32::new(0), AtomicI32::new(0), AtomicI32::new(0)],
        }
    }

    /// Coil currently connected to the receiver
    pub fn selected(&self) -> BoundaryOrientation {
        BoundaryOrientation::from_index(self.selected.load(Ordering::Acquire))
    }

    fn set_selected(&self, orientation: BoundaryOrientation) {
        self.selected
            .store(orientation.index() as u8, Ordering::Release);
    }

    pub(crate) fn publish(
        &self,
        orientation: BoundaryOrientation,
        classification: BoundaryClassification,
        now_ms: u64,
        strength: i32,
    ) {
        let stamp = (now_ms as u32) & STAMP_MASK;
        let word = (stamp << CLASS_BITS) | classification.to_bits();
        self.strength[orientation.index()].store(strength, Ordering::Relaxed);
        self.codes[orientation.index()].store(word, Ordering::Release);
    }

    /// Latest decoded classification and its 30 bit millisecond stamp
    fn latest(&self, orientation: BoundaryOrientation) -> Option<(BoundaryClassification, u32)> {
        let word = self.codes[orientation.index()].load(Ordering::Acquire);
        match BoundaryClassification::from_bits(word) {
            BoundaryClassification::Unknown => None,
            classification => Some((classification, word >> CLASS_BITS)),
        }
    }

    /// Signed signal strength, positive for consecutive inside codes
    pub fn strength(&self, orientation: BoundaryOrientation) -> i32 {
        self.strength[orientation.index()].load(Ordering::Relaxed)
    }

    /// Forget everything decoded for one coil
    pub fn clear(&self, orientation: BoundaryOrientation) {
        self.codes[orientation.index()].store(0, Ordering::Release);
        self.strength[orientation.index()].store(0, Ordering::Relaxed);
    }
}

/// Interrupt side pulse decoder
pub struct PulseDecoder {
    pulse_unit_us: u64,
    inside_code: &'static [u16],
    outside_code: &'static [u16],
    inside_index: usize,
    outside_index: usize,
    last_edge_us: Option<u64>,
    orientation: BoundaryOrientation,
    strength: i32,
}

impl PulseDecoder {
    pub fn new(config: &BoundaryConfig) -> Self {
        Self {
            pulse_unit_us: config.pulse_unit_us.max(1) as u64,
            inside_code: config.inside_code,
            outside_code: config.outside_code,
            inside_index: 0,
            outside_index: 0,
            last_edge_us: None,
            orientation: BoundaryOrientation::Left,
            strength: 0,
        }
    }

    /// Handle one rising edge at `now_us` microseconds
    pub fn on_pulse(&mut self, signal: &BoundarySignal, now_us: u64) {
        let selected = signal.selected();
        if selected != self.orientation {
            // Edges so far belong to the previous coil
            self.orientation = selected;
            self.inside_index = 0;
            self.outside_index = 0;
            self.strength = 0;
            self.last_edge_us = Some(now_us);
            return;
        }

        let Some(last) = self.last_edge_us.replace(now_us) else {
            return;
        };
        let units = (now_us.saturating_sub(last) + self.pulse_unit_us / 2) / self.pulse_unit_us;

        if Self::advance(&mut self.inside_index, self.inside_code, units) {
            self.strength = if self.strength > 0 {
                (self.strength + 1).min(MAX_STRENGTH)
            } else {
                1
            };
            signal.publish(
                selected,
                BoundaryClassification::Inside,
                now_us / 1000,
                self.strength,
            );
        }

        if Self::advance(&mut self.outside_index, self.outside_code, units) {
            self.strength = if self.strength < 0 {
                (self.strength - 1).max(-MAX_STRENGTH)
            } else {
                -1
            };
            signal.publish(
                selected,
                BoundaryClassification::Outside,
                now_us / 1000,
                self.strength,
            );
        }
    }

    /// Step one code matcher, true once the whole code has been seen
    fn advance(index: &mut usize, code: &[u16], units: u64) -> bool {
        if code.is_empty() {
            return false;
        }
        if !Self::matches(code[*index], units) {
            // A mismatch may still be the start of a fresh code
            *index = 0;
            if !Self::matches(code[0], units) {
                return false;
            }
        }
        *index += 1;
        if *index == code.len() {
            *index = 0;
            return true;
        }
        false
    }

    fn matches(expected: u16, units: u64) -> bool {
        (expected as u64).abs_diff(units) <= 1
    }
}

/// Coil multiplexer driven by the control loop
pub trait CoilSelect {
    fn select(&mut self, orientation: BoundaryOrientation);
}

/// Classification of every coil taken once per control cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BoundarySnapshot {
    pub left: BoundaryClassification,
    pub right: BoundaryClassification,
    pub center: Option<BoundaryClassification>,
}

impl BoundarySnapshot {
    pub fn new(left: BoundaryClassification, right: BoundaryClassification) -> Self {
        Self {
            left,
            right,
            center: None,
        }
    }

    pub fn get(&self, orientation: BoundaryOrientation) -> BoundaryClassification {
        match orientation {
            BoundaryOrientation::Left => self.left,
            BoundaryOrientation::Right => self.right,
            BoundaryOrientation::Center => self.center.unwrap_or(BoundaryClassification::Unknown),
        }
    }

    pub fn is_inside(&self, orientation: BoundaryOrientation) -> bool {
        self.get(orientation) == BoundaryClassification::Inside
    }

    pub fn is_outside(&self, orientation: BoundaryOrientation) -> bool {
        self.get(orientation) == BoundaryClassification::Outside
    }

    /// Outside or without signal
    pub fn is_out_of_bounds(&self, orientation: BoundaryOrientation) -> bool {
        self.get(orientation) != BoundaryClassification::Inside
    }

    /// Every fitted coil confirmed inside
    pub fn all_inside(&self) -> bool {
        self.left == BoundaryClassification::Inside
            && self.right == BoundaryClassification::Inside
            && self.center.map_or(true, |c| c == BoundaryClassification::Inside)
    }

    pub fn both_outside(&self) -> bool {
        self.left == BoundaryClassification::Outside && self.right == BoundaryClassification::Outside
    }

    /// Neither side coil has any signal
    pub fn no_signal(&self) -> bool {
        self.left == BoundaryClassification::Unknown && self.right == BoundaryClassification::Unknown
    }
}

/// Control loop side of the boundary receiver
pub struct BoundarySensor<C> {
    signal: &'static BoundarySignal,
    coils: C,
    current: BoundaryOrientation,
    selected_at: Instant,
    center_coil: bool,
    signal_timeout: Duration,
    coil_dwell: Duration,
}

impl<C: CoilSelect> BoundarySensor<C> {
    pub fn new(signal: &'static BoundarySignal, coils: C, config: &BoundaryConfig) -> Self {
        let mut sensor = Self {
            signal,
            coils,
            current: BoundaryOrientation::Left,
            selected_at: Instant::from_ticks(0),
            center_coil: config.center_coil,
            signal_timeout: config.signal_timeout,
            coil_dwell: config.coil_dwell,
        };
        sensor.coils.select(BoundaryOrientation::Left);
        sensor.signal.set_selected(BoundaryOrientation::Left);
        sensor
    }

    /// Connect `orientation` to the receiver
    ///
    /// Selecting the coil that is already connected does nothing, so the
    /// decoder keeps its progress.
    pub fn select(&mut self, orientation: BoundaryOrientation, now: Instant) {
        if orientation == self.current {
            return;
        }
        self.coils.select(orientation);
        self.signal.set_selected(orientation);
        self.current = orientation;
        self.selected_at = now;
    }

    pub fn selected(&self) -> BoundaryOrientation {
        self.current
    }

    /// Move on to the next coil once the current one had its dwell time
    pub fn poll(&mut self, now: Instant) {
        if now.saturating_duration_since(self.selected_at) < self.coil_dwell {
            return;
        }
        let next = match self.current {
            BoundaryOrientation::Left => BoundaryOrientation::Right,
            BoundaryOrientation::Right if self.center_coil => BoundaryOrientation::Center,
            BoundaryOrientation::Right | BoundaryOrientation::Center => BoundaryOrientation::Left,
        };
        self.select(next, now);
    }

    pub fn classification(&self, orientation: BoundaryOrientation, now: Instant) -> BoundaryClassification {
        let Some((classification, stamp)) = self.signal.latest(orientation) else {
            return BoundaryClassification::Unknown;
        };
        let now_ms = (now.as_millis() as u32) & STAMP_MASK;
        let age_ms = now_ms.wrapping_sub(stamp) & STAMP_MASK;
        // Published after `now` was taken
        let age_ms = if age_ms > STAMP_MASK / 2 { 0 } else { age_ms };
        if age_ms as u64 > self.signal_timeout.as_millis() {
            BoundaryClassification::Unknown
        } else {
            classification
        }
    }

    /// Selected coil is confirmed inside
    pub fn is_inside(&self, now: Instant) -> bool {
        self.classification(self.current, now) == BoundaryClassification::Inside
    }

    /// Selected coil is confirmed outside
    pub fn is_outside(&self, now: Instant) -> bool {
        self.classification(self.current, now) == BoundaryClassification::Outside
    }

    /// Selected coil is outside or has lost the signal
    pub fn is_out_of_bounds(&self, now: Instant) -> bool {
        self.classification(self.current, now) != BoundaryClassification::Inside
    }

    pub fn signal(&self, orientation: BoundaryOrientation) -> i32 {
        self.signal.strength(orientation)
    }

    pub fn snapshot(&self, now: Instant) -> BoundarySnapshot {
        BoundarySnapshot {
            left: self.classification(BoundaryOrientation::Left, now),
            right: self.classification(BoundaryOrientation::Right, now),
            center: self
                .center_coil
                .then(|| self.classification(BoundaryOrientation::Center, now)),
        }
    }
}
