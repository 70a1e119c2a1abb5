//! Receiver coil multiplexer
//!
//! Two select lines on a 4:1 analog mux: 00 left, 01 right, 10 center.

use embassy_rp::gpio::{Level, Output};
use mower_core::boundary::{BoundaryOrientation, CoilSelect};

use crate::system::resources::CoilSelectResources;

pub struct CoilMux {
    select_a: Output<'static>,
    select_b: Output<'static>,
}

impl CoilMux {
    pub fn new(r: CoilSelectResources) -> Self {
        Self {
            select_a: Output::new(r.select_a_pin, Level::Low),
            select_b: Output::new(r.select_b_pin, Level::Low),
        }
    }
}

impl CoilSelect for CoilMux {
    fn select(&mut self, orientation: BoundaryOrientation) {
        let (a, b) = match orientation {
            BoundaryOrientation::Left => (Level::Low, Level::Low),
            BoundaryOrientation::Right => (Level::High, Level::Low),
            BoundaryOrientation::Center => (Level::Low, Level::High),
        };
        self.select_a.set_level(a);
        self.select_b.set_level(b);
    }
}
