//! Control core of the Liam robotic lawn mower
//!
//! Everything in here is hardware independent: peripherals are reached through
//! the traits in [`board`], [`boundary`], [`heading`], [`motor`] and [`power`],
//! and time is always passed in explicitly as an [`embassy_time::Instant`].
//! The firmware crate provides the concrete RP2350 adapters and drives
//! [`mower::MowerStateMachine::cycle`] from an embassy ticker.
//!
//! # Layout
//! - [`boundary`] - boundary wire pulse decoding and per coil classification
//! - [`heading`] - compass abstraction and target heading bookkeeping
//! - [`motor`] - ramped wheel motors and the cutter motor
//! - [`power`] - battery supervision
//! - [`motion`] - maneuvers and speed compensation
//! - [`mower`] - the behavioural state machine
//! - [`debug`] - setup/debug console

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod log;

pub mod board;
pub mod boundary;
pub mod config;
pub mod debug;
pub mod error;
pub mod heading;
pub mod motion;
pub mod motor;
pub mod mower;
pub mod power;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use config::MowerConfig;
pub use error::ErrorCode;
pub use mower::MowerStateMachine;
pub use state::MowerState;
