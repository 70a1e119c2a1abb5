//! Core system components shared by the tasks
pub mod resources;
pub mod settings;
pub mod signals;
