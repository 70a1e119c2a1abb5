pub mod boundary_pulse;
pub mod console_read;
pub mod mow;
