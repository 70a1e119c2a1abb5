//! Logging front end for the core crate
//!
//! With the `defmt` feature the macros forward to `defmt` (the firmware enables
//! it). Host test builds print to stdout. Any other build discards the message
//! but still type checks the arguments.
//!
//! Only plain `{}` and `{:?}` placeholders are allowed so the same call site
//! works for both `defmt` and `core::fmt`.

#[cfg(feature = "defmt")]
macro_rules! log_info {
    ($($arg:tt)*) => { ::defmt::info!($($arg)*) };
}

#[cfg(all(not(feature = "defmt"), test))]
macro_rules! log_info {
    ($($arg:tt)*) => { ::std::println!("[INFO] {}", ::std::format!($($arg)*)) };
}

#[cfg(all(not(feature = "defmt"), not(test)))]
macro_rules! log_info {
    ($($arg:tt)*) => {{ let _ = ::core::format_args!($($arg)*); }};
}

#[cfg(feature = "defmt")]
macro_rules! log_debug {
    ($($arg:tt)*) => { ::defmt::debug!($($arg)*) };
}

#[cfg(all(not(feature = "defmt"), test))]
macro_rules! log_debug {
    ($($arg:tt)*) => { ::std::println!("[DEBUG] {}", ::std::format!($($arg)*)) };
}

#[cfg(all(not(feature = "defmt"), not(test)))]
macro_rules! log_debug {
    ($($arg:tt)*) => {{ let _ = ::core::format_args!($($arg)*); }};
}

#[cfg(feature = "defmt")]
macro_rules! log_warn {
    ($($arg:tt)*) => { ::defmt::warn!($($arg)*) };
}

#[cfg(all(not(feature = "defmt"), test))]
macro_rules! log_warn {
    ($($arg:tt)*) => { ::std::println!("[WARN] {}", ::std::format!($($arg)*)) };
}

#[cfg(all(not(feature = "defmt"), not(test)))]
macro_rules! log_warn {
    ($($arg:tt)*) => {{ let _ = ::core::format_args!($($arg)*); }};
}

#[cfg(feature = "defmt")]
macro_rules! log_error {
    ($($arg:tt)*) => { ::defmt::error!($($arg)*) };
}

#[cfg(all(not(feature = "defmt"), test))]
macro_rules! log_error {
    ($($arg:tt)*) => { ::std::println!("[ERROR] {}", ::std::format!($($arg)*)) };
}

#[cfg(all(not(feature = "defmt"), not(test)))]
macro_rules! log_error {
    ($($arg:tt)*) => {{ let _ = ::core::format_args!($($arg)*); }};
}
