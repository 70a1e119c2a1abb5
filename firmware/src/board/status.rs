//! Status output over RTT
//!
//! There is no screen on this board, the status lines and flagged errors go
//! to the defmt log.

use defmt::{info, warn};
use heapless::String;
use mower_core::board::Display;
use mower_core::error::{ErrorCode, ErrorSink};

/// Collects the printed lines and logs them as one on update
#[derive(Default)]
pub struct LogDisplay {
    text: String<128>,
}

impl Display for LogDisplay {
    fn initialize(&mut self) {
        self.text.clear();
    }

    fn clear(&mut self) {
        self.text.clear();
    }

    fn print(&mut self, text: &str) {
        if !self.text.is_empty() {
            let _ = self.text.push_str(" | ");
        }
        // A line that does not fit is left out
        let _ = self.text.push_str(text);
    }

    fn update(&mut self) {
        info!("status: {}", self.text.as_str());
    }
}

/// Logs every flagged error with a running count
#[derive(Default)]
pub struct LogErrors {
    flagged: u32,
}

impl ErrorSink for LogErrors {
    fn flag(&mut self, code: ErrorCode) {
        self.flagged = self.flagged.wrapping_add(1);
        warn!("error #{}: {}", self.flagged, code.as_str());
    }
}
