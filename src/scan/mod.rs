// src/scan/mod.rs  -  Keystroke aggregation: hub, buffer, policies, aggregator
pub mod aggregator;
pub mod buffer;
pub mod hub;
pub mod policy;

pub use aggregator::KeystrokeAggregator;
pub use hub::{KeyHub, Tap, TapId};
pub use policy::{TerminationMode, TerminationPolicy};

use std::time::Duration;

/// Highest key identity that may contribute to a token (printable ASCII + Latin-1)
pub const MAX_KEY_ID: u64 = 255;

/// Aggregator settings, fixed for the aggregator's lifetime
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    /// Longest quiet gap between keystrokes of one scan
    pub window:       Duration,
    /// Take characters from press events instead of release events
    pub use_key_down: bool,
    pub mode:         TerminationMode,
    /// Count mode: tokens must be longer than this
    pub min_len:      usize,
    /// Terminator mode: sentinel that ends a scan
    pub terminator:   char,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            window:       Duration::from_millis(100),
            use_key_down: false,
            mode:         TerminationMode::CountThreshold,
            min_len:      3,
            // Some platforms report the scanner's line feed as 'm'
            terminator:   'm',
        }
    }
}
