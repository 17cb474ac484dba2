// src/source/mod.rs  -  KeySource trait + platform adapter registry
pub mod demo;
pub mod keyboard;
#[cfg(all(feature = "source-evdev", target_os = "linux"))]
pub mod evdev;
#[cfg(feature = "source-serial")]
pub mod serial;

use crate::config::{AppConfig, SourceType};
use crate::event::RawKeyEvent;
use anyhow::Result;

/// Adapter interface: produces raw key transitions, non-blocking
pub trait KeySource: Send {
    /// Next pending transition, if any
    fn poll(&mut self) -> Option<RawKeyEvent>;
    /// Human-readable adapter name
    fn name(&self) -> &str;
}

/// List input devices and serial ports (used by --list-devices)
pub fn list_devices() -> Vec<String> {
    let mut out = vec![];
    #[cfg(all(feature = "source-evdev", target_os = "linux"))]
    {
        let mut v = evdev::list_input_devices();
        out.append(&mut v);
    }
    #[cfg(feature = "source-serial")]
    {
        let mut s = serial::list_ports();
        out.append(&mut s);
    }
    out
}

/// Resolve `Auto`: a known serial scanner wins, otherwise the terminal keyboard.
///
/// HID-mode scanners already type into the terminal, so no probing is needed
/// for them.
pub fn autodetect_source() -> SourceType {
    #[cfg(feature = "source-serial")]
    {
        if let Some(port) = serial::autodetect_port() {
            log::info!("[autodetect] serial scanner on {port}");
            return SourceType::Serial;
        }
    }
    log::info!("[autodetect] no serial scanner found → terminal keyboard");
    SourceType::Keyboard
}

/// Factory.
///
/// Returns `(source, is_keyboard)`.  When `is_keyboard` is true the main loop
/// reads crossterm events itself and feeds them to the hub; the stub source
/// then never yields anything.
pub fn create_source(cfg: &AppConfig) -> Result<(Box<dyn KeySource>, bool)> {
    let kind = if cfg.source == SourceType::Auto {
        let detected = autodetect_source();
        log::info!("[autodetect] selected source: {:?}", detected);
        detected
    } else {
        cfg.source
    };

    match kind {
        SourceType::Auto | SourceType::Keyboard => {
            Ok((Box::new(keyboard::KeyboardSource::new()), true))
        }
        SourceType::Demo => {
            let sentinel = match cfg.mode {
                crate::scan::TerminationMode::TerminatorChar => Some(cfg.terminator),
                crate::scan::TerminationMode::CountThreshold => None,
            };
            // The simulated scanner types wherever the keyboard does, so Esc still quits
            Ok((Box::new(demo::DemoScanner::new(sentinel)), true))
        }
        SourceType::Evdev => {
            #[cfg(all(feature = "source-evdev", target_os = "linux"))]
            {
                Ok((Box::new(evdev::EvdevScanner::open(&cfg.device, cfg.grab)?), false))
            }
            #[cfg(not(all(feature = "source-evdev", target_os = "linux")))]
            {
                log::warn!("source = \"evdev\" but this build has no evdev support → falling back to keyboard");
                Ok((Box::new(keyboard::KeyboardSource::new()), true))
            }
        }
        SourceType::Serial => {
            #[cfg(feature = "source-serial")]
            {
                Ok((Box::new(serial::SerialScanner::open(&cfg.port, cfg.baud)?), false))
            }
            #[cfg(not(feature = "source-serial"))]
            {
                log::warn!("source = \"serial\" but this build has no serial support → falling back to keyboard");
                Ok((Box::new(keyboard::KeyboardSource::new()), true))
            }
        }
    }
}
