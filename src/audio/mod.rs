// src/audio/mod.rs  -  Confirmation chirp: AudioOutput trait + cpal backend
use anyhow::Result;
use std::time::Duration;

/// One short tone with a linear fade in and out
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chirp {
    pub hz:     f32,
    pub length: Duration,
    pub ramp:   Duration,
}

/// Platform-agnostic audio output interface
pub trait AudioOutput: Send {
    /// Start a chirp and return at once; a new chirp cuts off the previous one
    fn chirp(&mut self, c: &Chirp) -> Result<()>;
}

/// The chirp played for each reported token
pub fn scan_chirp(hz: f32) -> Chirp {
    Chirp { hz, length: Duration::from_millis(70), ramp: Duration::from_millis(5) }
}

/// Gain for frame `pos` of a `total`-frame chirp with `ramp`-frame fades.
/// The fades keep the tone from clicking at its edges.
pub fn envelope(pos: u32, total: u32, ramp: u32) -> f32 {
    if pos >= total {
        return 0.0;
    }
    if ramp == 0 {
        return 1.0;
    }
    let edge = pos.min(total - 1 - pos);
    (edge as f32 / ramp as f32).min(1.0)
}

// ── cpal backend ─────────────────────────────────────────────────────────────
#[cfg(feature = "audio-cpal")]
mod cpal_backend;
#[cfg(feature = "audio-cpal")]
pub use cpal_backend::CpalAudio;

/// Null backend (no sound: --no-beep, or no output device)
pub struct NullAudio;
impl AudioOutput for NullAudio {
    fn chirp(&mut self, _c: &Chirp) -> Result<()> { Ok(()) }
}

/// Factory: returns the best available backend
pub fn create_audio(enabled: bool, volume: f32) -> Box<dyn AudioOutput> {
    if !enabled {
        return Box::new(NullAudio);
    }
    #[cfg(feature = "audio-cpal")]
    {
        match CpalAudio::new(volume) {
            Ok(a)  => return Box::new(a),
            Err(e) => log::warn!("cpal init failed: {e}  →  no beep"),
        }
    }
    #[cfg(not(feature = "audio-cpal"))]
    let _ = volume;
    Box::new(NullAudio)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_fades_both_edges() {
        assert_eq!(envelope(0, 100, 10), 0.0);
        assert_eq!(envelope(5, 100, 10), 0.5);
        assert_eq!(envelope(50, 100, 10), 1.0);
        assert_eq!(envelope(99, 100, 10), 0.0);
        assert_eq!(envelope(100, 100, 10), 0.0);
    }

    #[test]
    fn envelope_without_ramp_is_flat() {
        assert_eq!(envelope(0, 10, 0), 1.0);
        assert_eq!(envelope(9, 10, 0), 1.0);
    }

    #[test]
    fn null_backend_accepts_chirps() {
        let mut out = create_audio(false, 0.5);
        assert!(out.chirp(&scan_chirp(1800.0)).is_ok());
    }
}
