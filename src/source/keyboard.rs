// src/source/keyboard.rs  -  Terminal keyboard (HID-mode scanners type here)
//
// The keyboard source is a stub: the main loop is the single crossterm reader
// and hands translated events straight to the hub.  Release events only exist
// when the terminal speaks the kitty keyboard protocol; `enable_release_events`
// asks for them.

use super::KeySource;
use crate::event::{KeyPhase, RawKeyEvent, KEY_ENTER, KEY_TAB};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};

pub struct KeyboardSource;

impl KeyboardSource {
    pub fn new() -> Self { Self }
}

impl Default for KeyboardSource {
    fn default() -> Self { Self::new() }
}

impl KeySource for KeyboardSource {
    fn name(&self) -> &str { "Keyboard" }
    fn poll(&mut self) -> Option<RawKeyEvent> { None }
}

/// crossterm key event → raw transition.  Keys without a character payload
/// (arrows, function keys, Esc) produce nothing.
pub fn translate(k: &KeyEvent) -> Option<RawKeyEvent> {
    let phase = match k.kind {
        KeyEventKind::Press | KeyEventKind::Repeat => KeyPhase::Down,
        KeyEventKind::Release                      => KeyPhase::Up,
    };
    match k.code {
        KeyCode::Char(c) => Some(RawKeyEvent::from_char(c, phase)),
        KeyCode::Enter   => Some(RawKeyEvent::new(KEY_ENTER, phase, Some("\n".into()))),
        KeyCode::Tab     => Some(RawKeyEvent::new(KEY_TAB,   phase, Some("\t".into()))),
        _ => None,
    }
}

/// Ask the terminal to report key releases.  Returns false if it can't.
pub fn enable_release_events() -> bool {
    use crossterm::event::{KeyboardEnhancementFlags, PushKeyboardEnhancementFlags};
    match crossterm::terminal::supports_keyboard_enhancement() {
        Ok(true) => {
            let flags = KeyboardEnhancementFlags::REPORT_EVENT_TYPES;
            match crossterm::execute!(std::io::stdout(), PushKeyboardEnhancementFlags(flags)) {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("[keyboard] enabling release events failed: {e}");
                    false
                }
            }
        }
        _ => false,
    }
}

pub fn disable_release_events() {
    use crossterm::event::PopKeyboardEnhancementFlags;
    let _ = crossterm::execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventState, KeyModifiers};

    fn key(code: KeyCode, kind: KeyEventKind) -> KeyEvent {
        KeyEvent { code, modifiers: KeyModifiers::NONE, kind, state: KeyEventState::NONE }
    }

    #[test]
    fn chars_keep_their_code_point() {
        let ev = translate(&key(KeyCode::Char('7'), KeyEventKind::Release)).unwrap();
        assert_eq!(ev, RawKeyEvent::up('7'));
    }

    #[test]
    fn repeat_counts_as_press() {
        let ev = translate(&key(KeyCode::Char('a'), KeyEventKind::Repeat)).unwrap();
        assert_eq!(ev.phase, KeyPhase::Down);
    }

    #[test]
    fn enter_is_outside_printable_range() {
        let ev = translate(&key(KeyCode::Enter, KeyEventKind::Press)).unwrap();
        assert_eq!(ev.key_id, KEY_ENTER);
        assert!(translate(&key(KeyCode::Esc, KeyEventKind::Press)).is_none());
    }
}
