// src/event.rs  -  Raw key transitions as delivered by a platform source

/// Which half of a physical key transition an event reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPhase {
    Down,
    Up,
}

/// Identity used for keys that must never reach a token buffer
/// (Enter, Tab, arrows, modifiers).  Anything above 255 is filtered out.
pub const NON_PRINTABLE_BASE: u64 = 0x1_0000_0000;
pub const KEY_ENTER: u64 = NON_PRINTABLE_BASE + 0x0d;
pub const KEY_TAB:   u64 = NON_PRINTABLE_BASE + 0x09;

/// One physical key transition.
///
/// `key_id` is the logical key identity; for printable ASCII it equals the
/// character code.  `character` is the payload the platform resolved for
/// this transition, which some platforms only attach to one of the phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawKeyEvent {
    pub key_id:    u64,
    pub phase:     KeyPhase,
    pub character: Option<String>,
}

impl RawKeyEvent {
    pub fn new(key_id: u64, phase: KeyPhase, character: Option<String>) -> Self {
        Self { key_id, phase, character }
    }

    /// Printable key whose identity is its own code point
    pub fn from_char(c: char, phase: KeyPhase) -> Self {
        Self::new(c as u64, phase, Some(c.to_string()))
    }

    pub fn down(c: char) -> Self { Self::from_char(c, KeyPhase::Down) }
    pub fn up(c: char)   -> Self { Self::from_char(c, KeyPhase::Up) }

    /// Key with no resolved payload (dead keys, modifiers on some platforms)
    pub fn bare(key_id: u64, phase: KeyPhase) -> Self {
        Self::new(key_id, phase, None)
    }

    pub fn is_down(&self) -> bool { self.phase == KeyPhase::Down }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_char_uses_code_point_as_identity() {
        let ev = RawKeyEvent::up('A');
        assert_eq!(ev.key_id, 65);
        assert_eq!(ev.phase, KeyPhase::Up);
        assert_eq!(ev.character.as_deref(), Some("A"));
    }

    #[test]
    fn named_keys_sit_above_printable_range() {
        assert!(KEY_ENTER > 255);
        assert!(KEY_TAB > 255);
        assert!(RawKeyEvent::bare(KEY_ENTER, KeyPhase::Down).character.is_none());
    }
}
