// src/source/evdev.rs  -  HID keyboard-wedge scanner read from /dev/input
//
// Reads key transitions straight from the scanner's input device, so the
// scanner works even when the terminal has no focus.  With `grab` the
// scanner's keystrokes no longer reach other programs.
//
// Runtime permission: add yourself to the `input` group, or install a udev rule.

use super::KeySource;
use crate::event::{KeyPhase, RawKeyEvent, KEY_ENTER, KEY_TAB, NON_PRINTABLE_BASE};
use anyhow::{anyhow, Context, Result};
use evdev::{Device, EventType, Key};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Device-name fragments that identify a scanner when no path is given
const SCANNER_NAME_HINTS: &[&str] = &["scanner", "barcode", "honeywell", "symbol", "datalogic", "newland"];

type Queue = Arc<Mutex<VecDeque<RawKeyEvent>>>;

pub struct EvdevScanner {
    queue:   Queue,
    name:    String,
    _reader: thread::JoinHandle<()>,
}

impl EvdevScanner {
    /// Open `path` (empty = first device whose name looks like a scanner)
    pub fn open(path: &str, grab: bool) -> Result<Self> {
        let (path, mut device) = if path.is_empty() {
            find_scanner().ok_or_else(|| anyhow!(
                "No scanner-like input device found.\n  \
                 Pass --device /dev/input/by-id/…-event-kbd\n  \
                 Run `scan-wedge --list-devices` to see all input devices."
            ))?
        } else {
            let device = Device::open(path)
                .with_context(|| format!("Opening input device {path} (are you in the `input` group?)"))?;
            (PathBuf::from(path), device)
        };

        if grab {
            device.grab()
                .with_context(|| format!("Grabbing input device {}", path.display()))?;
        }

        let name = format!("evdev {} \"{}\"", path.display(), device.name().unwrap_or("?"));
        log::info!("[evdev] Opened {}{}", name, if grab { " (grabbed)" } else { "" });

        let queue: Queue = Arc::new(Mutex::new(VecDeque::new()));
        let queue_rd = Arc::clone(&queue);
        let handle = thread::spawn(move || evdev_reader(device, queue_rd));

        Ok(Self { queue, name, _reader: handle })
    }
}

impl KeySource for EvdevScanner {
    fn name(&self) -> &str { &self.name }

    fn poll(&mut self) -> Option<RawKeyEvent> {
        self.queue.lock().ok()?.pop_front()
    }
}

fn looks_like_scanner(device: &Device) -> bool {
    let name = device.name().unwrap_or("").to_lowercase();
    let is_keyboard = device.supported_keys().is_some_and(|k| k.contains(Key::KEY_ENTER));
    is_keyboard && SCANNER_NAME_HINTS.iter().any(|h| name.contains(h))
}

fn find_scanner() -> Option<(PathBuf, Device)> {
    evdev::enumerate().find(|(_, d)| looks_like_scanner(d))
}

/// Shift / Caps Lock state needed to resolve characters
#[derive(Default)]
pub struct Modifiers {
    left_shift:  bool,
    right_shift: bool,
    caps_lock:   bool,
}

impl Modifiers {
    /// Update from a key transition; returns true if it was a modifier
    pub fn update(&mut self, key: Key, value: i32) -> bool {
        match key {
            Key::KEY_LEFTSHIFT  => self.left_shift  = value != 0,
            Key::KEY_RIGHTSHIFT => self.right_shift = value != 0,
            Key::KEY_CAPSLOCK   => { if value == 1 { self.caps_lock = !self.caps_lock; } }
            _ => return false,
        }
        true
    }

    fn shifted(&self) -> bool { self.left_shift || self.right_shift }
}

fn evdev_reader(mut device: Device, queue: Queue) {
    let mut mods = Modifiers::default();
    loop {
        let events: Vec<_> = match device.fetch_events() {
            Ok(evs) => evs.collect(),
            Err(e) => {
                log::error!("[evdev] read error: {e}");
                thread::sleep(Duration::from_millis(250));
                continue;
            }
        };
        let Ok(mut q) = queue.lock() else { return };
        for ev in events {
            if ev.event_type() != EventType::KEY {
                continue;
            }
            if let Some(raw) = translate(Key::new(ev.code()), ev.value(), &mut mods) {
                q.push_back(raw);
            }
        }
    }
}

/// Key code + value (0 release, 1 press, 2 autorepeat) → raw transition
pub fn translate(key: Key, value: i32, mods: &mut Modifiers) -> Option<RawKeyEvent> {
    let phase = match value {
        0     => KeyPhase::Up,
        1 | 2 => KeyPhase::Down,
        _     => return None,
    };
    if mods.update(key, value) {
        return Some(RawKeyEvent::bare(NON_PRINTABLE_BASE + key.code() as u64, phase));
    }
    let ev = match key {
        Key::KEY_ENTER | Key::KEY_KPENTER => RawKeyEvent::new(KEY_ENTER, phase, Some("\n".into())),
        Key::KEY_TAB => RawKeyEvent::new(KEY_TAB, phase, Some("\t".into())),
        _ => match key_to_char(key, mods) {
            Some(c) => RawKeyEvent::from_char(c, phase),
            None    => RawKeyEvent::bare(NON_PRINTABLE_BASE + key.code() as u64, phase),
        },
    };
    Some(ev)
}

/// US layout, which is what scanners emulate unless reprogrammed
fn key_to_char(key: Key, mods: &Modifiers) -> Option<char> {
    let letter = |lower: char| {
        if mods.shifted() != mods.caps_lock { lower.to_ascii_uppercase() } else { lower }
    };
    let pair = |plain: char, shifted: char| if mods.shifted() { shifted } else { plain };
    let c = match key {
        Key::KEY_1 => pair('1', '!'),
        Key::KEY_2 => pair('2', '@'),
        Key::KEY_3 => pair('3', '#'),
        Key::KEY_4 => pair('4', '$'),
        Key::KEY_5 => pair('5', '%'),
        Key::KEY_6 => pair('6', '^'),
        Key::KEY_7 => pair('7', '&'),
        Key::KEY_8 => pair('8', '*'),
        Key::KEY_9 => pair('9', '('),
        Key::KEY_0 => pair('0', ')'),
        Key::KEY_A => letter('a'),
        Key::KEY_B => letter('b'),
        Key::KEY_C => letter('c'),
        Key::KEY_D => letter('d'),
        Key::KEY_E => letter('e'),
        Key::KEY_F => letter('f'),
        Key::KEY_G => letter('g'),
        Key::KEY_H => letter('h'),
        Key::KEY_I => letter('i'),
        Key::KEY_J => letter('j'),
        Key::KEY_K => letter('k'),
        Key::KEY_L => letter('l'),
        Key::KEY_M => letter('m'),
        Key::KEY_N => letter('n'),
        Key::KEY_O => letter('o'),
        Key::KEY_P => letter('p'),
        Key::KEY_Q => letter('q'),
        Key::KEY_R => letter('r'),
        Key::KEY_S => letter('s'),
        Key::KEY_T => letter('t'),
        Key::KEY_U => letter('u'),
        Key::KEY_V => letter('v'),
        Key::KEY_W => letter('w'),
        Key::KEY_X => letter('x'),
        Key::KEY_Y => letter('y'),
        Key::KEY_Z => letter('z'),
        Key::KEY_SPACE      => ' ',
        Key::KEY_APOSTROPHE => pair('\'', '"'),
        Key::KEY_EQUAL      => pair('=', '+'),
        Key::KEY_COMMA      => pair(',', '<'),
        Key::KEY_MINUS      => pair('-', '_'),
        Key::KEY_DOT        => pair('.', '>'),
        Key::KEY_SLASH      => pair('/', '?'),
        Key::KEY_BACKSLASH  => pair('\\', '|'),
        Key::KEY_SEMICOLON  => pair(';', ':'),
        Key::KEY_LEFTBRACE  => pair('[', '{'),
        Key::KEY_RIGHTBRACE => pair(']', '}'),
        Key::KEY_GRAVE      => pair('`', '~'),
        Key::KEY_KP0 => '0',
        Key::KEY_KP1 => '1',
        Key::KEY_KP2 => '2',
        Key::KEY_KP3 => '3',
        Key::KEY_KP4 => '4',
        Key::KEY_KP5 => '5',
        Key::KEY_KP6 => '6',
        Key::KEY_KP7 => '7',
        Key::KEY_KP8 => '8',
        Key::KEY_KP9 => '9',
        _ => return None,
    };
    Some(c)
}

// ── List input devices (for --list-devices) ──────────────────────────────────

pub fn list_input_devices() -> Vec<String> {
    evdev::enumerate()
        .filter(|(_, d)| d.supported_keys().is_some_and(|k| k.contains(Key::KEY_ENTER)))
        .map(|(path, d)| format!(
            "Input {}  \"{}\"{}",
            path.display(),
            d.name().unwrap_or("?"),
            if looks_like_scanner(&d) { "  [scanner?]" } else { "" }
        ))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_selects_upper_symbols() {
        let mut mods = Modifiers::default();
        assert_eq!(translate(Key::KEY_1, 1, &mut mods), Some(RawKeyEvent::down('1')));
        translate(Key::KEY_LEFTSHIFT, 1, &mut mods);
        assert_eq!(translate(Key::KEY_1, 0, &mut mods), Some(RawKeyEvent::up('!')));
        assert_eq!(translate(Key::KEY_A, 1, &mut mods), Some(RawKeyEvent::down('A')));
    }

    #[test]
    fn caps_lock_toggles_letters_only() {
        let mut mods = Modifiers::default();
        translate(Key::KEY_CAPSLOCK, 1, &mut mods);
        translate(Key::KEY_CAPSLOCK, 0, &mut mods);
        assert_eq!(translate(Key::KEY_B, 1, &mut mods), Some(RawKeyEvent::down('B')));
        assert_eq!(translate(Key::KEY_2, 1, &mut mods), Some(RawKeyEvent::down('2')));
    }

    #[test]
    fn modifiers_and_enter_stay_out_of_range() {
        let mut mods = Modifiers::default();
        let shift = translate(Key::KEY_LEFTSHIFT, 1, &mut mods).unwrap();
        assert!(shift.key_id > 255 && shift.character.is_none());
        assert_eq!(translate(Key::KEY_ENTER, 0, &mut mods).unwrap().key_id, KEY_ENTER);
    }

    #[test]
    fn autorepeat_is_a_press() {
        let mut mods = Modifiers::default();
        assert_eq!(translate(Key::KEY_9, 2, &mut mods).unwrap().phase, KeyPhase::Down);
    }
}
