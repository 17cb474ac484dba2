// src/source/demo.rs  -  Simulated keyboard-wedge scanner
//
// Every couple of seconds either "scans" a random 13-digit code at scanner
// speed or plays a few slow human keystrokes that the aggregator should
// reject.  Every scan ends with Enter, which the aggregator filters out; in
// terminator mode the configured sentinel is typed before it.

use super::KeySource;
use crate::event::{KeyPhase, RawKeyEvent, KEY_ENTER};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Typical wedge scanner keystroke pitch
pub const SCANNER_CHAR_GAP: Duration = Duration::from_millis(8);
/// How long each key is held
const KEY_HOLD: Duration = Duration::from_millis(3);

pub struct DemoScanner {
    queue:      VecDeque<(Instant, RawKeyEvent)>,
    next_burst: Instant,
    sentinel:   Option<char>,
    rng:        SmallRng,
}

impl DemoScanner {
    pub fn new(sentinel: Option<char>) -> Self {
        Self {
            queue:      VecDeque::new(),
            next_burst: Instant::now() + Duration::from_millis(800),
            sentinel,
            rng:        SmallRng::from_entropy(),
        }
    }

    fn schedule(&mut self, start: Instant) {
        let (events, end) = if self.rng.gen_bool(0.8) {
            let code: String = (0..13).map(|_| char::from(b'0' + self.rng.gen_range(0..10u8))).collect();
            log::debug!("[demo] scanning {code}");
            let events = scanner_burst(&code, start, SCANNER_CHAR_GAP, self.sentinel);
            let end = events.last().map(|(t, _)| *t).unwrap_or(start);
            (events, end)
        } else {
            let mut t = start;
            let mut events = Vec::new();
            for _ in 0..self.rng.gen_range(2..4) {
                let c = char::from(b'a' + self.rng.gen_range(0..26u8));
                events.extend(keystroke(c, t));
                t += Duration::from_millis(self.rng.gen_range(180..400));
            }
            log::debug!("[demo] human typing, {} keys", events.len() / 2);
            (events, t)
        };
        self.queue.extend(events);
        self.next_burst = end + Duration::from_millis(self.rng.gen_range(1200..3000));
    }
}

impl KeySource for DemoScanner {
    fn name(&self) -> &str { "Demo scanner" }

    fn poll(&mut self) -> Option<RawKeyEvent> {
        let now = Instant::now();
        if self.queue.is_empty() && now >= self.next_burst {
            self.schedule(now);
        }
        match self.queue.front() {
            Some((due, _)) if *due <= now => self.queue.pop_front().map(|(_, ev)| ev),
            _ => None,
        }
    }
}

/// Press + release of one printable key starting at `at`
fn keystroke(c: char, at: Instant) -> [(Instant, RawKeyEvent); 2] {
    [
        (at,            RawKeyEvent::from_char(c, KeyPhase::Down)),
        (at + KEY_HOLD, RawKeyEvent::from_char(c, KeyPhase::Up)),
    ]
}

/// Timed transitions a wedge scanner produces for `code`:
/// each char, then the optional sentinel, then Enter.
pub fn scanner_burst(
    code:     &str,
    start:    Instant,
    gap:      Duration,
    sentinel: Option<char>,
) -> Vec<(Instant, RawKeyEvent)> {
    let mut out = Vec::with_capacity((code.len() + 2) * 2);
    let mut t = start;
    for c in code.chars().chain(sentinel) {
        out.extend(keystroke(c, t));
        t += gap;
    }
    out.push((t,            RawKeyEvent::new(KEY_ENTER, KeyPhase::Down, Some("\n".into()))));
    out.push((t + KEY_HOLD, RawKeyEvent::new(KEY_ENTER, KeyPhase::Up,   Some("\n".into()))));
    out
}
