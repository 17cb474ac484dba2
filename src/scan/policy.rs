// src/scan/policy.rs  -  When is a buffered keystroke burst a complete token?
use super::buffer::ScanBuffer;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TerminationMode {
    /// Quiet period ends the scan; short bursts are dropped as noise
    CountThreshold,
    /// A sentinel character as the last buffered char ends the scan
    TerminatorChar,
}

/// Strategy interface shared by both termination modes
pub trait TerminationPolicy: Send {
    /// Buffer an accepted character and (re)arm the finalize
    fn accept(&self, buf: &mut ScanBuffer, ch: &str, now: Instant, window: Duration);
    /// Runs when the finalize falls due; returns the token to report, if any
    fn finalize(&self, buf: &mut ScanBuffer) -> Option<String>;
    fn name(&self) -> &str;
}

// ── Count threshold ──────────────────────────────────────────────────────────
pub struct CountThreshold {
    /// Tokens must be strictly longer than this
    pub min_len: usize,
}

impl TerminationPolicy for CountThreshold {
    fn accept(&self, buf: &mut ScanBuffer, ch: &str, now: Instant, window: Duration) {
        if let Some(gap) = buf.gap_since_last(now) {
            if gap > window {
                log::debug!("[scan] gap {:?} > {:?} → dropping {} stale chars", gap, window, buf.len());
                buf.clear_chars();
            }
        }
        buf.push(ch, now);
        buf.finalize.arm(now + window);
    }

    fn finalize(&self, buf: &mut ScanBuffer) -> Option<String> {
        let token = (buf.len() > self.min_len).then(|| buf.joined());
        if token.is_none() && !buf.is_empty() {
            log::debug!("[scan] '{}' is {} chars (≤ {}) → noise", buf.joined(), buf.len(), self.min_len);
        }
        buf.reset();
        token
    }

    fn name(&self) -> &str { "count-threshold" }
}

// ── Terminator character ─────────────────────────────────────────────────────
pub struct TerminatorChar {
    pub sentinel: char,
}

impl TerminationPolicy for TerminatorChar {
    fn accept(&self, buf: &mut ScanBuffer, ch: &str, now: Instant, window: Duration) {
        buf.push(ch, now);
        buf.finalize.arm(now + window);
    }

    fn finalize(&self, buf: &mut ScanBuffer) -> Option<String> {
        // Payloads may carry several chars; only the final char counts
        if buf.last_char() != Some(self.sentinel) {
            // Incomplete: keep it until the next keystroke rearms the finalize
            log::debug!("[scan] no terminator yet, holding '{}'", buf.joined());
            return None;
        }
        buf.pop_char();
        let token = buf.joined();
        buf.reset();
        if token.is_empty() {
            log::debug!("[scan] bare terminator → ignored");
            return None;
        }
        Some(token)
    }

    fn name(&self) -> &str { "terminator-char" }
}

/// Factory for the configured mode
pub fn create_policy(mode: TerminationMode, min_len: usize, sentinel: char) -> Box<dyn TerminationPolicy> {
    match mode {
        TerminationMode::CountThreshold => Box::new(CountThreshold { min_len }),
        TerminationMode::TerminatorChar => Box::new(TerminatorChar { sentinel }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(100);

    fn ms(n: u64) -> Duration { Duration::from_millis(n) }

    fn feed(policy: &dyn TerminationPolicy, buf: &mut ScanBuffer, t0: Instant, chars: &[(&str, u64)]) {
        for (c, at) in chars {
            policy.accept(buf, c, t0 + ms(*at), WINDOW);
        }
    }

    #[test]
    fn count_policy_emits_above_floor() {
        let p = CountThreshold { min_len: 3 };
        let mut b = ScanBuffer::new();
        let t0 = Instant::now();
        feed(&p, &mut b, t0, &[("1", 0), ("2", 10), ("3", 20), ("4", 30)]);
        assert_eq!(b.finalize.due(), Some(t0 + ms(130)));
        assert_eq!(p.finalize(&mut b).as_deref(), Some("1234"));
        assert!(b.is_empty());
    }

    #[test]
    fn count_policy_drops_short_bursts() {
        let p = CountThreshold { min_len: 3 };
        let mut b = ScanBuffer::new();
        let t0 = Instant::now();
        feed(&p, &mut b, t0, &[("1", 0), ("2", 10), ("3", 20)]);
        assert_eq!(p.finalize(&mut b), None);
        assert!(b.is_empty());
    }

    #[test]
    fn count_policy_restarts_after_gap() {
        let p = CountThreshold { min_len: 3 };
        let mut b = ScanBuffer::new();
        let t0 = Instant::now();
        feed(&p, &mut b, t0, &[("1", 0), ("2", 10), ("3", 160), ("4", 170)]);
        assert_eq!(b.joined(), "34");
    }

    #[test]
    fn count_policy_gap_equal_to_window_is_kept() {
        let p = CountThreshold { min_len: 3 };
        let mut b = ScanBuffer::new();
        let t0 = Instant::now();
        feed(&p, &mut b, t0, &[("1", 0), ("2", 100)]);
        assert_eq!(b.joined(), "12");
    }

    #[test]
    fn terminator_policy_strips_sentinel() {
        let p = TerminatorChar { sentinel: 'm' };
        let mut b = ScanBuffer::new();
        let t0 = Instant::now();
        feed(&p, &mut b, t0, &[("A", 0), ("B", 5), ("C", 10), ("m", 15)]);
        assert_eq!(p.finalize(&mut b).as_deref(), Some("ABC"));
        assert!(b.is_empty());
    }

    #[test]
    fn terminator_policy_holds_incomplete_scan() {
        let p = TerminatorChar { sentinel: 'm' };
        let mut b = ScanBuffer::new();
        let t0 = Instant::now();
        feed(&p, &mut b, t0, &[("A", 0), ("B", 500)]);
        assert_eq!(p.finalize(&mut b), None);
        assert_eq!(b.joined(), "AB");
        // Completed later, across a long pause
        p.accept(&mut b, "m", t0 + ms(2000), WINDOW);
        assert_eq!(p.finalize(&mut b).as_deref(), Some("AB"));
    }

    #[test]
    fn terminator_policy_matches_end_of_multi_char_payload() {
        let p = TerminatorChar { sentinel: 'm' };
        let mut b = ScanBuffer::new();
        let t0 = Instant::now();
        feed(&p, &mut b, t0, &[("AB", 0), ("Cm", 5)]);
        assert_eq!(p.finalize(&mut b).as_deref(), Some("ABC"));
        assert!(b.is_empty());
    }

    #[test]
    fn terminator_policy_ignores_sentinel_inside_payload() {
        let p = TerminatorChar { sentinel: 'm' };
        let mut b = ScanBuffer::new();
        feed(&p, &mut b, Instant::now(), &[("A", 0), ("mx", 5)]);
        assert_eq!(p.finalize(&mut b), None);
        assert_eq!(b.joined(), "Amx");
    }

    #[test]
    fn terminator_policy_ignores_bare_sentinel() {
        let p = TerminatorChar { sentinel: 'm' };
        let mut b = ScanBuffer::new();
        p.accept(&mut b, "m", Instant::now(), WINDOW);
        assert_eq!(p.finalize(&mut b), None);
        assert!(b.is_empty());
    }

    #[test]
    fn factory_selects_mode() {
        assert_eq!(create_policy(TerminationMode::CountThreshold, 3, 'm').name(), "count-threshold");
        assert_eq!(create_policy(TerminationMode::TerminatorChar, 3, '\n').name(), "terminator-char");
    }
}
