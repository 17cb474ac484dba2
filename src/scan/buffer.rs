// src/scan/buffer.rs  -  Pending characters + the single deferred finalize
use std::time::{Duration, Instant};

/// Cancellable deferred-finalize handle.
///
/// Holds at most one due time; `arm` replaces whatever was scheduled, so a
/// stale finalize can never survive a newer keystroke.
#[derive(Debug, Default)]
pub struct Deadline {
    due:        Option<Instant>,
    generation: u64,
}

impl Deadline {
    /// Cancel the current schedule (if any) and schedule a new one
    pub fn arm(&mut self, due: Instant) {
        self.cancel();
        self.generation += 1;
        self.due = Some(due);
    }

    pub fn cancel(&mut self) { self.due = None; }

    pub fn is_armed(&self) -> bool { self.due.is_some() }

    pub fn due(&self) -> Option<Instant> { self.due }

    /// Number of times this handle has been armed (diagnostics only)
    pub fn generation(&self) -> u64 { self.generation }

    /// Disarm and return true if the schedule has fallen due at `now`
    pub fn take_if_due(&mut self, now: Instant) -> bool {
        match self.due {
            Some(due) if now >= due => {
                self.due = None;
                true
            }
            _ => false,
        }
    }

    /// Like `take_if_due`, but only for a schedule strictly earlier than `at`.
    /// A keystroke landing exactly on the due time still belongs to the scan.
    pub fn take_if_due_before(&mut self, at: Instant) -> bool {
        match self.due {
            Some(due) if due < at => {
                self.due = None;
                true
            }
            _ => false,
        }
    }
}

/// Mutable scan state owned by exactly one aggregator
#[derive(Debug, Default)]
pub struct ScanBuffer {
    chars:     Vec<String>,
    last_at:   Option<Instant>,
    pub finalize: Deadline,
}

impl ScanBuffer {
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, ch: &str, at: Instant) {
        self.chars.push(ch.to_string());
        self.last_at = Some(at);
    }

    /// Gap between `now` and the previously accepted character
    pub fn gap_since_last(&self, now: Instant) -> Option<Duration> {
        self.last_at.map(|t| now.saturating_duration_since(t))
    }

    pub fn len(&self) -> usize { self.chars.len() }

    pub fn is_empty(&self) -> bool { self.chars.is_empty() }

    /// Last character of the last buffered payload
    pub fn last_char(&self) -> Option<char> {
        self.chars.last().and_then(|s| s.chars().last())
    }

    /// Remove the last character; an emptied payload is removed with it
    pub fn pop_char(&mut self) -> Option<char> {
        let last = self.chars.last_mut()?;
        let c = last.pop();
        if last.is_empty() {
            self.chars.pop();
        }
        c
    }

    pub fn joined(&self) -> String { self.chars.concat() }

    /// Drop buffered characters; the finalize schedule is left alone
    pub fn clear_chars(&mut self) { self.chars.clear(); }

    /// Empty everything, including the pending finalize
    pub fn reset(&mut self) {
        self.chars.clear();
        self.last_at = None;
        self.finalize.cancel();
    }
}
