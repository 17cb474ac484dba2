// src/scan/aggregator.rs  -  Raw key events → barcode tokens
use super::buffer::ScanBuffer;
use super::hub::{KeyHub, Stamped, Tap};
use super::policy::{create_policy, TerminationPolicy};
use super::{ScanConfig, MAX_KEY_ID};
use crate::event::RawKeyEvent;
use std::time::Instant;

pub type TokenCallback = Box<dyn FnMut(String)>;

/// State machine: filtered keystrokes → timed buffer → token callback.
///
/// The aggregator never blocks and never spawns anything.  The host calls
/// [`pump`](Self::pump) from its event loop; queued keystrokes and the
/// pending finalize are both handled there, on the caller's thread, in
/// arrival order.
pub struct KeystrokeAggregator {
    config:   ScanConfig,
    policy:   Box<dyn TerminationPolicy>,
    buffer:   ScanBuffer,
    hub:      KeyHub,
    tap:      Option<Tap>,
    on_token: Option<TokenCallback>,
}

impl KeystrokeAggregator {
    pub fn new(config: ScanConfig, hub: KeyHub) -> Self {
        let policy = create_policy(config.mode, config.min_len, config.terminator);
        Self {
            config,
            policy,
            buffer:   ScanBuffer::new(),
            hub,
            tap:      None,
            on_token: None,
        }
    }

    /// Attach one tap to the hub and report completed scans to `on_token`
    pub fn start(&mut self, on_token: impl FnMut(String) + 'static) {
        if self.tap.is_some() {
            log::warn!("[scan] start() while already listening → re-attaching");
            self.stop();
        }
        let tap = self.hub.subscribe();
        log::info!(
            "[scan] listening on tap {} ({}, window={:?}, phase={})",
            tap.id, self.policy.name(), self.config.window,
            if self.config.use_key_down { "down" } else { "up" }
        );
        self.tap = Some(tap);
        self.on_token = Some(Box::new(on_token));
    }

    /// Detach from the hub and cancel the pending finalize.
    /// Nothing is reported after this returns.
    pub fn stop(&mut self) {
        if let Some(tap) = self.tap.take() {
            self.hub.unsubscribe(tap.id);
            log::info!("[scan] tap {} stopped", tap.id);
        }
        self.buffer.reset();
        self.on_token = None;
    }

    pub fn is_listening(&self) -> bool { self.tap.is_some() }

    /// Characters buffered for the scan in progress
    pub fn pending(&self) -> String { self.buffer.joined() }

    /// When the pending finalize will run, if one is scheduled
    pub fn next_deadline(&self) -> Option<Instant> { self.buffer.finalize.due() }

    pub fn config(&self) -> &ScanConfig { &self.config }

    /// `pump_at` with the current time
    pub fn pump(&mut self) -> usize { self.pump_at(Instant::now()) }

    /// Process everything queued on the tap, then any finalize due at `now`.
    /// Returns the number of tokens reported.
    pub fn pump_at(&mut self, now: Instant) -> usize {
        let queued: Vec<Stamped> = match &self.tap {
            Some(tap) => tap.rx.try_iter().collect(),
            None      => return 0,
        };
        let mut emitted = 0;
        for (ev, at) in queued {
            // A finalize that fell due strictly before this keystroke runs first
            if self.buffer.finalize.take_if_due_before(at) {
                emitted += self.finalize();
            }
            self.handle(&ev, at);
        }
        if self.buffer.finalize.take_if_due(now) {
            emitted += self.finalize();
        }
        emitted
    }

    fn handle(&mut self, ev: &RawKeyEvent, at: Instant) {
        let Some(ch) = self.accept(ev) else { return };
        self.policy.accept(&mut self.buffer, ch, at, self.config.window);
        log::debug!(
            "[scan] accept {:?} (key {:#x}) → {} pending, finalize #{}",
            ch, ev.key_id, self.buffer.len(), self.buffer.finalize.generation()
        );
    }

    /// Filter chain: identity → phase → payload
    fn accept<'e>(&self, ev: &'e RawKeyEvent) -> Option<&'e str> {
        if ev.key_id > MAX_KEY_ID {
            return None;
        }
        if ev.is_down() != self.config.use_key_down {
            return None;
        }
        ev.character.as_deref().filter(|c| !c.is_empty())
    }

    fn finalize(&mut self) -> usize {
        let Some(token) = self.policy.finalize(&mut self.buffer) else { return 0 };
        log::info!("[scan] token '{}' ({} chars)", token, token.chars().count());
        match self.on_token.as_mut() {
            Some(cb) => { cb(token); 1 }
            None     => 0,
        }
    }
}

impl Drop for KeystrokeAggregator {
    fn drop(&mut self) { self.stop(); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{KeyPhase, KEY_ENTER};
    use crate::scan::TerminationMode;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    fn ms(n: u64) -> Duration { Duration::from_millis(n) }

    fn started(config: ScanConfig) -> (KeyHub, KeystrokeAggregator, Rc<RefCell<Vec<String>>>) {
        let hub = KeyHub::new();
        let mut agg = KeystrokeAggregator::new(config, hub.clone());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        agg.start(move |t| sink.borrow_mut().push(t));
        (hub, agg, seen)
    }

    #[test]
    fn finalize_waits_for_quiet_window() {
        let (hub, mut agg, seen) = started(ScanConfig::default());
        let t0 = Instant::now();
        for (i, c) in "12345".chars().enumerate() {
            hub.dispatch_at(&RawKeyEvent::up(c), t0 + ms(10 * i as u64));
        }
        assert_eq!(agg.pump_at(t0 + ms(139)), 0);
        assert_eq!(agg.pending(), "12345");
        assert_eq!(agg.next_deadline(), Some(t0 + ms(140)));
        assert_eq!(agg.pump_at(t0 + ms(140)), 1);
        assert_eq!(*seen.borrow(), vec!["12345".to_string()]);
        assert!(agg.next_deadline().is_none());
    }

    #[test]
    fn gap_equal_to_window_stays_in_one_scan() {
        let (hub, mut agg, seen) = started(ScanConfig::default());
        let t0 = Instant::now();
        for (c, at) in [('1', 0), ('2', 10), ('3', 110), ('4', 120), ('5', 130)] {
            hub.dispatch_at(&RawKeyEvent::up(c), t0 + ms(at));
        }
        agg.pump_at(t0 + ms(5000));
        assert_eq!(*seen.borrow(), vec!["12345".to_string()]);
    }

    #[test]
    fn gap_equal_to_window_across_pumps() {
        let (hub, mut agg, seen) = started(ScanConfig::default());
        let t0 = Instant::now();
        for (c, at) in [('1', 0), ('2', 10)] {
            hub.dispatch_at(&RawKeyEvent::up(c), t0 + ms(at));
        }
        agg.pump_at(t0 + ms(20));
        for (c, at) in [('3', 110), ('4', 120)] {
            hub.dispatch_at(&RawKeyEvent::up(c), t0 + ms(at));
        }
        agg.pump_at(t0 + ms(1000));
        assert_eq!(*seen.borrow(), vec!["1234".to_string()]);
    }

    #[test]
    fn keystrokes_across_pumps_keep_accumulating() {
        let (hub, mut agg, seen) = started(ScanConfig::default());
        let t0 = Instant::now();
        for (i, c) in "ABCD".chars().enumerate() {
            let at = t0 + ms(30 * i as u64);
            hub.dispatch_at(&RawKeyEvent::up(c), at);
            agg.pump_at(at + ms(5));
        }
        agg.pump_at(t0 + ms(500));
        assert_eq!(*seen.borrow(), vec!["ABCD".to_string()]);
    }

    #[test]
    fn wrong_phase_is_ignored() {
        let (hub, mut agg, seen) = started(ScanConfig::default());
        let t0 = Instant::now();
        for c in "123456".chars() {
            hub.dispatch_at(&RawKeyEvent::down(c), t0);
        }
        agg.pump_at(t0 + ms(1000));
        assert_eq!(agg.pending(), "");
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn key_down_configuration_reads_press_events() {
        let config = ScanConfig { use_key_down: true, ..ScanConfig::default() };
        let (hub, mut agg, seen) = started(config);
        let t0 = Instant::now();
        for c in "9876".chars() {
            hub.dispatch_at(&RawKeyEvent::down(c), t0);
            hub.dispatch_at(&RawKeyEvent::up(c), t0);
        }
        agg.pump_at(t0 + ms(100));
        assert_eq!(*seen.borrow(), vec!["9876".to_string()]);
    }

    #[test]
    fn identities_above_255_are_ignored() {
        let (hub, mut agg, seen) = started(ScanConfig::default());
        let t0 = Instant::now();
        for _ in 0..5 {
            hub.dispatch_at(&RawKeyEvent::new(KEY_ENTER, KeyPhase::Up, Some("\n".into())), t0);
            hub.dispatch_at(&RawKeyEvent::new(0x100, KeyPhase::Up, Some("x".into())), t0);
        }
        agg.pump_at(t0 + ms(1000));
        assert!(seen.borrow().is_empty());
        assert!(agg.next_deadline().is_none());
    }

    #[test]
    fn missing_payload_leaves_state_untouched() {
        let (hub, mut agg, _seen) = started(ScanConfig::default());
        let t0 = Instant::now();
        hub.dispatch_at(&RawKeyEvent::bare(b'a' as u64, KeyPhase::Up), t0);
        hub.dispatch_at(&RawKeyEvent::new(b'b' as u64, KeyPhase::Up, Some(String::new())), t0);
        agg.pump_at(t0);
        assert_eq!(agg.pending(), "");
        assert!(agg.next_deadline().is_none());
    }

    #[test]
    fn stop_mid_scan_suppresses_callback() {
        let (hub, mut agg, seen) = started(ScanConfig::default());
        let t0 = Instant::now();
        for c in "12345".chars() {
            hub.dispatch_at(&RawKeyEvent::up(c), t0);
        }
        agg.pump_at(t0);
        assert!(agg.next_deadline().is_some());
        agg.stop();
        assert!(!agg.is_listening());
        assert_eq!(hub.tap_count(), 0);
        hub.dispatch_at(&RawKeyEvent::up('6'), t0);
        assert_eq!(agg.pump_at(t0 + ms(1000)), 0);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn stop_when_idle_is_harmless() {
        let hub = KeyHub::new();
        let mut agg = KeystrokeAggregator::new(ScanConfig::default(), hub);
        agg.stop();
        agg.stop();
        assert_eq!(agg.pump(), 0);
    }

    #[test]
    fn double_start_keeps_a_single_tap() {
        let (hub, mut agg, seen) = started(ScanConfig::default());
        let sink = Rc::clone(&seen);
        agg.start(move |t| sink.borrow_mut().push(format!("second:{t}")));
        assert_eq!(hub.tap_count(), 1);
        let t0 = Instant::now();
        for c in "ABCDE".chars() {
            hub.dispatch_at(&RawKeyEvent::up(c), t0);
        }
        agg.pump_at(t0 + ms(100));
        assert_eq!(*seen.borrow(), vec!["second:ABCDE".to_string()]);
    }

    #[test]
    fn drop_detaches_from_hub() {
        let hub = KeyHub::new();
        {
            let mut agg = KeystrokeAggregator::new(ScanConfig::default(), hub.clone());
            agg.start(|_| {});
            assert_eq!(hub.tap_count(), 1);
        }
        assert_eq!(hub.tap_count(), 0);
    }

    #[test]
    fn terminator_mode_holds_until_sentinel() {
        let config = ScanConfig { mode: TerminationMode::TerminatorChar, ..ScanConfig::default() };
        let (hub, mut agg, seen) = started(config);
        let t0 = Instant::now();
        hub.dispatch_at(&RawKeyEvent::up('A'), t0);
        hub.dispatch_at(&RawKeyEvent::up('B'), t0 + ms(10));
        agg.pump_at(t0 + ms(400));
        assert_eq!(agg.pending(), "AB");
        assert!(seen.borrow().is_empty());
        hub.dispatch_at(&RawKeyEvent::up('m'), t0 + ms(500));
        agg.pump_at(t0 + ms(600));
        assert_eq!(*seen.borrow(), vec!["AB".to_string()]);
    }
}
