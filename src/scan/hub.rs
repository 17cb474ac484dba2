// src/scan/hub.rs  -  Injectable raw key event source (broadcast tap registry)
//
// Hosts feed every platform key transition into a KeyHub; each subscriber
// gets its own timestamped copy over a channel.  Taps only observe: nothing
// a subscriber does can stop another subscriber (or the host itself) from
// seeing the event.
use crate::event::RawKeyEvent;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

pub type TapId = u64;

/// A key event together with the moment the hub received it
pub type Stamped = (RawKeyEvent, Instant);

/// Receiving end of one subscription
pub struct Tap {
    pub id: TapId,
    pub rx: Receiver<Stamped>,
}

#[derive(Default)]
struct Registry {
    next_id: TapId,
    taps:    Vec<(TapId, Sender<Stamped>)>,
}

/// Cheap-to-clone handle; clones share one registry
#[derive(Clone, Default)]
pub struct KeyHub {
    inner: Arc<Mutex<Registry>>,
}

impl KeyHub {
    pub fn new() -> Self { Self::default() }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        // A panicking subscriber cannot leave the tap list half-written
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn subscribe(&self) -> Tap {
        let (tx, rx) = mpsc::channel();
        let mut reg = self.registry();
        reg.next_id += 1;
        let id = reg.next_id;
        reg.taps.push((id, tx));
        log::debug!("[hub] tap {} attached ({} total)", id, reg.taps.len());
        Tap { id, rx }
    }

    /// Detach one tap; other taps are unaffected.  Unknown ids are ignored.
    pub fn unsubscribe(&self, id: TapId) {
        let mut reg = self.registry();
        let before = reg.taps.len();
        reg.taps.retain(|(tid, _)| *tid != id);
        if reg.taps.len() != before {
            log::debug!("[hub] tap {} detached ({} left)", id, reg.taps.len());
        }
    }

    /// Broadcast an event received now
    pub fn dispatch(&self, ev: &RawKeyEvent) -> usize {
        self.dispatch_at(ev, Instant::now())
    }

    /// Broadcast an event stamped with its arrival time.
    /// Returns the number of taps it reached.
    pub fn dispatch_at(&self, ev: &RawKeyEvent, at: Instant) -> usize {
        let mut reg = self.registry();
        // A failed send means the subscriber was dropped without unsubscribing
        reg.taps.retain(|(id, tx)| {
            let alive = tx.send((ev.clone(), at)).is_ok();
            if !alive { log::debug!("[hub] pruning dead tap {}", id); }
            alive
        });
        reg.taps.len()
    }

    /// Broadcast events gathered from several readers, oldest stamp first.
    /// Events with equal stamps keep their order.
    pub fn dispatch_batch(&self, mut batch: Vec<Stamped>) {
        batch.sort_by_key(|(_, at)| *at);
        for (ev, at) in &batch {
            self.dispatch_at(ev, *at);
        }
    }

    pub fn tap_count(&self) -> usize { self.registry().taps.len() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tap_receives_every_event() {
        let hub = KeyHub::new();
        let a = hub.subscribe();
        let b = hub.subscribe();
        assert_eq!(hub.dispatch(&RawKeyEvent::up('x')), 2);
        assert_eq!(a.rx.try_recv().map(|(e, _)| e), Ok(RawKeyEvent::up('x')));
        assert_eq!(b.rx.try_recv().map(|(e, _)| e), Ok(RawKeyEvent::up('x')));
    }

    #[test]
    fn unsubscribe_only_detaches_that_tap() {
        let hub = KeyHub::new();
        let a = hub.subscribe();
        let b = hub.subscribe();
        hub.unsubscribe(a.id);
        hub.dispatch(&RawKeyEvent::down('1'));
        assert!(a.rx.try_recv().is_err());
        assert!(b.rx.try_recv().is_ok());
        assert_eq!(hub.tap_count(), 1);
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let hub = KeyHub::new();
        let a = hub.subscribe();
        let _b = hub.subscribe();
        drop(a);
        assert_eq!(hub.dispatch(&RawKeyEvent::up('1')), 1);
    }

    #[test]
    fn batch_is_delivered_in_stamp_order() {
        let hub = KeyHub::new();
        let tap = hub.subscribe();
        let t0 = Instant::now();
        let later = t0 + std::time::Duration::from_millis(40);
        // Terminal key read late, source events queued earlier
        hub.dispatch_batch(vec![
            (RawKeyEvent::up('k'), later),
            (RawKeyEvent::up('1'), t0),
            (RawKeyEvent::up('2'), t0),
        ]);
        let got: Vec<Stamped> = tap.rx.try_iter().collect();
        assert_eq!(got, vec![
            (RawKeyEvent::up('1'), t0),
            (RawKeyEvent::up('2'), t0),
            (RawKeyEvent::up('k'), later),
        ]);
    }

    #[test]
    fn clones_share_registry() {
        let hub = KeyHub::new();
        let host_side = hub.clone();
        let tap = hub.subscribe();
        let at = Instant::now();
        host_side.dispatch_at(&RawKeyEvent::up('z'), at);
        assert_eq!(tap.rx.try_recv(), Ok((RawKeyEvent::up('z'), at)));
    }
}
