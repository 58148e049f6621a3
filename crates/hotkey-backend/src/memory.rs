//! In-process registration backend.
//!
//! Behaves like the OS facility: chords claimed elsewhere are refused,
//! only registered chords are reported, and reports flow over a channel.
//! Synthetic key posts are recorded but never reported back, the same way
//! injected events are tagged and skipped by a real event tap.

use std::{
    collections::{HashMap, HashSet},
    mem,
};

use crossbeam_channel::{Receiver, Sender, unbounded};
use keycode::{BackendHandle, Chord, Modifiers};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::{Error, Event, EventKind, HotkeyBackend, Result};

/// A live registration held by the backend.
#[derive(Debug, Clone)]
struct Entry {
    /// Engine-assigned id.
    id: u32,
    /// Registered chord.
    chord: Chord,
    /// Carbon modifier bits supplied at registration.
    carbon: u32,
}

/// Mutable backend state.
#[derive(Debug, Default)]
struct Inner {
    /// Next raw handle value.
    next_handle: u64,
    /// Live registrations by handle.
    regs: HashMap<BackendHandle, Entry>,
    /// Reverse index chord -> handle.
    by_chord: HashMap<Chord, BackendHandle>,
    /// Chords claimed by "other processes".
    claimed: HashSet<Chord>,
    /// Suspension depth; while > 0 presses are inert.
    suspend: usize,
    /// Synthetic keys posted through this backend.
    posted: Vec<(Chord, EventKind)>,
    /// Total successful register calls.
    register_calls: usize,
    /// Total successful unregister calls.
    unregister_calls: usize,
}

impl Inner {
    /// Match a key press against live registrations.
    fn match_event(&self, chord: &Chord) -> Option<u32> {
        let handle = self.by_chord.get(chord)?;
        self.regs.get(handle).map(|e| e.id)
    }
}

/// Thread-safe in-memory [`HotkeyBackend`].
pub struct MemoryBackend {
    /// Shared state.
    inner: Mutex<Inner>,
    /// Event sender.
    tx: Sender<Event>,
    /// Event receiver; cloned out via [`MemoryBackend::events`].
    rx: Receiver<Event>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            inner: Mutex::new(Inner::default()),
            tx,
            rx,
        }
    }

    /// Receiver for events emitted by [`MemoryBackend::press`] and friends.
    pub fn events(&self) -> Receiver<Event> {
        self.rx.clone()
    }

    /// Mark a chord as owned by another process; registering it will conflict.
    pub fn claim(&self, chord: Chord) {
        self.inner.lock().claimed.insert(chord);
    }

    /// Release a chord previously passed to [`MemoryBackend::claim`].
    pub fn release(&self, chord: &Chord) {
        self.inner.lock().claimed.remove(chord);
    }

    /// Currently registered chords, sorted.
    pub fn active(&self) -> Vec<Chord> {
        let mut v: Vec<Chord> = self.inner.lock().by_chord.keys().copied().collect();
        v.sort();
        v
    }

    /// True if `chord` is currently registered.
    pub fn is_registered(&self, chord: &Chord) -> bool {
        self.inner.lock().by_chord.contains_key(chord)
    }

    /// Carbon modifier bits supplied when `chord` was registered.
    pub fn carbon_for(&self, chord: &Chord) -> Option<u32> {
        let g = self.inner.lock();
        let handle = g.by_chord.get(chord)?;
        g.regs.get(handle).map(|e| e.carbon)
    }

    /// (successful register calls, successful unregister calls).
    pub fn call_counts(&self) -> (usize, usize) {
        let g = self.inner.lock();
        (g.register_calls, g.unregister_calls)
    }

    /// Stop reporting presses until a matching [`MemoryBackend::resume`].
    pub fn suspend(&self) {
        self.inner.lock().suspend += 1;
    }

    /// Undo one [`MemoryBackend::suspend`].
    pub fn resume(&self) {
        let mut g = self.inner.lock();
        g.suspend = g.suspend.saturating_sub(1);
    }

    /// Report a KeyDown; returns the matched registration id, if any.
    pub fn key_down(&self, chord: Chord, repeat: bool) -> Option<u32> {
        self.emit(chord, EventKind::KeyDown, repeat)
    }

    /// Report a KeyUp; returns the matched registration id, if any.
    pub fn key_up(&self, chord: Chord) -> Option<u32> {
        self.emit(chord, EventKind::KeyUp, false)
    }

    /// Report a full press (down then up).
    pub fn press(&self, chord: Chord) -> Option<u32> {
        let id = self.key_down(chord, false);
        self.key_up(chord);
        id
    }

    /// Convenience: press from a raw keycode and CoreGraphics flag mask.
    pub fn press_raw(&self, keycode: u16, flags: u64) -> Option<u32> {
        let chord = Chord::from_raw(keycode, flags)?;
        self.press(chord)
    }

    /// Record a synthetic key event. Never reported back as an [`Event`].
    pub fn post(&self, chord: Chord, kind: EventKind) {
        trace!(chord = %chord, ?kind, "synthetic_post");
        self.inner.lock().posted.push((chord, kind));
    }

    /// Drain the synthetic keys posted so far.
    pub fn take_posted(&self) -> Vec<(Chord, EventKind)> {
        mem::take(&mut self.inner.lock().posted)
    }

    /// Route one event through the registration table.
    fn emit(&self, chord: Chord, kind: EventKind, repeat: bool) -> Option<u32> {
        let id = {
            let g = self.inner.lock();
            if g.suspend > 0 {
                trace!("backend_suspended_skipping_event");
                return None;
            }
            g.match_event(&chord)
        };
        let Some(id) = id else {
            trace!(chord = %chord, "unregistered_key_passthrough");
            return None;
        };
        let event = Event {
            id,
            chord,
            kind,
            repeat,
        };
        if let Err(e) = self.tx.send(event) {
            trace!(error = %e, "event_channel_closed");
        }
        Some(id)
    }
}

impl HotkeyBackend for MemoryBackend {
    fn register(&self, id: u32, chord: &Chord, carbon_modifiers: u32) -> Result<BackendHandle> {
        let mut g = self.inner.lock();
        if g.claimed.contains(chord) || g.by_chord.contains_key(chord) {
            debug!(chord = %chord, id, "register_conflict");
            return Err(Error::Conflict { chord: *chord });
        }
        debug_assert_eq!(Modifiers::from_carbon(carbon_modifiers), chord.modifiers);
        g.next_handle += 1;
        let handle = BackendHandle::new(g.next_handle);
        g.regs.insert(
            handle,
            Entry {
                id,
                chord: *chord,
                carbon: carbon_modifiers,
            },
        );
        g.by_chord.insert(*chord, handle);
        g.register_calls += 1;
        trace!(chord = %chord, id, handle = handle.raw(), "registered");
        Ok(handle)
    }

    fn unregister(&self, handle: BackendHandle) -> Result<()> {
        let mut g = self.inner.lock();
        let entry = g.regs.remove(&handle).ok_or(Error::InvalidHandle)?;
        g.by_chord.remove(&entry.chord);
        g.unregister_calls += 1;
        trace!(chord = %entry.chord, handle = handle.raw(), "unregistered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use keycode::Key;

    use super::*;

    fn chord(s: &str) -> Chord {
        Chord::parse(s).unwrap()
    }

    #[test]
    fn registered_chords_emit_events() {
        let b = MemoryBackend::new();
        let rx = b.events();
        let c = chord("cmd+k");
        b.register(5, &c, c.modifiers.carbon()).unwrap();
        assert_eq!(b.press(c), Some(5));
        let down = rx.try_recv().unwrap();
        assert_eq!(down.kind, EventKind::KeyDown);
        assert_eq!(down.id, 5);
        assert_eq!(rx.try_recv().unwrap().kind, EventKind::KeyUp);
    }

    #[test]
    fn events_queue_until_someone_listens() {
        let b = MemoryBackend::new();
        let c = chord("cmd+k");
        b.register(3, &c, c.modifiers.carbon()).unwrap();
        drop(b.events());
        assert_eq!(b.press(c), Some(3));
        let rx = b.events();
        assert_eq!(rx.try_recv().unwrap().id, 3);
        assert_eq!(rx.try_recv().unwrap().kind, EventKind::KeyUp);
    }

    #[test]
    fn unregistered_keys_pass_through() {
        let b = MemoryBackend::new();
        let rx = b.events();
        assert_eq!(b.press(chord("cmd+j")), None);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn claimed_and_duplicate_chords_conflict() {
        let b = MemoryBackend::new();
        let c = chord("ctrl+space");
        b.claim(c);
        assert_eq!(b.register(1, &c, 0x1000), Err(Error::Conflict { chord: c }));
        b.release(&c);
        b.register(1, &c, 0x1000).unwrap();
        assert_eq!(b.register(2, &c, 0x1000), Err(Error::Conflict { chord: c }));
    }

    #[test]
    fn unregister_rejects_unknown_handles() {
        let b = MemoryBackend::new();
        let c = Chord::bare(Key::F5);
        let h = b.register(1, &c, 0).unwrap();
        b.unregister(h).unwrap();
        assert_eq!(b.unregister(h), Err(Error::InvalidHandle));
        assert!(b.active().is_empty());
        assert_eq!(b.call_counts(), (1, 1));
    }

    #[test]
    fn suspension_and_synthetic_posts_are_silent() {
        let b = MemoryBackend::new();
        let rx = b.events();
        let c = chord("g");
        b.register(1, &c, 0).unwrap();
        b.suspend();
        assert_eq!(b.press(c), None);
        b.resume();
        b.post(c, EventKind::KeyDown);
        assert!(rx.try_recv().is_err());
        assert_eq!(b.take_posted(), vec![(c, EventKind::KeyDown)]);
        assert_eq!(b.press(c), Some(1));
    }
}
