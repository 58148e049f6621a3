//! Boundary to the OS-level global hotkey registration facility.
//!
//! The engine never talks to the OS directly. It registers chords through
//! [`HotkeyBackend`] and receives [`Event`]s for registered chords. Keys that
//! are not registered are never reported and reach the foreground app
//! untouched.
//!
//! [`MemoryBackend`] is a complete in-process implementation used by tests
//! and tooling.

mod error;
mod memory;

pub use error::{Error, Result};
pub use keycode::BackendHandle;
use keycode::Chord;
pub use memory::MemoryBackend;

/// Kind of key event reported by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Key pressed.
    KeyDown,
    /// Key released.
    KeyUp,
}

/// A key event for a registered binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Registration id the binding was registered under.
    pub id: u32,
    /// The chord that matched.
    pub chord: Chord,
    /// Down or up.
    pub kind: EventKind,
    /// True for OS auto-repeat KeyDown events.
    pub repeat: bool,
}

/// A global hotkey registration facility.
///
/// Calls are synchronous and may be slow; callers serialize them.
pub trait HotkeyBackend: Send + Sync {
    /// Register `chord` under the engine-assigned `id`.
    ///
    /// `carbon_modifiers` is the Carbon encoding of the chord's modifiers,
    /// for backends built on the Carbon hotkey API. Fails with
    /// [`Error::Conflict`] if the chord is already claimed.
    fn register(&self, id: u32, chord: &Chord, carbon_modifiers: u32) -> Result<BackendHandle>;

    /// Remove a registration previously returned by [`HotkeyBackend::register`].
    fn unregister(&self, handle: BackendHandle) -> Result<()>;
}
