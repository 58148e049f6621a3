//! Configured key identities.
//!
//! A [`KeyIdentity`] is what configuration produces for each keystroke in a
//! binding: the advisory descriptor text plus the authoritative [`Chord`].
//! Identity (equality, hashing, ordering) is the chord alone.

use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
};

use crate::{Chord, Key, Modifiers, ParseError};

/// Opaque value a registration backend hands out for a live binding.
///
/// The engine stores it only to unregister the binding later.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct BackendHandle(u64);

impl BackendHandle {
    /// Wraps a backend-specific raw value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The backend-specific raw value.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Engine-side record of a live backend registration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Registration {
    /// Engine-assigned numeric registration id.
    pub id: u32,
    /// Backend value needed to unregister.
    pub handle: BackendHandle,
}

/// A configured keystroke: descriptor label plus physical chord.
#[derive(Clone, Debug)]
pub struct KeyIdentity {
    /// Descriptor text as written in configuration (advisory only).
    label: String,
    /// Physical chord; the identity of this value.
    chord: Chord,
    /// Present while the chord is registered with a backend.
    registration: Option<Registration>,
}

impl KeyIdentity {
    /// Parses a textual descriptor such as `"cmd+shift+k"`.
    pub fn parse(descriptor: &str) -> Result<Self, ParseError> {
        let chord = Chord::parse(descriptor)?;
        Ok(Self {
            label: descriptor.trim().to_string(),
            chord,
            registration: None,
        })
    }

    /// Builds an identity directly from a chord, labelled canonically.
    pub fn from_chord(chord: Chord) -> Self {
        Self {
            label: chord.to_string_canonical(),
            chord,
            registration: None,
        }
    }

    /// The descriptor text this identity was built from.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The physical chord.
    pub fn chord(&self) -> Chord {
        self.chord
    }

    /// The non-modifier key.
    pub fn key(&self) -> Key {
        self.chord.key
    }

    /// Platform keycode of the key.
    pub fn keycode(&self) -> u16 {
        self.chord.key.keycode()
    }

    /// Modifier mask (CoreGraphics layout).
    pub fn modifiers(&self) -> Modifiers {
        self.chord.modifiers
    }

    /// Carbon-style modifier encoding, for the registration boundary only.
    pub fn carbon_modifiers(&self) -> u32 {
        self.chord.modifiers.carbon()
    }

    /// Live registration, if any.
    pub fn registration(&self) -> Option<Registration> {
        self.registration
    }

    /// Attach a backend registration.
    pub fn attach(&mut self, registration: Registration) {
        self.registration = Some(registration);
    }

    /// Detach and return the backend registration.
    pub fn detach(&mut self) -> Option<Registration> {
        self.registration.take()
    }
}

impl From<Chord> for KeyIdentity {
    fn from(chord: Chord) -> Self {
        Self::from_chord(chord)
    }
}

impl PartialEq for KeyIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.chord == other.chord
    }
}

impl Eq for KeyIdentity {}

impl Hash for KeyIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.chord.hash(state);
    }
}

impl PartialOrd for KeyIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyIdentity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.chord.cmp(&other.chord)
    }
}

impl fmt::Display for KeyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}
