//! keycode: physical key identities for hotkey bindings.
//!
//! - `Key`: enum of macOS virtual keycodes.
//! - `Modifier` / `Modifiers`: modifier keys and the modifier mask, with the
//!   Carbon encoding used at the registration boundary.
//! - `Chord`: modifier mask plus key; the identity of a binding.
//! - `KeyIdentity`: a parsed descriptor (`"cmd+shift+k"`) with an optional
//!   live backend registration attached.
//!
//! Descriptor tokens: `Key::from_token`, `Key::token`,
//! `Modifier::from_token`, `Chord::parse`.

mod key;
pub use key::Key;

mod modifiers;
pub use modifiers::{Modifier, Modifiers};

mod chord;
pub use chord::Chord;

mod error;
pub use error::ParseError;

mod identity;
pub use identity::{BackendHandle, KeyIdentity, Registration};
