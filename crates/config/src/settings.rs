//! Engine-wide settings and the resolved chord policy.

use std::time::Duration;

use keycode::{Chord, Key};
use serde::{Deserialize, Serialize};

use crate::{Error, defaults::*};

/// User-facing engine settings.
///
/// Every field has a default, so `()` is a valid settings document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Keep only bindings for the focused app (plus globals) registered.
    #[serde(default = "default_enable_dynamic_registration")]
    pub enable_dynamic_registration: bool,
    /// Allow multi-key chords to wait for a follow-up key.
    #[serde(default = "default_enable_chord_timer")]
    pub enable_chord_timer: bool,
    /// Milliseconds allowed between consecutive chord keys.
    #[serde(default = "default_chord_timeout_ms")]
    pub chord_timeout_ms: u64,
    /// Descriptor of the key that cancels a pending chord. `None` disables.
    #[serde(default = "default_chord_escape")]
    pub chord_escape: Option<String>,
    /// Consecutive escape presses required to cancel. Zero is treated as one.
    #[serde(default = "default_chord_escape_key_count")]
    pub chord_escape_key_count: u32,
    /// Fire a pending standalone node when its chord window expires.
    #[serde(default)]
    pub commit_on_timeout: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enable_dynamic_registration: ENABLE_DYNAMIC_REGISTRATION,
            enable_chord_timer: ENABLE_CHORD_TIMER,
            chord_timeout_ms: CHORD_TIMEOUT_MS,
            chord_escape: default_chord_escape(),
            chord_escape_key_count: CHORD_ESCAPE_KEY_COUNT,
            commit_on_timeout: false,
        }
    }
}

impl Settings {
    /// Resolve descriptors and durations into a [`ChordPolicy`].
    pub fn policy(&self) -> Result<ChordPolicy, Error> {
        let escape = match &self.chord_escape {
            Some(s) => Some(Chord::parse(s).map_err(|source| Error::Key {
                app: None,
                binding: 0,
                source,
            })?),
            None => None,
        };
        Ok(ChordPolicy {
            dynamic_registration: self.enable_dynamic_registration,
            chord_timer: self.enable_chord_timer,
            timeout: Duration::from_millis(self.chord_timeout_ms),
            escape,
            escape_count: self.chord_escape_key_count.max(1),
            commit_on_timeout: self.commit_on_timeout,
        })
    }
}

/// Resolved engine policy, consulted once per event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChordPolicy {
    /// Track the focused app when choosing registrations.
    pub dynamic_registration: bool,
    /// Chords may wait for continuation keys.
    pub chord_timer: bool,
    /// Window between consecutive chord keys.
    pub timeout: Duration,
    /// Chord that cancels a pending wait.
    pub escape: Option<Chord>,
    /// Consecutive escape presses required (always at least one).
    pub escape_count: u32,
    /// Fire a pending standalone node on expiry.
    pub commit_on_timeout: bool,
}

impl Default for ChordPolicy {
    fn default() -> Self {
        Self {
            dynamic_registration: ENABLE_DYNAMIC_REGISTRATION,
            chord_timer: ENABLE_CHORD_TIMER,
            timeout: Duration::from_millis(CHORD_TIMEOUT_MS),
            escape: Some(Chord::bare(Key::Escape)),
            escape_count: CHORD_ESCAPE_KEY_COUNT,
            commit_on_timeout: false,
        }
    }
}

impl ChordPolicy {
    /// True if `chord` is the configured escape key.
    pub fn is_escape(&self, chord: &Chord) -> bool {
        self.escape.as_ref() == Some(chord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve_to_default_policy() {
        let p = Settings::default().policy().unwrap();
        assert_eq!(p, ChordPolicy::default());
        assert!(p.is_escape(&Chord::bare(Key::Escape)));
    }

    #[test]
    fn zero_escape_count_means_one() {
        let s = Settings {
            chord_escape_key_count: 0,
            ..Settings::default()
        };
        assert_eq!(s.policy().unwrap().escape_count, 1);
    }

    #[test]
    fn bad_escape_descriptor_is_a_key_error() {
        let s = Settings {
            chord_escape: Some("hyper+q".into()),
            ..Settings::default()
        };
        assert!(matches!(s.policy(), Err(Error::Key { .. })));
    }

    #[test]
    fn escape_can_be_disabled() {
        let s = Settings {
            chord_escape: None,
            ..Settings::default()
        };
        assert_eq!(s.policy().unwrap().escape, None);
    }
}
