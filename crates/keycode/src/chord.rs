use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::{Key, Modifier, Modifiers, ParseError};

/// A physical key chord: a modifier mask plus a single non-modifier key.
///
/// This is the authoritative identity of a binding. Two chords parsed from
/// different descriptors (`"cmd+shift+k"`, `"Shift+Command+K"`) are equal.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Chord {
    /// The non-modifier key.
    pub key: Key,
    /// Modifiers held down for this chord.
    pub modifiers: Modifiers,
}

impl Chord {
    /// A chord with no modifiers.
    pub const fn bare(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers::empty(),
        }
    }

    /// Builds a chord from a raw keycode and CoreGraphics flag mask.
    pub fn from_raw(keycode: u16, flags: u64) -> Option<Self> {
        let key = Key::from_keycode(keycode)?;
        Some(Self {
            key,
            modifiers: Modifiers::from_cg_flags(flags),
        })
    }

    /// Parses a chord descriptor of the form `"shift+opt+k"`.
    ///
    /// Components are separated by `+` and matched case-insensitively.
    /// Every component but the last must be a modifier token; the last
    /// must be a key that is not itself a modifier. A final `" "` is the
    /// space key.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let malformed = |reason: String| ParseError::MalformedKeyDescriptor {
            descriptor: s.to_string(),
            reason,
        };
        let (mods, last) = s.rsplit_once('+').unwrap_or(("", s));
        let token = if last == " " { last } else { last.trim() };
        if token.is_empty() {
            return Err(malformed("missing key".to_string()));
        }
        if Modifier::from_token(token).is_some() {
            return Err(malformed(format!("'{token}' is a modifier, not a key")));
        }
        let key = Key::from_token(token)
            .ok_or_else(|| malformed(format!("unknown key name '{token}'")))?;
        if Modifier::for_key(key).is_some() {
            return Err(malformed(format!("'{token}' is a modifier, not a key")));
        }

        let mut modifiers = Modifiers::empty();
        if s.contains('+') {
            for part in mods.split('+').map(str::trim) {
                if part.is_empty() {
                    return Err(malformed("empty modifier component".to_string()));
                }
                let m = Modifier::from_token(part)
                    .ok_or_else(|| malformed(format!("unsupported modifier '{part}'")))?;
                modifiers |= Modifiers::from(m);
            }
        }
        Ok(Self { key, modifiers })
    }

    /// Returns the canonical string form (`cmd+opt+ctrl+shift+fn+capslock+key`).
    pub fn to_string_canonical(&self) -> String {
        let mut out: Vec<String> = self.modifiers.tokens().map(str::to_string).collect();
        out.push(self.key.token());
        out.join("+")
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_canonical())
    }
}

impl FromStr for Chord {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Chord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string_canonical())
    }
}

impl<'de> Deserialize<'de> for Chord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(de::Error::custom)
    }
}
