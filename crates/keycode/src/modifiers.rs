use bitflags::bitflags;

use crate::Key;

/// Modifier keys available on macOS keyboards.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[allow(missing_docs)]
pub enum Modifier {
    Command,
    Shift,
    Option,
    Control,
    CapsLock,
    Function,
    RightCommand,
    RightShift,
    RightOption,
    RightControl,
}

bitflags! {
    /// Modifier mask in the CoreGraphics event flag layout.
    ///
    /// Left and right variants of a modifier share one bit: the mask names
    /// a chord, not a physical key.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
    pub struct Modifiers: u64 {
        /// Caps lock engaged.
        const CAPS_LOCK = 1 << 16;
        /// Either shift key.
        const SHIFT = 1 << 17;
        /// Either control key.
        const CONTROL = 1 << 18;
        /// Either option/alt key.
        const OPTION = 1 << 19;
        /// Either command key.
        const COMMAND = 1 << 20;
        /// The fn key.
        const FUNCTION = 1 << 23;
    }
}

/// Carbon `cmdKey`.
const CARBON_CMD: u32 = 0x0100;
/// Carbon `shiftKey`.
const CARBON_SHIFT: u32 = 0x0200;
/// Carbon `alphaLock`.
const CARBON_CAPS: u32 = 0x0400;
/// Carbon `optionKey`.
const CARBON_OPTION: u32 = 0x0800;
/// Carbon `controlKey`.
const CARBON_CONTROL: u32 = 0x1000;
/// Carbon `kEventKeyModifierFnMask`.
const CARBON_FN: u32 = 0x0002_0000;

/// Pairs of (mask bit, carbon bit) used for conversion in both directions.
const CARBON_TABLE: [(Modifiers, u32); 6] = [
    (Modifiers::COMMAND, CARBON_CMD),
    (Modifiers::SHIFT, CARBON_SHIFT),
    (Modifiers::CAPS_LOCK, CARBON_CAPS),
    (Modifiers::OPTION, CARBON_OPTION),
    (Modifiers::CONTROL, CARBON_CONTROL),
    (Modifiers::FUNCTION, CARBON_FN),
];

impl Modifiers {
    /// Builds a mask from raw CGEventFlags, ignoring unrelated bits.
    pub fn from_cg_flags(flags: u64) -> Self {
        Self::from_bits_truncate(flags)
    }

    /// The Carbon-style encoding used when registering with the OS backend.
    pub fn carbon(self) -> u32 {
        CARBON_TABLE
            .iter()
            .filter(|(m, _)| self.contains(*m))
            .fold(0, |acc, (_, c)| acc | c)
    }

    /// Inverse of [`Modifiers::carbon`]; unknown bits are dropped.
    pub fn from_carbon(bits: u32) -> Self {
        CARBON_TABLE
            .iter()
            .filter(|(_, c)| bits & c != 0)
            .fold(Self::empty(), |acc, (m, _)| acc | *m)
    }
}

impl From<Modifier> for Modifiers {
    fn from(m: Modifier) -> Self {
        match m {
            Modifier::Command | Modifier::RightCommand => Self::COMMAND,
            Modifier::Shift | Modifier::RightShift => Self::SHIFT,
            Modifier::Option | Modifier::RightOption => Self::OPTION,
            Modifier::Control | Modifier::RightControl => Self::CONTROL,
            Modifier::CapsLock => Self::CAPS_LOCK,
            Modifier::Function => Self::FUNCTION,
        }
    }
}

/// Descriptor tokens for each modifier, compared case-insensitively.
///
/// The first token listed for a modifier is the one canonical descriptors
/// use.
const TOKENS: &[(&str, Modifier)] = &[
    ("cmd", Modifier::Command),
    ("command", Modifier::Command),
    ("opt", Modifier::Option),
    ("option", Modifier::Option),
    ("alt", Modifier::Option),
    ("ctrl", Modifier::Control),
    ("control", Modifier::Control),
    ("shift", Modifier::Shift),
    ("fn", Modifier::Function),
    ("function", Modifier::Function),
    ("capslock", Modifier::CapsLock),
    ("caps", Modifier::CapsLock),
    ("rcmd", Modifier::RightCommand),
    ("rightcommand", Modifier::RightCommand),
    ("rshift", Modifier::RightShift),
    ("rightshift", Modifier::RightShift),
    ("ropt", Modifier::RightOption),
    ("ralt", Modifier::RightOption),
    ("rightoption", Modifier::RightOption),
    ("rctrl", Modifier::RightControl),
    ("rightcontrol", Modifier::RightControl),
];

impl Modifier {
    /// Parse one modifier token of a descriptor (`cmd`, `Shift`, `ralt`, ...).
    pub fn from_token(token: &str) -> Option<Self> {
        TOKENS
            .iter()
            .find(|(t, _)| t.eq_ignore_ascii_case(token))
            .map(|(_, m)| *m)
    }

    /// The modifier a physical modifier key produces, if `key` is one.
    pub fn for_key(key: Key) -> Option<Self> {
        Some(match key {
            Key::Command => Self::Command,
            Key::Shift => Self::Shift,
            Key::Option => Self::Option,
            Key::Control => Self::Control,
            Key::CapsLock => Self::CapsLock,
            Key::Function => Self::Function,
            Key::RightCommand => Self::RightCommand,
            Key::RightShift => Self::RightShift,
            Key::RightOption => Self::RightOption,
            Key::RightControl => Self::RightControl,
            _ => return None,
        })
    }
}

impl Modifiers {
    /// Canonical descriptor tokens for the bits in this mask, in table order.
    pub fn tokens(self) -> impl Iterator<Item = &'static str> {
        let mut seen = Self::empty();
        TOKENS.iter().filter_map(move |(t, m)| {
            let bit = Self::from(*m);
            if self.contains(bit) && !seen.contains(bit) {
                seen |= bit;
                Some(*t)
            } else {
                None
            }
        })
    }
}
