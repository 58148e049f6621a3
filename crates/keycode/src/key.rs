//! Physical key enumeration.
//!
//! Discriminants are the macOS hardware virtual keycodes (`kVK_*` from
//! `HIToolbox/Events.h`). Variant names drop the `ANSI_` prefix and spell
//! digits as `DigitN`.

/// Expands to a key's descriptor symbol, if it declared one.
macro_rules! symbol_of {
    () => {
        None
    };
    ($symbol:literal) => {
        Some($symbol)
    };
}

/// Declares the `Key` enum and its descriptor vocabulary.
///
/// Each entry is `Name = keycode`, optionally followed by `=> "symbol"` (the
/// token used in descriptors instead of the lowercased name) and a bracketed
/// list of extra input spellings.
macro_rules! define_keys {
    ( $( $name:ident = $code:literal $( => $symbol:literal )? $( [ $( $alias:literal ),* ] )? , )* ) => {
        /// A physical key, identified by its macOS virtual keycode.
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
        #[repr(u16)]
        #[allow(missing_docs)]
        pub enum Key {
            $( $name = $code, )*
        }

        impl Key {
            /// Every known key, in keycode declaration order.
            pub const ALL: &'static [Key] = &[ $( Key::$name, )* ];

            /// The enum variant name (e.g. `"LeftArrow"`).
            pub const fn name(self) -> &'static str {
                match self {
                    $( Key::$name => stringify!($name), )*
                }
            }

            /// Punctuation or digit written in place of the name, if any.
            pub const fn symbol(self) -> Option<&'static str> {
                match self {
                    $( Key::$name => symbol_of!($( $symbol )?), )*
                }
            }

            /// Extra spellings accepted on input, compared case-insensitively.
            pub const fn aliases(self) -> &'static [&'static str] {
                match self {
                    $( Key::$name => &[ $( $( $alias, )* )? ], )*
                }
            }

            /// Lookup by macOS virtual keycode (`NSEvent.keyCode`).
            pub const fn from_keycode(code: u16) -> Option<Self> {
                match code {
                    $( $code => Some(Key::$name), )*
                    _ => None,
                }
            }
        }
    };
}

define_keys! {
    A = 0x00,
    S = 0x01,
    D = 0x02,
    F = 0x03,
    H = 0x04,
    G = 0x05,
    Z = 0x06,
    X = 0x07,
    C = 0x08,
    V = 0x09,
    B = 0x0B,
    Q = 0x0C,
    W = 0x0D,
    E = 0x0E,
    R = 0x0F,
    Y = 0x10,
    T = 0x11,
    Digit1 = 0x12 => "1",
    Digit2 = 0x13 => "2",
    Digit3 = 0x14 => "3",
    Digit4 = 0x15 => "4",
    Digit6 = 0x16 => "6",
    Digit5 = 0x17 => "5",
    Equal = 0x18 => "=",
    Digit9 = 0x19 => "9",
    Digit7 = 0x1A => "7",
    Minus = 0x1B => "-",
    Digit8 = 0x1C => "8",
    Digit0 = 0x1D => "0",
    RightBracket = 0x1E => "]",
    O = 0x1F,
    U = 0x20,
    LeftBracket = 0x21 => "[",
    I = 0x22,
    P = 0x23,
    Return = 0x24 ["enter", "ret"],
    L = 0x25,
    J = 0x26,
    Quote = 0x27 => "'",
    K = 0x28,
    Semicolon = 0x29 => ";",
    Backslash = 0x2A => "\\",
    Comma = 0x2B => ",",
    Slash = 0x2C => "/",
    N = 0x2D,
    M = 0x2E,
    Period = 0x2F => ".",
    Tab = 0x30,
    Space = 0x31 [" "],
    Grave = 0x32 => "`",
    Delete = 0x33 ["backspace"],
    Escape = 0x35 ["esc"],
    RightCommand = 0x36,
    Command = 0x37,
    Shift = 0x38,
    CapsLock = 0x39,
    Option = 0x3A,
    Control = 0x3B,
    RightShift = 0x3C,
    RightOption = 0x3D,
    RightControl = 0x3E,
    Function = 0x3F,
    F17 = 0x40,
    KeypadDecimal = 0x41,
    KeypadMultiply = 0x43,
    KeypadPlus = 0x45,
    KeypadClear = 0x47,
    VolumeUp = 0x48,
    VolumeDown = 0x49,
    Mute = 0x4A,
    KeypadDivide = 0x4B,
    KeypadEnter = 0x4C ["kpenter"],
    KeypadMinus = 0x4E,
    F18 = 0x4F,
    F19 = 0x50,
    KeypadEquals = 0x51,
    Keypad0 = 0x52,
    Keypad1 = 0x53,
    Keypad2 = 0x54,
    Keypad3 = 0x55,
    Keypad4 = 0x56,
    Keypad5 = 0x57,
    Keypad6 = 0x58,
    Keypad7 = 0x59,
    F20 = 0x5A,
    Keypad8 = 0x5B,
    Keypad9 = 0x5C,
    F5 = 0x60,
    F6 = 0x61,
    F7 = 0x62,
    F3 = 0x63,
    F8 = 0x64,
    F9 = 0x65,
    F11 = 0x67,
    F13 = 0x69,
    F16 = 0x6A,
    F14 = 0x6B,
    F10 = 0x6D,
    ContextualMenu = 0x6E ["menu"],
    F12 = 0x6F,
    F15 = 0x71,
    Help = 0x72,
    Home = 0x73,
    PageUp = 0x74 ["pgup"],
    ForwardDelete = 0x75 ["del"],
    F4 = 0x76,
    End = 0x77,
    F2 = 0x78,
    PageDown = 0x79 ["pgdn"],
    F1 = 0x7A,
    LeftArrow = 0x7B ["left"],
    RightArrow = 0x7C ["right"],
    DownArrow = 0x7D ["down"],
    UpArrow = 0x7E ["up"],
}

impl Key {
    /// macOS virtual keycode of this key.
    pub const fn keycode(self) -> u16 {
        self as u16
    }

    /// Resolve one descriptor token: the variant name in any case, then the
    /// exact symbol, then an alias in any case.
    pub fn from_token(token: &str) -> Option<Self> {
        let keys = Self::ALL.iter().copied();
        keys.clone()
            .find(|k| k.name().eq_ignore_ascii_case(token))
            .or_else(|| keys.clone().find(|k| k.symbol() == Some(token)))
            .or_else(|| {
                keys.clone()
                    .find(|k| k.aliases().iter().any(|a| a.eq_ignore_ascii_case(token)))
            })
    }

    /// The token written for this key in canonical descriptors.
    pub fn token(self) -> String {
        match self.symbol() {
            Some(s) => s.to_string(),
            None => self.name().to_ascii_lowercase(),
        }
    }
}
