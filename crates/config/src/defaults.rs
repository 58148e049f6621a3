// Defaults and constants for engine settings

/// Whether registrations follow the focused app.
pub(crate) const ENABLE_DYNAMIC_REGISTRATION: bool = true;
/// Whether multi-key chords wait for a follow-up key.
pub(crate) const ENABLE_CHORD_TIMER: bool = true;
/// Time allowed between chord keys.
pub(crate) const CHORD_TIMEOUT_MS: u64 = 500;
/// Key that cancels a pending chord.
pub(crate) const CHORD_ESCAPE: &str = "esc";
/// Consecutive escape presses needed to cancel.
pub(crate) const CHORD_ESCAPE_KEY_COUNT: u32 = 1;

// Serde default functions
pub(crate) const fn default_enable_dynamic_registration() -> bool {
    ENABLE_DYNAMIC_REGISTRATION
}
pub(crate) const fn default_enable_chord_timer() -> bool {
    ENABLE_CHORD_TIMER
}
pub(crate) const fn default_chord_timeout_ms() -> u64 {
    CHORD_TIMEOUT_MS
}
pub(crate) fn default_chord_escape() -> Option<String> {
    Some(CHORD_ESCAPE.to_string())
}
pub(crate) const fn default_chord_escape_key_count() -> u32 {
    CHORD_ESCAPE_KEY_COUNT
}
