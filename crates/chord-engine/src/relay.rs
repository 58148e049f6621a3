use std::sync::Arc;

use hotkey_backend::{EventKind, MemoryBackend};
use keycode::Chord;
use tracing::{debug, trace};

/// Posts synthetic key events to the focused application.
///
/// Posted keys must reach the app without passing through the engine's own
/// registrations again.
pub trait KeySender: Send + Sync {
    /// Post a key press.
    fn key_down(&self, chord: &Chord);
    /// Post a key release.
    fn key_up(&self, chord: &Chord);
}

impl KeySender for MemoryBackend {
    fn key_down(&self, chord: &Chord) {
        self.post(*chord, EventKind::KeyDown);
    }

    fn key_up(&self, chord: &Chord) {
        self.post(*chord, EventKind::KeyUp);
    }
}

/// Relays keys to the focused app as taps.
#[derive(Clone, Default)]
pub struct RelayHandler {
    /// Destination for relayed keys.
    sender: Option<Arc<dyn KeySender>>,
}

impl RelayHandler {
    /// Relay through `sender`; `None` drops relayed keys.
    pub fn new(sender: Option<Arc<dyn KeySender>>) -> Self {
        Self { sender }
    }

    /// Tap each chord (down then up) in order. Returns the number tapped.
    pub fn relay(&self, chords: &[Chord]) -> usize {
        let Some(sender) = &self.sender else {
            trace!(count = chords.len(), "relay_no_sender");
            return 0;
        };
        for chord in chords {
            debug!(chord = %chord, "relay_tap");
            sender.key_down(chord);
            sender.key_up(chord);
        }
        chords.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taps_down_then_up() {
        let backend = Arc::new(MemoryBackend::new());
        let relay = RelayHandler::new(Some(backend.clone()));
        let a = Chord::parse("cmd+c").expect("chord");
        let b = Chord::parse("cmd+v").expect("chord");
        assert_eq!(relay.relay(&[a, b]), 2);
        assert_eq!(
            backend.take_posted(),
            vec![
                (a, EventKind::KeyDown),
                (a, EventKind::KeyUp),
                (b, EventKind::KeyDown),
                (b, EventKind::KeyUp),
            ]
        );
        assert_eq!(RelayHandler::default().relay(&[a]), 0);
    }
}
