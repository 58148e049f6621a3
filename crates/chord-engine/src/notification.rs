use std::sync::Arc;

use config::{Action, AppId};
use keycode::Chord;
use keymode::{FireKind, Fired, NodeId};
use parking_lot::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, info};

use crate::{Error, Result};

/// A completed binding, as published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    /// Node that fired.
    pub node: NodeId,
    /// Keys that led to the node.
    pub path: Vec<Chord>,
    /// Selected action.
    pub action: Action,
    /// App in focus when the binding fired.
    pub app: Option<AppId>,
}

impl From<Fired> for Dispatch {
    fn from(f: Fired) -> Self {
        Self {
            node: f.node,
            path: f.path,
            action: f.action,
            app: f.app,
        }
    }
}

/// Events published by the engine, in the order they happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A one-key binding fired.
    DidTriggerHotKey(Dispatch),
    /// A multi-key chord completed.
    DidTriggerChordKey(Dispatch),
    /// A chord registered through the engine API, not the mapping, was
    /// pressed.
    DidTriggerManualHotKey {
        /// Pressed chord.
        chord: Chord,
        /// App in focus.
        app: Option<AppId>,
    },
    /// A new mapping was installed.
    ConfigChanged,
    /// The registered chord set changed.
    HotKeysChanged {
        /// Chords registered after the change, sorted.
        active: Vec<Chord>,
    },
    /// The backend refused a chord.
    RegistrationFailed {
        /// Refused chord.
        chord: Chord,
        /// Backend reason.
        error: hotkey_backend::Error,
    },
}

impl EngineEvent {
    /// Event for a resolved dispatch.
    pub fn fired(fired: Fired) -> Self {
        match fired.kind {
            FireKind::HotKey => Self::DidTriggerHotKey(fired.into()),
            FireKind::Chord => Self::DidTriggerChordKey(fired.into()),
        }
    }
}

/// Fans engine events out to subscribers.
///
/// Subscribers whose receiver has been dropped are pruned on the next send.
#[derive(Clone, Default)]
pub struct NotificationDispatcher {
    /// Live subscriber channels, in subscription order.
    subscribers: Arc<Mutex<Vec<UnboundedSender<EngineEvent>>>>,
}

impl NotificationDispatcher {
    /// Create a dispatcher with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber. Events published from now on are delivered in order.
    pub fn subscribe(&self) -> UnboundedReceiver<EngineEvent> {
        let (tx, rx) = unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        let mut subs = self.subscribers.lock();
        subs.retain(|tx| !tx.is_closed());
        subs.len()
    }

    /// Deliver `event` to every subscriber.
    ///
    /// Returns [`Error::ChannelClosed`] if any subscriber had gone away.
    pub fn publish(&self, event: EngineEvent) -> Result<()> {
        match &event {
            EngineEvent::DidTriggerHotKey(d) | EngineEvent::DidTriggerChordKey(d) => {
                info!(path = ?d.path, action = ?d.action, app = ?d.app, "dispatch");
            }
            EngineEvent::DidTriggerManualHotKey { chord, app } => {
                info!(chord = %chord, app = ?app, "manual_dispatch");
            }
            EngineEvent::RegistrationFailed { chord, error } => {
                info!(chord = %chord, error = %error, "registration_failed");
            }
            other => debug!(event = ?other, "engine_event"),
        }
        let mut subs = self.subscribers.lock();
        let before = subs.len();
        subs.retain(|tx| tx.send(event.clone()).is_ok());
        if subs.len() < before {
            return Err(Error::ChannelClosed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publishes_to_all_and_prunes_closed() {
        let n = NotificationDispatcher::new();
        let mut a = n.subscribe();
        let b = n.subscribe();
        drop(b);
        assert!(matches!(
            n.publish(EngineEvent::ConfigChanged),
            Err(Error::ChannelClosed)
        ));
        assert_eq!(a.try_recv().ok(), Some(EngineEvent::ConfigChanged));
        assert_eq!(n.subscriber_count(), 1);
        assert!(n.publish(EngineEvent::ConfigChanged).is_ok());
    }
}
