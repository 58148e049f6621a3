//! Test support utilities for chord-engine tests and tooling.
//! These helpers are public so integration tests and the replay tool can share them.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;

use crate::EngineEvent;

/// Receive engine events until `pred` matches or `timeout_ms` elapses.
pub async fn recv_until<F>(
    rx: &mut UnboundedReceiver<EngineEvent>,
    timeout_ms: u64,
    mut pred: F,
) -> bool
where
    F: FnMut(&EngineEvent) -> bool,
{
    tokio::time::timeout(Duration::from_millis(timeout_ms), async {
        while let Some(ev) = rx.recv().await {
            if pred(&ev) {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false)
}

/// Take every event already queued on `rx` without waiting.
pub fn drain(rx: &mut UnboundedReceiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

/// Actions of every dispatch in `events`, in order.
pub fn dispatched_actions(events: &[EngineEvent]) -> Vec<config::Action> {
    events
        .iter()
        .filter_map(|ev| match ev {
            EngineEvent::DidTriggerHotKey(d) | EngineEvent::DidTriggerChordKey(d) => {
                Some(d.action.clone())
            }
            _ => None,
        })
        .collect()
}
