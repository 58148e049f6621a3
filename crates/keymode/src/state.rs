use std::{mem, time::Instant};

use config::{Action, AppId, ChordPolicy};
use keycode::Chord;
use tracing::{debug, trace};

use crate::{ChordGraph, NodeId};

/// Whether a dispatch completed a single hotkey or a multi-key chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireKind {
    /// One-key binding.
    HotKey,
    /// Multi-key binding.
    Chord,
}

/// A resolved dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired {
    /// Node that fired.
    pub node: NodeId,
    /// Hotkey or chord.
    pub kind: FireKind,
    /// Action selected for `app`.
    pub action: Action,
    /// App the action fired under.
    pub app: Option<AppId>,
    /// Keys that led to the node.
    pub path: Vec<Chord>,
}

/// Result of feeding one key to the automaton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResponse {
    /// Not ours; the key passes through untouched.
    PassThrough,
    /// A binding completed.
    Fire(Fired),
    /// A prefix matched; waiting for a follow-up until `deadline`.
    Armed {
        /// Pending node.
        node: NodeId,
        /// Expiry instant.
        deadline: Instant,
        /// Generation to hand back to [`State::expire`].
        generation: u64,
    },
    /// The escape key cancelled the pending chord.
    Cancelled,
    /// An escape press was counted; more are needed to cancel.
    Pending,
}

/// Response to a key, plus any commit caused by an already expired wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Late commit of a wait whose deadline passed before this key.
    pub committed: Option<Fired>,
    /// What this key did.
    pub response: KeyResponse,
}

impl From<KeyResponse> for Outcome {
    fn from(response: KeyResponse) -> Self {
        Self {
            committed: None,
            response,
        }
    }
}

/// Result of a scheduled expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expiry {
    /// The generation no longer matches; nothing happened.
    Stale,
    /// The pending chord was dropped.
    Abandoned,
    /// The pending node's standalone action fired on timeout.
    Commit(Fired),
}

/// An armed chord wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pending {
    /// Node awaiting a follow-up.
    pub node: NodeId,
    /// App the wait was armed under.
    pub app: Option<AppId>,
    /// When the last matched key arrived.
    pub armed_at: Instant,
    /// `armed_at` plus the timeout in force when armed.
    pub deadline: Instant,
    /// Commit policy in force when armed.
    pub commit_on_timeout: bool,
    /// Consecutive escape presses seen so far.
    pub escapes: u32,
    /// Arm counter value for this wait.
    pub generation: u64,
}

/// The automaton's only mutable value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Mode {
    /// No chord in progress.
    #[default]
    Idle,
    /// Waiting for a follow-up key.
    AwaitingCompletion(Pending),
}

/// Chord automaton. Pure: time comes in as arguments.
#[derive(Debug, Default)]
pub struct State {
    /// Current mode.
    mode: Mode,
    /// Incremented on every arm.
    generation: u64,
}

impl State {
    /// Create an idle automaton.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current mode.
    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// The armed wait, if any.
    pub fn pending(&self) -> Option<&Pending> {
        match &self.mode {
            Mode::AwaitingCompletion(p) => Some(p),
            Mode::Idle => None,
        }
    }

    /// True when no chord is in progress.
    pub fn is_idle(&self) -> bool {
        self.mode == Mode::Idle
    }

    /// Generation of the most recent arm.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Drop any pending chord. Returns true if one was dropped.
    pub fn reset(&mut self) -> bool {
        let was = !self.is_idle();
        if was {
            debug!("chord_reset");
        }
        self.mode = Mode::Idle;
        was
    }

    /// Process one key press under `app` at `now`.
    ///
    /// `matchable` excludes chords that could not be registered; such keys
    /// never complete or extend a chord.
    pub fn handle_key(
        &mut self,
        graph: &ChordGraph,
        policy: &ChordPolicy,
        key: &Chord,
        app: Option<AppId>,
        now: Instant,
        matchable: &dyn Fn(&Chord) -> bool,
    ) -> Outcome {
        let Mode::AwaitingCompletion(pending) = &mut self.mode else {
            return self.fresh(graph, policy, key, app, now, matchable).into();
        };

        if now > pending.deadline {
            debug!(node = ?pending.node, "chord_expired_before_key");
            let committed = match self.take_pending() {
                Some(p) if p.commit_on_timeout => commit(graph, &p),
                _ => None,
            };
            let response = self.fresh(graph, policy, key, app, now, matchable);
            return Outcome {
                committed,
                response,
            };
        }

        if pending.app != app {
            debug!(old = ?pending.app, new = ?app, "chord_invalidated_by_focus");
            self.mode = Mode::Idle;
            return self.fresh(graph, policy, key, app, now, matchable).into();
        }

        let parent = pending.node;
        if let Some(next) = graph
            .next_node(Some(parent), key, app)
            .filter(|_| matchable(key))
        {
            return self
                .resolve(graph, policy, next, app, now, matchable, false)
                .into();
        }

        if policy.is_escape(key) {
            pending.escapes += 1;
            if pending.escapes >= policy.escape_count {
                debug!(node = ?parent, "chord_cancelled");
                self.mode = Mode::Idle;
                return KeyResponse::Cancelled.into();
            }
            trace!(escapes = pending.escapes, "chord_escape_counted");
            return KeyResponse::Pending.into();
        }

        // Unmatched continuation: abandon the chord and treat the key as new.
        debug!(node = ?parent, key = %key, "chord_fall_through");
        self.mode = Mode::Idle;
        self.fresh(graph, policy, key, app, now, matchable).into()
    }

    /// Handle a scheduled expiry for `generation`.
    pub fn expire(&mut self, graph: &ChordGraph, generation: u64) -> Expiry {
        match &self.mode {
            Mode::AwaitingCompletion(p) if p.generation == generation => {}
            _ => {
                trace!(generation, "stale_expiry");
                return Expiry::Stale;
            }
        }
        let Some(p) = self.take_pending() else {
            return Expiry::Stale;
        };
        match p.commit_on_timeout.then(|| commit(graph, &p)).flatten() {
            Some(fired) => {
                debug!(node = ?p.node, "chord_committed_on_timeout");
                Expiry::Commit(fired)
            }
            None => {
                debug!(node = ?p.node, "chord_abandoned_on_timeout");
                Expiry::Abandoned
            }
        }
    }

    /// Drop the pending chord if its node no longer has a usable follow-up.
    ///
    /// Called after registrations change. Returns true if the chord was dropped.
    pub fn revalidate(&mut self, graph: &ChordGraph, matchable: &dyn Fn(&Chord) -> bool) -> bool {
        let keep = match &self.mode {
            Mode::Idle => return false,
            Mode::AwaitingCompletion(p) => graph.is_prefix_for(p.node, p.app, matchable),
        };
        if !keep {
            debug!("chord_dropped_unregistered_continuations");
            self.mode = Mode::Idle;
        }
        !keep
    }

    /// Evaluate `key` from the root.
    fn fresh(
        &mut self,
        graph: &ChordGraph,
        policy: &ChordPolicy,
        key: &Chord,
        app: Option<AppId>,
        now: Instant,
        matchable: &dyn Fn(&Chord) -> bool,
    ) -> KeyResponse {
        match graph.next_node(None, key, app).filter(|_| matchable(key)) {
            Some(node) => self.resolve(graph, policy, node, app, now, matchable, true),
            None => {
                trace!(key = %key, "unmatched_key");
                KeyResponse::PassThrough
            }
        }
    }

    /// Decide what reaching `node` means.
    ///
    /// A root that is both prefix and standalone waits for the timer. Past
    /// the root, a standalone node always fires and only a pure prefix
    /// re-arms.
    #[allow(clippy::too_many_arguments)]
    fn resolve(
        &mut self,
        graph: &ChordGraph,
        policy: &ChordPolicy,
        node: NodeId,
        app: Option<AppId>,
        now: Instant,
        matchable: &dyn Fn(&Chord) -> bool,
        root: bool,
    ) -> KeyResponse {
        let prefix = graph.is_prefix_for(node, app, matchable);
        let fired = fire(graph, node, app);
        self.mode = Mode::Idle;
        match (prefix, fired) {
            (_, Some(f)) if !root => {
                debug!(node = ?node, kind = ?f.kind, "binding_fired");
                KeyResponse::Fire(f)
            }
            (true, _) if policy.chord_timer => {
                self.generation += 1;
                let deadline = now + policy.timeout;
                debug!(node = ?node, generation = self.generation, "chord_armed");
                self.mode = Mode::AwaitingCompletion(Pending {
                    node,
                    app,
                    armed_at: now,
                    deadline,
                    commit_on_timeout: policy.commit_on_timeout,
                    escapes: 0,
                    generation: self.generation,
                });
                KeyResponse::Armed {
                    node,
                    deadline,
                    generation: self.generation,
                }
            }
            (_, Some(f)) => {
                debug!(node = ?node, kind = ?f.kind, "binding_fired");
                KeyResponse::Fire(f)
            }
            (_, None) => KeyResponse::PassThrough,
        }
    }

    /// Take the pending wait, leaving the automaton idle.
    fn take_pending(&mut self) -> Option<Pending> {
        match mem::take(&mut self.mode) {
            Mode::AwaitingCompletion(p) => Some(p),
            Mode::Idle => None,
        }
    }
}

/// Build the dispatch for `node` under `app`, if it has an action there.
fn fire(graph: &ChordGraph, node: NodeId, app: Option<AppId>) -> Option<Fired> {
    let n = graph.node(node);
    let action = n.action_for(app)?.clone();
    let path = n.path().to_vec();
    Some(Fired {
        node,
        kind: if path.len() > 1 {
            FireKind::Chord
        } else {
            FireKind::HotKey
        },
        action,
        app,
        path,
    })
}

/// Commit a pending wait on timeout.
fn commit(graph: &ChordGraph, p: &Pending) -> Option<Fired> {
    fire(graph, p.node, p.app)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use config::{AppRegistry, MappingConfig};

    use super::*;

    fn chord(s: &str) -> Chord {
        Chord::parse(s).unwrap()
    }

    fn graph(ron_text: &str) -> ChordGraph {
        let cfg: MappingConfig = ron::from_str(ron_text).unwrap();
        let (reg, errs) = AppRegistry::build(&cfg);
        assert!(errs.is_empty(), "{errs:?}");
        let (g, gerrs) = ChordGraph::from_registry(&reg);
        assert!(gerrs.is_empty(), "{gerrs:?}");
        g
    }

    fn any(_: &Chord) -> bool {
        true
    }

    /// Drives a [`State`] with a fake clock.
    struct Harness {
        graph: ChordGraph,
        policy: ChordPolicy,
        state: State,
        t0: Instant,
    }

    impl Harness {
        fn new(ron_text: &str) -> Self {
            Self {
                graph: graph(ron_text),
                policy: ChordPolicy::default(),
                state: State::new(),
                t0: Instant::now(),
            }
        }

        fn at(&self, ms: u64) -> Instant {
            self.t0 + Duration::from_millis(ms)
        }

        fn key_in(&mut self, key: &str, app: Option<AppId>, ms: u64) -> Outcome {
            let now = self.at(ms);
            self.state
                .handle_key(&self.graph, &self.policy, &chord(key), app, now, &any)
        }

        fn key(&mut self, key: &str, ms: u64) -> KeyResponse {
            self.key_in(key, None, ms).response
        }
    }

    fn fired_name(r: &KeyResponse) -> Option<&str> {
        match r {
            KeyResponse::Fire(Fired {
                action: Action::Named(n),
                ..
            }) => Some(n.as_str()),
            _ => None,
        }
    }

    const GG: &str = r#"(global: [
        (keys: ["cmd+k"], action: named("A")),
        (keys: ["g", "g"], action: named("B")),
    ])"#;

    #[test]
    fn hotkey_fires_once_and_unmapped_passes() {
        let mut h = Harness::new(GG);
        let r = h.key("cmd+k", 0);
        assert_eq!(fired_name(&r), Some("A"));
        assert!(matches!(r, KeyResponse::Fire(Fired { kind: FireKind::HotKey, .. })));
        assert!(h.state.is_idle());
        assert_eq!(h.key("cmd+j", 10), KeyResponse::PassThrough);
        assert!(h.state.is_idle());
    }

    #[test]
    fn chord_within_timeout_fires() {
        let mut h = Harness::new(GG);
        assert!(matches!(h.key("g", 0), KeyResponse::Armed { .. }));
        let r = h.key("g", 400);
        assert_eq!(fired_name(&r), Some("B"));
        assert!(matches!(r, KeyResponse::Fire(Fired { kind: FireKind::Chord, .. })));
        assert!(h.state.is_idle());
    }

    #[test]
    fn expired_chord_restarts_from_second_key() {
        let mut h = Harness::new(GG);
        h.key("g", 0);
        // The first pair never completes; the second g starts a new chord.
        assert!(matches!(h.key("g", 600), KeyResponse::Armed { .. }));
        assert_eq!(fired_name(&h.key("g", 700)), Some("B"));
    }

    #[test]
    fn deadline_is_inclusive() {
        let mut h = Harness::new(GG);
        h.key("g", 0);
        assert_eq!(fired_name(&h.key("g", 500)), Some("B"));
    }

    #[test]
    fn rearm_extends_from_last_key() {
        let mut h = Harness::new(
            r#"(global: [(keys: ["ctrl+a", "b", "c"], action: named("C"))])"#,
        );
        h.key("ctrl+a", 0);
        match h.key("b", 400) {
            KeyResponse::Armed { deadline, .. } => assert_eq!(deadline, h.at(900)),
            other => panic!("{other:?}"),
        }
        assert_eq!(fired_name(&h.key("c", 800)), Some("C"));
    }

    #[test]
    fn focus_change_invalidates_pending_chord() {
        let mut h = Harness::new(
            r#"(
                global: [(keys: ["g", "g"], action: named("B"))],
                apps: [(name: "A"), (name: "Z")],
            )"#,
        );
        let a = Some(AppId(1));
        let z = Some(AppId(2));
        h.key_in("g", a, 0);
        // Under the new app the second g is a fresh first key.
        let r = h.key_in("g", z, 100).response;
        assert!(matches!(r, KeyResponse::Armed { .. }));
        assert_eq!(h.state.pending().unwrap().app, z);
    }

    #[test]
    fn timer_disabled_makes_pure_prefixes_inert() {
        let mut h = Harness::new(
            r#"(global: [
                (keys: ["g", "g"], action: named("B")),
                (keys: ["f"], action: named("F")),
                (keys: ["f", "j"], action: named("J")),
            ])"#,
        );
        h.policy.chord_timer = false;
        assert_eq!(h.key("g", 0), KeyResponse::PassThrough);
        assert_eq!(h.key("g", 10), KeyResponse::PassThrough);
        assert_eq!(fired_name(&h.key("f", 20)), Some("F"));
        assert!(h.state.is_idle());
    }

    #[test]
    fn prefix_and_standalone_waits_for_timer() {
        let mut h = Harness::new(
            r#"(global: [
                (keys: ["f"], action: named("F")),
                (keys: ["f", "j"], action: named("J")),
            ])"#,
        );
        let generation = match h.key("f", 0) {
            KeyResponse::Armed { generation, .. } => generation,
            other => panic!("{other:?}"),
        };
        assert_eq!(h.state.expire(&h.graph, generation), Expiry::Abandoned);
        assert!(h.state.is_idle());
    }

    #[test]
    fn standalone_past_the_root_fires_even_with_longer_chord() {
        let mut h = Harness::new(
            r#"(global: [
                (keys: ["ctrl+a", "b"], action: named("X")),
                (keys: ["ctrl+a", "b", "c"], action: named("Y")),
            ])"#,
        );
        assert!(matches!(h.key("ctrl+a", 0), KeyResponse::Armed { .. }));
        let r = h.key("b", 100);
        assert_eq!(fired_name(&r), Some("X"));
        assert!(h.state.is_idle());
        // The longer chord is unreachable once its prefix fires; c is fresh.
        assert_eq!(h.key("c", 200), KeyResponse::PassThrough);
    }

    #[test]
    fn commit_on_timeout_fires_standalone_once() {
        let mut h = Harness::new(
            r#"(global: [
                (keys: ["f"], action: named("F")),
                (keys: ["f", "j"], action: named("J")),
            ])"#,
        );
        h.policy.commit_on_timeout = true;
        let KeyResponse::Armed { generation, .. } = h.key("f", 0) else {
            panic!("not armed");
        };
        match h.state.expire(&h.graph, generation) {
            Expiry::Commit(f) => assert_eq!(f.action, Action::Named("F".into())),
            other => panic!("{other:?}"),
        }
        assert_eq!(h.state.expire(&h.graph, generation), Expiry::Stale);
    }

    #[test]
    fn late_key_commits_expired_wait() {
        let mut h = Harness::new(
            r#"(global: [
                (keys: ["f"], action: named("F")),
                (keys: ["f", "j"], action: named("J")),
            ])"#,
        );
        h.policy.commit_on_timeout = true;
        h.key("f", 0);
        let out = h.key_in("j", None, 900);
        assert_eq!(
            out.committed.map(|f| f.action),
            Some(Action::Named("F".into()))
        );
        assert_eq!(out.response, KeyResponse::PassThrough);
    }

    #[test]
    fn stale_expiry_is_a_noop() {
        let mut h = Harness::new(GG);
        let KeyResponse::Armed { generation: g1, .. } = h.key("g", 0) else {
            panic!("not armed");
        };
        h.key("x", 10);
        let KeyResponse::Armed { generation: g2, .. } = h.key("g", 20) else {
            panic!("not armed");
        };
        assert_ne!(g1, g2);
        assert_eq!(h.state.expire(&h.graph, g1), Expiry::Stale);
        assert!(!h.state.is_idle());
        assert_eq!(h.state.expire(&h.graph, g2), Expiry::Abandoned);
    }

    #[test]
    fn escape_cancels_after_required_presses() {
        let mut h = Harness::new(GG);
        h.policy.escape_count = 2;
        h.key("g", 0);
        assert_eq!(h.key("esc", 10), KeyResponse::Pending);
        assert!(!h.state.is_idle());
        assert_eq!(h.key("esc", 20), KeyResponse::Cancelled);
        assert!(h.state.is_idle());
    }

    #[test]
    fn unmatched_continuation_falls_through() {
        let mut h = Harness::new(GG);
        h.key("g", 0);
        assert_eq!(fired_name(&h.key("cmd+k", 10)), Some("A"));
        assert!(h.state.is_idle());
        h.key("g", 20);
        assert_eq!(h.key("q", 30), KeyResponse::PassThrough);
        assert!(h.state.is_idle());
    }

    #[test]
    fn unmatchable_keys_never_arm_or_complete() {
        let mut h = Harness::new(GG);
        let not_g = |c: &Chord| c.key != keycode::Key::G;
        let r = h
            .state
            .handle_key(&h.graph, &h.policy, &chord("g"), None, h.t0, &not_g);
        assert_eq!(r.response, KeyResponse::PassThrough);
        assert!(h.state.is_idle());
    }

    #[test]
    fn revalidate_drops_chord_without_usable_continuations() {
        let mut h = Harness::new(GG);
        h.key("g", 0);
        assert!(!h.state.revalidate(&h.graph, &any));
        assert!(h.state.revalidate(&h.graph, &|_: &Chord| false));
        assert!(h.state.is_idle());
    }
}
