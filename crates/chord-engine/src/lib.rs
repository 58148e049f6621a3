//! Chord Engine
//!
//! Drives the chord automaton from backend key events:
//! - keeps backend registrations in step with the automaton state
//! - schedules and cancels chord expiry
//! - relays `send` actions, and intercepted keys it has no use for, to the
//!   focused app
//! - publishes dispatches and registration changes to subscribers
//!
//! [`Engine`] is the type you construct and drive. Everything it touches
//! lives behind one async mutex, so key events, timer expiries, focus
//! changes and configuration updates are applied one at a time in arrival
//! order.
use std::{
    collections::BTreeSet,
    sync::Arc,
    time::{Duration, Instant},
};

mod error;
mod key_binding;
mod notification;
mod relay;
pub mod test_support;
mod ticker;

/// Threshold for warning about slow key processing.
const KEY_PROC_WARN_MS: u64 = 5;

/// How often the event bridge checks whether its consumer went away.
const BRIDGE_POLL_MS: u64 = 50;

use config::{AppId, AppRegistry, Binding, ChordPolicy, MappingConfig, Settings};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use hotkey_backend::{Event, EventKind, HotkeyBackend};
use keycode::{Chord, KeyIdentity};
use keymode::{ChordGraph, Expiry, Fired, KeyResponse, Mode, State};
use tokio::{
    sync::{
        Mutex,
        mpsc::{UnboundedReceiver, unbounded_channel},
    },
    time,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

pub use error::{Error, Result};
pub use key_binding::{ApplyReport, BindingManager};
pub use notification::{Dispatch, EngineEvent, NotificationDispatcher};
pub use relay::{KeySender, RelayHandler};
pub use ticker::ExpiryTimer;

/// Whether the engine is processing keys and holding registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    /// Normal operation.
    Running,
    /// Registrations released; keys pass through until resumed.
    Suspended,
    /// Torn down; nothing is registered again.
    Closed,
}

/// Everything the engine mutates, guarded by one lock.
struct Core {
    /// Policy applied to the next key.
    policy: ChordPolicy,
    /// Parsed configuration.
    registry: AppRegistry,
    /// Chord graph built from `registry`.
    graph: ChordGraph,
    /// Automaton.
    state: State,
    /// Backend registrations.
    bindings: BindingManager,
    /// Focused configured app, if any.
    app: Option<AppId>,
    /// Expiry for the pending chord.
    timer: ExpiryTimer,
    /// Running, suspended or closed.
    lifecycle: Lifecycle,
}

/// Engine coordinates chord state, focus context, registrations and dispatch.
///
/// Construct via [`Engine::new`], install a mapping with
/// [`Engine::set_mapping`], then feed backend events via [`Engine::dispatch`]
/// (or [`Engine::run`]) and focus changes via [`Engine::set_app`].
#[derive(Clone)]
pub struct Engine {
    /// Shared engine state.
    core: Arc<Mutex<Core>>,
    /// Event fan-out.
    notifier: NotificationDispatcher,
    /// Key relay for `send` actions and unused intercepted keys.
    relay: RelayHandler,
}

impl Engine {
    /// Create an engine with an empty mapping.
    ///
    /// - `backend`: registration facility
    /// - `policy`: initial chord policy
    /// - `sender`: where relayed keys are posted; `None` drops them
    pub fn new(
        backend: Arc<dyn HotkeyBackend>,
        policy: ChordPolicy,
        sender: Option<Arc<dyn KeySender>>,
    ) -> Self {
        let (registry, _) = AppRegistry::build(&MappingConfig::default());
        let (graph, _) = ChordGraph::from_registry(&registry);
        let core = Core {
            policy,
            registry,
            graph,
            state: State::new(),
            bindings: BindingManager::new(backend),
            app: None,
            timer: ExpiryTimer::new(),
            lifecycle: Lifecycle::Running,
        };
        Self {
            core: Arc::new(Mutex::new(core)),
            notifier: NotificationDispatcher::new(),
            relay: RelayHandler::new(sender),
        }
    }

    /// Subscribe to engine events.
    pub fn subscribe(&self) -> UnboundedReceiver<EngineEvent> {
        self.notifier.subscribe()
    }

    /// Install a new mapping.
    ///
    /// Rejected entries are returned and the rest is installed. App ids are
    /// carried over by name. Any pending chord is dropped, and chords the
    /// backend refused earlier are retried.
    pub async fn set_mapping(&self, mapping: &MappingConfig) -> Vec<Error> {
        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        let (registry, config_errors) = core.registry.rebuild(mapping);
        let (graph, graph_errors) = ChordGraph::from_registry(&registry);
        let errors: Vec<Error> = config_errors
            .into_iter()
            .map(Error::from)
            .chain(graph_errors.into_iter().map(Error::from))
            .collect();
        for e in &errors {
            warn!(error = %e, "mapping_entry_rejected");
        }

        core.registry = registry;
        core.graph = graph;
        core.state.reset();
        core.bindings.clear_failures();
        info!(
            apps = core.registry.apps().len(),
            nodes = core.graph.len(),
            rejected = errors.len(),
            "mapping_installed"
        );
        self.emit(EngineEvent::ConfigChanged);
        self.sync(core);
        errors
    }

    /// Apply loaded settings.
    pub async fn apply_settings(&self, settings: &Settings) -> Result<()> {
        let policy = settings.policy()?;
        self.set_policy(policy).await;
        Ok(())
    }

    /// Replace the chord policy.
    ///
    /// Takes effect from the next key. A chord already waiting keeps the
    /// deadline and commit policy it was armed with.
    pub async fn set_policy(&self, policy: ChordPolicy) {
        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        debug!(?policy, "policy_changed");
        core.policy = policy;
        self.sync(core);
    }

    /// Re-apply the main engine switches, leaving the rest of the policy as is.
    pub async fn configure(&self, dynamic_registration: bool, chord_timer: bool, timeout: Duration) {
        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        core.policy.dynamic_registration = dynamic_registration;
        core.policy.chord_timer = chord_timer;
        core.policy.timeout = timeout;
        debug!(dynamic_registration, chord_timer, ?timeout, "engine_configured");
        self.sync(core);
    }

    /// Current policy.
    pub async fn policy(&self) -> ChordPolicy {
        self.core.lock().await.policy
    }

    /// Report that focus moved to `app` (`None`: no configured app).
    pub async fn set_app(&self, app: Option<AppId>) {
        let mut guard = self.core.lock().await;
        self.focus(&mut guard, app);
    }

    /// Report focus by app name. Unknown names count as no configured app.
    pub async fn set_app_by_name(&self, name: Option<&str>) -> Option<AppId> {
        let mut guard = self.core.lock().await;
        let app = name.and_then(|n| guard.registry.id_for_app(n));
        if app.is_none()
            && let Some(n) = name
        {
            trace!(name = n, "focus_unconfigured_app");
        }
        self.focus(&mut guard, app);
        app
    }

    /// Focused configured app.
    pub async fn app(&self) -> Option<AppId> {
        self.core.lock().await.app
    }

    /// Feed one key press for `app`.
    ///
    /// A different `app` than the current one is treated as a focus change
    /// first.
    pub async fn handle_key(&self, chord: Chord, app: Option<AppId>) -> KeyResponse {
        let mut guard = self.core.lock().await;
        self.focus(&mut guard, app);
        self.process(&mut guard, chord, false)
    }

    /// Feed one key press from a raw keycode and CoreGraphics flag mask.
    ///
    /// Returns `None` if the keycode is unknown.
    pub async fn handle_raw(&self, keycode: u16, flags: u64) -> Option<KeyResponse> {
        let chord = Chord::from_raw(keycode, flags)?;
        let mut guard = self.core.lock().await;
        Some(self.process(&mut guard, chord, false))
    }

    /// Handle one backend event.
    ///
    /// Key releases and auto-repeats are ignored. Returns `None` when the
    /// event was ignored or its registration id is unknown. A key the
    /// backend intercepted but nothing consumes is relayed to the focused
    /// app.
    pub async fn dispatch(&self, event: &Event) -> Option<KeyResponse> {
        if event.kind == EventKind::KeyUp || event.repeat {
            trace!(id = event.id, kind = ?event.kind, repeat = event.repeat, "event_ignored");
            return None;
        }
        let mut guard = self.core.lock().await;
        let Some(chord) = guard.bindings.resolve(event.id) else {
            debug!(id = event.id, chord = %event.chord, "event_for_unknown_registration");
            return None;
        };
        Some(self.process(&mut guard, chord, true))
    }

    /// Dispatch every backend event already queued on `events`.
    pub async fn pump(&self, events: &Receiver<Event>) -> Vec<KeyResponse> {
        let mut out = Vec::new();
        while let Ok(ev) = events.try_recv() {
            if let Some(resp) = self.dispatch(&ev).await {
                out.push(resp);
            }
        }
        out
    }

    /// Dispatch backend events until `cancel` fires or the backend goes away.
    pub async fn run(&self, events: Receiver<Event>, cancel: CancellationToken) {
        let (tx, mut rx) = unbounded_channel();
        let bridge = tokio::task::spawn_blocking(move || {
            loop {
                match events.recv_timeout(Duration::from_millis(BRIDGE_POLL_MS)) {
                    Ok(ev) => {
                        if tx.send(ev).is_err() {
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        if tx.is_closed() {
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });
        debug!("engine_run_started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                ev = rx.recv() => match ev {
                    Some(ev) => {
                        self.dispatch(&ev).await;
                    }
                    None => break,
                },
            }
        }
        drop(rx);
        if let Err(e) = bridge.await {
            warn!(error = %e, "event_bridge_failed");
        }
        debug!("engine_run_stopped");
    }

    /// Register `set` for `app` (`None`: every app) in addition to whatever
    /// the mapping needs.
    ///
    /// The chords are held only while their app is focused, like mapping
    /// bindings, until [`Engine::unregister_all_hot_keys`]. Pressing one
    /// publishes [`EngineEvent::DidTriggerManualHotKey`].
    pub async fn register_hot_keys(&self, set: &[KeyIdentity], app: Option<AppId>) -> ApplyReport {
        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        let report = core.bindings.register_hot_keys(set, app, core.app);
        self.report(core, &report);
        self.sync(core);
        report
    }

    /// Register one chord and return the identity with its registration attached.
    pub async fn register_hot_key(&self, identity: &KeyIdentity) -> Result<KeyIdentity> {
        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        let before = core.bindings.active_chords();
        let registered = core.bindings.register_hot_key(identity)?;
        if core.bindings.active_chords() != before {
            self.emit_active(core);
        }
        Ok(registered)
    }

    /// Release every registration and stop matching until [`Engine::resume`].
    ///
    /// Idempotent. Any pending chord is dropped.
    pub async fn unregister_all_hot_keys(&self) {
        let mut guard = self.core.lock().await;
        if guard.lifecycle == Lifecycle::Running {
            guard.lifecycle = Lifecycle::Suspended;
        }
        self.teardown(&mut guard);
    }

    /// Re-register after [`Engine::unregister_all_hot_keys`].
    pub async fn resume(&self) {
        let mut guard = self.core.lock().await;
        if guard.lifecycle != Lifecycle::Suspended {
            return;
        }
        guard.lifecycle = Lifecycle::Running;
        debug!("engine_resumed");
        self.sync(&mut guard);
    }

    /// Release everything for good.
    pub async fn shutdown(&self) {
        let mut guard = self.core.lock().await;
        guard.lifecycle = Lifecycle::Closed;
        self.teardown(&mut guard);
        info!("engine_shutdown");
    }

    /// Whether `name` is a configured app.
    pub async fn is_app_registered(&self, name: &str) -> bool {
        self.core.lock().await.registry.is_app_registered(name)
    }

    /// Id assigned to the app called `name`.
    pub async fn id_for_app(&self, name: &str) -> Option<AppId> {
        self.core.lock().await.registry.id_for_app(name)
    }

    /// Bindings configured for the app called `name`, in priority order.
    pub async fn hot_keys_for_app(&self, name: &str) -> Vec<Binding> {
        self.core.lock().await.registry.hot_keys_for_app(name).to_vec()
    }

    /// Current automaton mode.
    pub async fn mode(&self) -> Mode {
        self.core.lock().await.state.mode().clone()
    }

    /// Active registrations, sorted by chord.
    pub async fn bindings_snapshot(&self) -> Vec<KeyIdentity> {
        self.core.lock().await.bindings.bindings_snapshot()
    }

    /// Feed one key to the automaton and apply the consequences.
    ///
    /// `intercepted` marks keys the backend took from the focused app; one
    /// that ends up unused is handed back to it.
    fn process(&self, core: &mut Core, chord: Chord, intercepted: bool) -> KeyResponse {
        if core.lifecycle != Lifecycle::Running {
            trace!(chord = %chord, "key_while_inactive");
            return KeyResponse::PassThrough;
        }
        let start = Instant::now();
        let now = time::Instant::now().into_std();
        let app = core.app;
        let bindings = &core.bindings;
        let outcome = core.state.handle_key(
            &core.graph,
            &core.policy,
            &chord,
            app,
            now,
            &|c| bindings.is_matchable(c),
        );
        if let Some(fired) = outcome.committed {
            self.fire(fired);
        }
        match &outcome.response {
            KeyResponse::Fire(fired) => self.fire(fired.clone()),
            KeyResponse::PassThrough if core.bindings.is_manual_for(&chord, app) => {
                self.emit(EngineEvent::DidTriggerManualHotKey { chord, app });
            }
            KeyResponse::PassThrough if intercepted => {
                debug!(chord = %chord, "relay_unused_key");
                self.relay.relay(&[chord]);
            }
            _ => {}
        }
        trace!(chord = %chord, response = ?outcome.response, "key_processed");
        self.sync(core);

        let elapsed = start.elapsed();
        if elapsed > Duration::from_millis(KEY_PROC_WARN_MS) {
            warn!("Key processing took {:?} for {}", elapsed, chord);
        }
        outcome.response
    }

    /// Handle a scheduled expiry.
    async fn expire(&self, generation: u64) {
        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        match core.state.expire(&core.graph, generation) {
            Expiry::Stale => return,
            Expiry::Abandoned => {}
            Expiry::Commit(fired) => self.fire(fired),
        }
        self.sync(core);
    }

    /// Apply a focus change. Any pending chord is dropped.
    fn focus(&self, core: &mut Core, app: Option<AppId>) {
        if core.app == app {
            return;
        }
        debug!(old = ?core.app, new = ?app, "focus_changed");
        core.app = app;
        core.state.reset();
        self.sync(core);
    }

    /// Relay and publish a dispatch.
    fn fire(&self, fired: Fired) {
        if let config::Action::Send(chords) = &fired.action {
            self.relay.relay(chords);
        }
        self.emit(EngineEvent::fired(fired));
    }

    /// Bring registrations and the expiry timer in line with the automaton.
    fn sync(&self, core: &mut Core) {
        if core.lifecycle != Lifecycle::Running {
            core.timer.cancel();
            return;
        }
        loop {
            let desired = desired_chords(core);
            let report = core.bindings.apply(&desired);
            self.report(core, &report);
            let bindings = &core.bindings;
            // Refused continuations can leave a pending chord with nowhere to go.
            if !core
                .state
                .revalidate(&core.graph, &|c| bindings.is_matchable(c))
            {
                break;
            }
        }
        self.sync_timer(core);
    }

    /// Arm the timer for the pending chord, or cancel it when idle.
    fn sync_timer(&self, core: &mut Core) {
        let Some(pending) = core.state.pending() else {
            core.timer.cancel();
            return;
        };
        let generation = pending.generation;
        if core.timer.generation() == Some(generation) {
            return;
        }
        let engine = self.clone();
        core.timer.arm(generation, pending.deadline, move || async move {
            engine.expire(generation).await;
        });
    }

    /// Release registrations and drop any pending chord.
    fn teardown(&self, core: &mut Core) {
        core.state.reset();
        core.timer.cancel();
        if !core.bindings.unregister_all_hot_keys().is_empty() {
            self.emit_active(core);
        }
    }

    /// Publish the events for one registration update.
    fn report(&self, core: &Core, report: &ApplyReport) {
        for (chord, error) in &report.failed {
            self.emit(EngineEvent::RegistrationFailed {
                chord: *chord,
                error: error.clone(),
            });
        }
        if report.changed() {
            self.emit_active(core);
        }
    }

    /// Publish the current registered set.
    fn emit_active(&self, core: &Core) {
        self.emit(EngineEvent::HotKeysChanged {
            active: core.bindings.active_chords().into_iter().collect(),
        });
    }

    /// Publish to subscribers; a dropped subscriber is not an error here.
    fn emit(&self, event: EngineEvent) {
        if let Err(e) = self.notifier.publish(event) {
            trace!(error = %e, "subscriber_dropped");
        }
    }
}

/// Chords that should be registered right now.
///
/// API registrations for the focused app are always included. With dynamic
/// registration: the top level for the focused app, plus the pending node's
/// continuations and the escape key while a chord waits. Without it: every
/// chord in the graph, always.
fn desired_chords(core: &Core) -> BTreeSet<Chord> {
    let mut set: BTreeSet<Chord> = core.bindings.manual_for(core.app).collect();
    if !core.policy.dynamic_registration {
        set.extend(core.graph.all_chords());
        return set;
    }
    let app = core.app;
    let top = core.graph.top_level(app).into_iter();
    if core.policy.chord_timer {
        set.extend(top);
    } else {
        // Without the timer a pure prefix can never fire; leave it to the app.
        set.extend(top.filter(|c| {
            core.graph
                .next_node(None, c, app)
                .is_some_and(|n| core.graph.node(n).action_for(app).is_some())
        }));
    }
    if let Some(p) = core.state.pending() {
        set.extend(core.graph.continuations(p.node, p.app));
        if let Some(escape) = core.policy.escape {
            set.insert(escape);
        }
    }
    set
}
