use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
    time::{Duration, Instant},
};

use config::{AppId, AppScope};
use hotkey_backend::HotkeyBackend;
use keycode::{Chord, KeyIdentity, Registration};
use tracing::{debug, trace, warn};

use crate::{Error, Result};

/// Threshold for warning about slow binding updates that may cause key drops
const BIND_UPDATE_WARN_MS: u64 = 10;

/// First registration id handed to the backend.
const FIRST_REGISTRATION_ID: u32 = 1;

/// What one call to [`BindingManager::apply`] changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    /// Chords newly registered.
    pub added: Vec<Chord>,
    /// Chords unregistered.
    pub removed: Vec<Chord>,
    /// Chords the backend refused, with the reason.
    pub failed: Vec<(Chord, hotkey_backend::Error)>,
}

impl ApplyReport {
    /// True if the active set changed.
    pub fn changed(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// Owns the set of chords registered with the backend.
///
/// Every registration goes through here so the active set and the
/// id → chord map never drift from what the backend holds.
pub struct BindingManager {
    /// Registration facility.
    backend: Arc<dyn HotkeyBackend>,
    /// Active registrations keyed by chord; each identity has its
    /// [`Registration`] attached.
    active: BTreeMap<Chord, KeyIdentity>,
    /// Registration id → chord, for resolving backend events.
    by_id: HashMap<u32, Chord>,
    /// Chords the backend refused. Not retried until [`Self::clear_failures`].
    failed: BTreeSet<Chord>,
    /// Chords registered through the API rather than the mapping, with the
    /// apps they apply to.
    manual: BTreeMap<Chord, AppScope>,
    /// Next registration id to hand out.
    next_id: u32,
}

impl BindingManager {
    /// Create a manager with nothing registered.
    pub fn new(backend: Arc<dyn HotkeyBackend>) -> Self {
        Self {
            backend,
            active: BTreeMap::new(),
            by_id: HashMap::new(),
            failed: BTreeSet::new(),
            manual: BTreeMap::new(),
            next_id: FIRST_REGISTRATION_ID,
        }
    }

    /// Bring the active set to exactly `desired`, minus refused chords.
    ///
    /// Removed chords are unregistered before new ones are registered;
    /// chords present in both are left alone so they never go dark.
    pub fn apply(&mut self, desired: &BTreeSet<Chord>) -> ApplyReport {
        let start = Instant::now();
        let mut report = ApplyReport::default();

        let removed: Vec<Chord> = self
            .active
            .keys()
            .filter(|c| !desired.contains(*c))
            .copied()
            .collect();
        let added: Vec<Chord> = desired
            .iter()
            .filter(|c| !self.active.contains_key(*c) && !self.failed.contains(*c))
            .copied()
            .collect();

        if removed.is_empty() && added.is_empty() {
            trace!("Bindings unchanged, skipping update");
            return report;
        }
        debug!(
            "Starting binding update: -{} +{} (of {} active)",
            removed.len(),
            added.len(),
            self.active.len()
        );

        for chord in removed {
            self.release(&chord);
            report.removed.push(chord);
        }

        for chord in added {
            match self.register(KeyIdentity::from_chord(chord)) {
                Ok(_) => report.added.push(chord),
                Err(e) => report.failed.push((chord, e)),
            }
        }

        let elapsed = start.elapsed();
        debug!(
            "Binding update completed in {:?}: {} keys active",
            elapsed,
            self.active.len()
        );
        if elapsed > Duration::from_millis(BIND_UPDATE_WARN_MS) {
            warn!("Binding update took {:?}, may cause key drops", elapsed);
        }
        report
    }

    /// Record `set` as bindings of `app` (`None`: global) and merge the ones
    /// that apply while `focused` is in front into the active registrations.
    ///
    /// Nothing is removed. Bindings for other apps are only recorded; the
    /// engine registers them when their app takes focus.
    pub fn register_hot_keys(
        &mut self,
        set: &[KeyIdentity],
        app: Option<AppId>,
        focused: Option<AppId>,
    ) -> ApplyReport {
        debug!(app = ?app, count = set.len(), "register_hot_keys");
        let scope = AppScope::for_app(app);
        for identity in set {
            self.manual
                .entry(identity.chord())
                .or_insert_with(AppScope::none)
                .union_with(&scope);
        }
        let mut desired = self.active_chords();
        desired.extend(self.manual_for(focused));
        self.apply(&desired)
    }

    /// Register one binding, returning the authoritative identity.
    ///
    /// The returned copy carries the backend [`Registration`]. Registering a
    /// chord that is already active returns the existing registration.
    pub fn register_hot_key(&mut self, identity: &KeyIdentity) -> Result<KeyIdentity> {
        let chord = identity.chord();
        let registered = match self.active.get(&chord) {
            Some(existing) => existing.clone(),
            None => self.register(identity.clone()).map_err(|e| match e {
                hotkey_backend::Error::Conflict { chord } => Error::RegistrationConflict { chord },
                other => Error::Backend(other),
            })?,
        };
        self.manual.insert(chord, AppScope::Global);
        Ok(registered)
    }

    /// API-registered chords that apply while `app` is focused.
    pub fn manual_for(&self, app: Option<AppId>) -> impl Iterator<Item = Chord> + '_ {
        self.manual
            .iter()
            .filter(move |(_, scope)| scope.contains(app))
            .map(|(chord, _)| *chord)
    }

    /// Whether `chord` was registered through the API for `app`.
    pub fn is_manual_for(&self, chord: &Chord, app: Option<AppId>) -> bool {
        self.manual.get(chord).is_some_and(|s| s.contains(app))
    }

    /// Unregister everything and forget API registrations. Idempotent;
    /// returns the chords released.
    pub fn unregister_all_hot_keys(&mut self) -> Vec<Chord> {
        self.manual.clear();
        let chords: Vec<Chord> = self.active.keys().copied().collect();
        for chord in &chords {
            self.release(chord);
        }
        if !chords.is_empty() {
            debug!(count = chords.len(), "unregistered_all_hot_keys");
        }
        chords
    }

    /// Resolve a registration id to its chord.
    pub fn resolve(&self, id: u32) -> Option<Chord> {
        self.by_id.get(&id).copied()
    }

    /// Whether `chord` is currently registered.
    pub fn is_active(&self, chord: &Chord) -> bool {
        self.active.contains_key(chord)
    }

    /// Whether `chord` can take part in matching, i.e. was not refused.
    pub fn is_matchable(&self, chord: &Chord) -> bool {
        !self.failed.contains(chord)
    }

    /// Chords currently registered.
    pub fn active_chords(&self) -> BTreeSet<Chord> {
        self.active.keys().copied().collect()
    }

    /// Chords the backend refused since the last [`Self::clear_failures`].
    pub fn failed_chords(&self) -> &BTreeSet<Chord> {
        &self.failed
    }

    /// Forget refusals so the next [`Self::apply`] retries them.
    pub fn clear_failures(&mut self) {
        self.failed.clear();
    }

    /// Snapshot of active registrations, sorted by chord.
    pub fn bindings_snapshot(&self) -> Vec<KeyIdentity> {
        self.active.values().cloned().collect()
    }

    /// Register `identity` with the backend and record it.
    fn register(&mut self, mut identity: KeyIdentity) -> hotkey_backend::Result<KeyIdentity> {
        let chord = identity.chord();
        let id = self.next_id;
        match self
            .backend
            .register(id, &chord, identity.carbon_modifiers())
        {
            Ok(handle) => {
                self.next_id += 1;
                identity.attach(Registration { id, handle });
                self.by_id.insert(id, chord);
                self.active.insert(chord, identity.clone());
                trace!("Registered key: {} with id {}", chord, id);
                Ok(identity)
            }
            Err(e) => {
                warn!(chord = %chord, error = %e, "registration_failed");
                self.failed.insert(chord);
                Err(e)
            }
        }
    }

    /// Unregister `chord` if active. Backend errors are logged, not returned.
    fn release(&mut self, chord: &Chord) {
        let Some(mut identity) = self.active.remove(chord) else {
            return;
        };
        let Some(reg) = identity.detach() else {
            return;
        };
        self.by_id.remove(&reg.id);
        if let Err(e) = self.backend.unregister(reg.handle) {
            warn!(chord = %chord, error = %e, "unregister_failed");
        }
        trace!("Unregistered key: {} (id {})", chord, reg.id);
    }
}

#[cfg(test)]
mod tests {
    use hotkey_backend::MemoryBackend;

    use super::*;

    fn chord(s: &str) -> Chord {
        Chord::parse(s).expect("chord")
    }

    fn set(keys: &[&str]) -> BTreeSet<Chord> {
        keys.iter().map(|k| chord(k)).collect()
    }

    fn manager() -> (Arc<MemoryBackend>, BindingManager) {
        let backend = Arc::new(MemoryBackend::new());
        let mgr = BindingManager::new(backend.clone());
        (backend, mgr)
    }

    #[test]
    fn apply_diffs_against_active_set() {
        let (backend, mut mgr) = manager();
        let r = mgr.apply(&set(&["cmd+a", "cmd+b"]));
        assert_eq!(r.added.len(), 2);
        assert_eq!(backend.call_counts(), (2, 0));

        let r = mgr.apply(&set(&["cmd+b", "cmd+c"]));
        assert_eq!(r.added, vec![chord("cmd+c")]);
        assert_eq!(r.removed, vec![chord("cmd+a")]);
        // cmd+b stays registered: one new register, one unregister
        assert_eq!(backend.call_counts(), (3, 1));
        assert_eq!(backend.active(), vec![chord("cmd+b"), chord("cmd+c")]);
    }

    #[test]
    fn unchanged_set_makes_no_calls() {
        let (backend, mut mgr) = manager();
        mgr.apply(&set(&["cmd+a"]));
        let r = mgr.apply(&set(&["cmd+a"]));
        assert!(!r.changed());
        assert_eq!(backend.call_counts(), (1, 0));
    }

    #[test]
    fn conflicts_are_reported_once_and_not_retried() {
        let (backend, mut mgr) = manager();
        backend.claim(chord("cmd+b"));
        let r = mgr.apply(&set(&["cmd+a", "cmd+b"]));
        assert_eq!(r.failed.len(), 1);
        assert!(!mgr.is_matchable(&chord("cmd+b")));
        assert!(mgr.is_active(&chord("cmd+a")));

        let r = mgr.apply(&set(&["cmd+a", "cmd+b"]));
        assert!(r.failed.is_empty());

        mgr.clear_failures();
        backend.release(&chord("cmd+b"));
        let r = mgr.apply(&set(&["cmd+a", "cmd+b"]));
        assert_eq!(r.added, vec![chord("cmd+b")]);
    }

    #[test]
    fn register_hot_key_returns_authoritative_copy() {
        let (_backend, mut mgr) = manager();
        let ident = KeyIdentity::parse("ctrl+g").expect("ident");
        assert!(ident.registration().is_none());
        let a = mgr.register_hot_key(&ident).expect("register");
        let reg = a.registration().expect("attached");
        assert_eq!(mgr.resolve(reg.id), Some(chord("ctrl+g")));

        let b = mgr.register_hot_key(&ident).expect("upsert");
        assert_eq!(b.registration().map(|r| r.id), Some(reg.id));
    }

    #[test]
    fn register_hot_key_maps_conflict() {
        let (backend, mut mgr) = manager();
        backend.claim(chord("ctrl+g"));
        let err = mgr
            .register_hot_key(&KeyIdentity::parse("ctrl+g").expect("ident"))
            .expect_err("conflict");
        assert!(matches!(err, Error::RegistrationConflict { .. }));
    }

    #[test]
    fn register_hot_keys_merges() {
        let (_backend, mut mgr) = manager();
        mgr.apply(&set(&["cmd+a"]));
        let extra = vec![KeyIdentity::parse("cmd+b").expect("ident")];
        mgr.register_hot_keys(&extra, Some(AppId(1)), Some(AppId(1)));
        assert_eq!(mgr.active_chords(), set(&["cmd+a", "cmd+b"]));
    }

    #[test]
    fn register_hot_keys_holds_other_apps_back() {
        let (_backend, mut mgr) = manager();
        let extra = vec![KeyIdentity::parse("cmd+b").expect("ident")];
        let r = mgr.register_hot_keys(&extra, Some(AppId(1)), Some(AppId(2)));
        assert!(!r.changed());
        assert!(mgr.is_manual_for(&chord("cmd+b"), Some(AppId(1))));
        assert!(!mgr.is_manual_for(&chord("cmd+b"), Some(AppId(2))));
        assert_eq!(mgr.manual_for(Some(AppId(1))).collect::<Vec<_>>(), vec![chord("cmd+b")]);
        assert_eq!(mgr.manual_for(None).count(), 0);

        mgr.unregister_all_hot_keys();
        assert!(!mgr.is_manual_for(&chord("cmd+b"), Some(AppId(1))));
    }

    #[test]
    fn unregister_all_is_idempotent() {
        let (backend, mut mgr) = manager();
        mgr.apply(&set(&["cmd+a", "cmd+b"]));
        assert_eq!(mgr.unregister_all_hot_keys().len(), 2);
        assert!(mgr.unregister_all_hot_keys().is_empty());
        assert!(backend.active().is_empty());
        assert_eq!(mgr.resolve(1), None);
    }
}
