//! The application registry: stable app ids and their parsed bindings.

use std::collections::{HashMap, HashSet};

use keycode::{Chord, KeyIdentity, ParseError};
use tracing::{debug, warn};

use crate::{ActionSpec, AppId, AppScope, AppSpec, BindingSpec, Error, LinkSpec, MappingConfig};

/// A parsed action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Relay these chords to the focused app, in order.
    Send(Vec<Chord>),
    /// Opaque named action.
    Named(String),
}

/// A validated binding ready for graph construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// Apps this binding applies to.
    pub scope: AppScope,
    /// Keystrokes, first to last. Never empty.
    pub sequence: Vec<KeyIdentity>,
    /// What fires when the sequence completes.
    pub action: Action,
    /// Free-form description.
    pub desc: String,
}

impl Binding {
    /// True for a single-key binding.
    pub fn is_hot_key(&self) -> bool {
        self.sequence.len() == 1
    }

    /// Chords of the sequence.
    pub fn chords(&self) -> Vec<Chord> {
        self.sequence.iter().map(KeyIdentity::chord).collect()
    }
}

/// A validated explicit edge between two chord paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Apps the edge is valid for.
    pub scope: AppScope,
    /// Path to the source node.
    pub from: Vec<Chord>,
    /// Edge key.
    pub key: Chord,
    /// Path to the target node.
    pub to: Vec<Chord>,
}

/// One registered application.
#[derive(Debug, Clone)]
pub struct AppEntry {
    /// Application name.
    pub name: String,
    /// Stable id.
    pub id: AppId,
    /// Parsed bindings, in configured order.
    pub bindings: Vec<Binding>,
}

/// Maps app names to stable ids and ordered binding sets.
///
/// Rebuilt on every configuration change; read-only to the engine. Lookups
/// by unknown names fail soft.
#[derive(Debug, Clone, Default)]
pub struct AppRegistry {
    /// Registered apps in configuration order.
    apps: Vec<AppEntry>,
    /// Name -> index into `apps`.
    by_name: HashMap<String, usize>,
    /// Global bindings in configuration order.
    global: Vec<Binding>,
    /// Explicit edges.
    links: Vec<Link>,
    /// Next automatically assigned id.
    next_id: u32,
}

/// Ids start at 1; 0 historically meant "global".
const FIRST_APP_ID: u32 = 1;

impl AppRegistry {
    /// Build a registry from scratch.
    pub fn build(config: &MappingConfig) -> (Self, Vec<Error>) {
        Self::default().rebuild(config)
    }

    /// Build a new registry, keeping this registry's ids for surviving names.
    pub fn rebuild(&self, config: &MappingConfig) -> (Self, Vec<Error>) {
        let mut errors = Vec::new();
        let specs = unique_apps(&config.apps, &mut errors);
        let ids = self.assign_ids(&specs, &mut errors);

        let mut out = Self {
            next_id: self.next_id.max(FIRST_APP_ID),
            ..Self::default()
        };
        out.global = parse_bindings(None, &AppScope::Global, &config.global, &mut errors);
        for (spec, id) in specs.iter().zip(ids) {
            let Some(id) = id else { continue };
            out.next_id = out.next_id.max(id.0.saturating_add(1));
            let scope = AppScope::app(id);
            let bindings = parse_bindings(
                Some(spec.name.as_str()),
                &scope,
                &spec.bindings,
                &mut errors,
            );
            out.by_name.insert(spec.name.clone(), out.apps.len());
            out.apps.push(AppEntry {
                name: spec.name.clone(),
                id,
                bindings,
            });
        }
        for (i, l) in config.links.iter().enumerate() {
            match out.parse_link(i, l) {
                Ok(link) => out.links.push(link),
                Err(e) => errors.push(e),
            }
        }
        for e in &errors {
            warn!(error = %e, "config_entry_skipped");
        }
        debug!(
            apps = out.apps.len(),
            global = out.global.len(),
            links = out.links.len(),
            errors = errors.len(),
            "app_registry_built"
        );
        (out, errors)
    }

    /// Pick an id for every unique app; `None` where the app is rejected.
    fn assign_ids(&self, specs: &[&AppSpec], errors: &mut Vec<Error>) -> Vec<Option<AppId>> {
        let mut taken: HashSet<u32> = HashSet::new();
        let mut ids: Vec<Option<AppId>> = vec![None; specs.len()];
        let mut pending = Vec::new();

        for (i, spec) in specs.iter().enumerate() {
            match spec.id {
                Some(0) => {
                    errors.push(Error::validation(format!(
                        "app '{}': id 0 is reserved",
                        spec.name
                    )));
                }
                Some(id) if !taken.insert(id) => {
                    errors.push(Error::validation(format!(
                        "app '{}': id {} is already used by another app",
                        spec.name, id
                    )));
                }
                Some(id) => ids[i] = Some(AppId(id)),
                None => pending.push(i),
            }
        }

        // Keep previous ids first so that new apps cannot steal them.
        let mut fresh = Vec::new();
        for i in pending {
            match self.id_for_app(&specs[i].name) {
                Some(prev) if taken.insert(prev.0) => ids[i] = Some(prev),
                _ => fresh.push(i),
            }
        }

        let mut next = self.next_id.max(FIRST_APP_ID);
        for i in fresh {
            while taken.contains(&next) {
                next += 1;
            }
            taken.insert(next);
            ids[i] = Some(AppId(next));
        }
        ids
    }

    /// Validate one link entry.
    fn parse_link(&self, index: usize, spec: &LinkSpec) -> Result<Link, Error> {
        let scope = match &spec.app {
            None => AppScope::Global,
            Some(name) => AppScope::app(self.id_for_app(name).ok_or_else(|| {
                Error::validation(format!("link {}: unknown app '{}'", index, name))
            })?),
        };
        let key_err = |source: ParseError| Error::Key {
            app: spec.app.clone(),
            binding: index,
            source,
        };
        let parse_path = |path: &[String]| -> Result<Vec<Chord>, Error> {
            path.iter()
                .map(|s| Chord::parse(s).map_err(key_err))
                .collect()
        };
        let from = parse_path(&spec.from)?;
        let to = parse_path(&spec.to)?;
        if to.is_empty() {
            return Err(Error::validation(format!(
                "link {}: target path is empty",
                index
            )));
        }
        Ok(Link {
            scope,
            from,
            key: Chord::parse(&spec.key).map_err(key_err)?,
            to,
        })
    }

    /// True if an app with this name is configured.
    pub fn is_app_registered(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Stable id for `name`, if configured.
    pub fn id_for_app(&self, name: &str) -> Option<AppId> {
        self.by_name.get(name).map(|&i| self.apps[i].id)
    }

    /// Name of the app with this id.
    pub fn name_for_id(&self, id: AppId) -> Option<&str> {
        self.apps
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.name.as_str())
    }

    /// Ordered bindings for `name`; empty when unknown.
    pub fn hot_keys_for_app(&self, name: &str) -> &[Binding] {
        self.by_name
            .get(name)
            .map(|&i| self.apps[i].bindings.as_slice())
            .unwrap_or_default()
    }

    /// Global bindings in configured order.
    pub fn global_bindings(&self) -> &[Binding] {
        &self.global
    }

    /// Every binding in priority order: apps in configured order, then globals.
    ///
    /// App bindings come first so that an app can override a global binding
    /// on the same keys.
    pub fn bindings(&self) -> impl Iterator<Item = &Binding> {
        self.apps
            .iter()
            .flat_map(|a| a.bindings.iter())
            .chain(self.global.iter())
    }

    /// Explicit edges.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Registered apps in configured order.
    pub fn apps(&self) -> &[AppEntry] {
        &self.apps
    }
}

/// Drop apps whose name repeats an earlier entry.
fn unique_apps<'a>(apps: &'a [AppSpec], errors: &mut Vec<Error>) -> Vec<&'a AppSpec> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for a in apps {
        if seen.insert(a.name.as_str()) {
            out.push(a);
        } else {
            errors.push(Error::validation(format!(
                "app '{}' is configured more than once",
                a.name
            )));
        }
    }
    out
}

/// Parse a binding list, skipping (and reporting) malformed entries.
fn parse_bindings(
    app: Option<&str>,
    scope: &AppScope,
    specs: &[BindingSpec],
    errors: &mut Vec<Error>,
) -> Vec<Binding> {
    let mut out = Vec::new();
    for (i, spec) in specs.iter().enumerate() {
        match parse_binding(app, i, scope, spec) {
            Ok(b) => out.push(b),
            Err(e) => errors.push(e),
        }
    }
    out
}

/// Parse one binding.
fn parse_binding(
    app: Option<&str>,
    index: usize,
    scope: &AppScope,
    spec: &BindingSpec,
) -> Result<Binding, Error> {
    let key_err = |source: ParseError| Error::Key {
        app: app.map(str::to_string),
        binding: index,
        source,
    };
    if spec.keys.is_empty() {
        return Err(Error::validation(format!(
            "{} binding {}: no keys",
            app.unwrap_or("global"),
            index
        )));
    }
    let sequence = spec
        .keys
        .iter()
        .map(|k| KeyIdentity::parse(k).map_err(key_err))
        .collect::<Result<Vec<_>, _>>()?;
    let action = match &spec.action {
        ActionSpec::Named(n) => Action::Named(n.clone()),
        ActionSpec::Send(keys) => Action::Send(
            keys.iter()
                .map(|k| Chord::parse(k).map_err(key_err))
                .collect::<Result<Vec<_>, _>>()?,
        ),
    };
    Ok(Binding {
        scope: scope.clone(),
        sequence,
        action,
        desc: spec.desc.clone(),
    })
}
