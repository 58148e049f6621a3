//! The chord graph: an arena of nodes reached by key sequences.
//!
//! Nodes are addressed by [`NodeId`] and owned exclusively by the graph.
//! Every edge carries its own [`AppScope`], and so does every node; a
//! transition is only taken when both admit the focused app, so app scoping
//! holds at every hop and not just at the root.

use std::collections::{BTreeMap, BTreeSet};

use config::{Action, AppId, AppRegistry, AppScope, Binding, Link};
use keycode::{Chord, KeyIdentity};
use tracing::{debug, trace};

use crate::{GraphError, error::Path};

/// Handle of a node inside a [`ChordGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Arena index.
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A keyed transition to a child node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// Node reached by the transition.
    pub target: NodeId,
    /// Apps allowed to take this transition.
    pub scope: AppScope,
}

/// Out-edges keyed by the next chord.
pub type Edges = BTreeMap<Chord, Edge>;

/// One position in the chord trie.
#[derive(Debug, Clone)]
pub struct Node {
    /// Key that reaches this node.
    identity: KeyIdentity,
    /// Apps for which this node may fire or be traversed.
    valid_apps: AppScope,
    /// Follow-up keys.
    children: Edges,
    /// Actions in configured order; the first whose scope admits the app wins.
    actions: Vec<(AppScope, Action)>,
    /// Apps for which this node completes a binding.
    standalone_apps: AppScope,
    /// Apps for which this node has a follow-up key.
    prefix_apps: AppScope,
    /// Keys from the root to this node, inclusive.
    path: Vec<Chord>,
}

impl Node {
    /// Create an unscoped node reached by `key` at the end of `path`.
    fn new(key: Chord, path: Vec<Chord>) -> Self {
        Self {
            identity: KeyIdentity::from_chord(key),
            valid_apps: AppScope::none(),
            children: Edges::new(),
            actions: Vec::new(),
            standalone_apps: AppScope::none(),
            prefix_apps: AppScope::none(),
            path,
        }
    }

    /// Key that reaches this node.
    pub fn identity(&self) -> &KeyIdentity {
        &self.identity
    }

    /// Apps this node is valid for.
    pub fn valid_apps(&self) -> &AppScope {
        &self.valid_apps
    }

    /// Outgoing transitions.
    pub fn children(&self) -> &Edges {
        &self.children
    }

    /// Configured actions with their scopes.
    pub fn actions(&self) -> &[(AppScope, Action)] {
        &self.actions
    }

    /// True if any app awaits a follow-up key here.
    pub fn is_prefix(&self) -> bool {
        !self.children.is_empty()
    }

    /// True if any app completes a binding here.
    pub fn is_standalone(&self) -> bool {
        !self.actions.is_empty()
    }

    /// Apps for which this node is standalone.
    pub fn standalone_apps(&self) -> &AppScope {
        &self.standalone_apps
    }

    /// Apps for which this node is a prefix.
    pub fn prefix_apps(&self) -> &AppScope {
        &self.prefix_apps
    }

    /// The single follow-up key, when there is exactly one.
    pub fn next_chord_key(&self) -> Option<Chord> {
        match self.children.len() {
            1 => self.children.keys().next().copied(),
            _ => None,
        }
    }

    /// Keys from the root to this node.
    pub fn path(&self) -> &[Chord] {
        &self.path
    }

    /// First action whose scope admits `app`.
    pub fn action_for(&self, app: Option<AppId>) -> Option<&Action> {
        self.actions
            .iter()
            .find(|(scope, _)| scope.contains(app))
            .map(|(_, a)| a)
    }
}

/// Owned arena of chord nodes plus the top-level transitions.
#[derive(Debug, Clone, Default)]
pub struct ChordGraph {
    /// Node storage.
    nodes: Vec<Node>,
    /// Transitions from the root, keyed by the first chord.
    roots: Edges,
}

impl ChordGraph {
    /// Build a graph from bindings (in priority order) and explicit links.
    ///
    /// Rejected entries are reported and leave the graph as it was before
    /// the entry was attempted.
    pub fn build<'a>(
        bindings: impl IntoIterator<Item = &'a Binding>,
        links: &[Link],
    ) -> (Self, Vec<GraphError>) {
        let mut b = GraphBuilder::default();
        let mut errors = Vec::new();
        for binding in bindings {
            if let Err(e) = b.insert(binding) {
                errors.push(e);
            }
        }
        for link in links {
            if let Err(e) = b.link_paths(link) {
                errors.push(e);
            }
        }
        let graph = b.finish();
        debug!(
            nodes = graph.nodes.len(),
            roots = graph.roots.len(),
            errors = errors.len(),
            "chord_graph_built"
        );
        (graph, errors)
    }

    /// Build from every binding and link in a registry.
    pub fn from_registry(registry: &AppRegistry) -> (Self, Vec<GraphError>) {
        Self::build(registry.bindings(), registry.links())
    }

    /// Node by handle.
    ///
    /// Handles are only produced by this graph, so lookups cannot miss.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when no bindings were inserted.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Top-level transitions.
    pub fn roots(&self) -> &Edges {
        &self.roots
    }

    /// Out-edges of `parent`, or of the root for `None`.
    fn edges(&self, parent: Option<NodeId>) -> &Edges {
        match parent {
            Some(id) => &self.node(id).children,
            None => &self.roots,
        }
    }

    /// Child reached from `parent` (root for `None`) by `key`, if `app` may take it.
    pub fn next_node(
        &self,
        parent: Option<NodeId>,
        key: &Chord,
        app: Option<AppId>,
    ) -> Option<NodeId> {
        let edge = self.edges(parent).get(key)?;
        let ok = edge.scope.contains(app) && self.node(edge.target).valid_apps.contains(app);
        trace!(?parent, key = %key, ?app, matched = ok, "next_node");
        ok.then_some(edge.target)
    }

    /// Walk a full key path from the root for `app`.
    pub fn lookup(&self, path: &[Chord], app: Option<AppId>) -> Option<NodeId> {
        path.iter()
            .try_fold(None, |cur, k| self.next_node(cur, k, app).map(Some))
            .flatten()
    }

    /// Keys that `app` may press from `parent`.
    fn keys_from(&self, parent: Option<NodeId>, app: Option<AppId>) -> Vec<Chord> {
        self.edges(parent)
            .keys()
            .filter(|k| self.next_node(parent, k, app).is_some())
            .copied()
            .collect()
    }

    /// First keys of every sequence valid for `app`.
    pub fn top_level(&self, app: Option<AppId>) -> Vec<Chord> {
        self.keys_from(None, app)
    }

    /// Follow-up keys valid for `app` after reaching `node`.
    pub fn continuations(&self, node: NodeId, app: Option<AppId>) -> Vec<Chord> {
        self.keys_from(Some(node), app)
    }

    /// Every chord appearing anywhere in the graph, for any app.
    pub fn all_chords(&self) -> BTreeSet<Chord> {
        self.roots
            .keys()
            .chain(self.nodes.iter().flat_map(|n| n.children.keys()))
            .copied()
            .collect()
    }

    /// True if `app` has at least one follow-up from `node` that `matchable` admits.
    pub fn is_prefix_for(
        &self,
        node: NodeId,
        app: Option<AppId>,
        matchable: &dyn Fn(&Chord) -> bool,
    ) -> bool {
        self.continuations(node, app).iter().any(matchable)
    }

    /// Apps explicitly named by any node scope.
    pub fn apps(&self) -> BTreeSet<AppId> {
        self.nodes.iter().flat_map(|n| n.valid_apps.apps()).collect()
    }

    /// True if `target` can reach `from` (or is `from`).
    fn reaches(&self, target: NodeId, from: NodeId) -> bool {
        let mut stack = vec![target];
        let mut seen = BTreeSet::new();
        while let Some(n) = stack.pop() {
            if n == from {
                return true;
            }
            if seen.insert(n) {
                stack.extend(self.node(n).children.values().map(|e| e.target));
            }
        }
        false
    }
}

/// Incremental graph construction.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    /// Graph under construction.
    graph: ChordGraph,
}

impl GraphBuilder {
    /// Insert one binding.
    ///
    /// Shared prefixes merge; each node on the path widens its scope to the
    /// binding's apps. The walk completes before anything is mutated, so a
    /// rejected binding leaves the graph untouched.
    pub fn insert(&mut self, binding: &Binding) -> Result<(), GraphError> {
        let chords = binding.chords();
        if chords.is_empty() {
            return Err(GraphError::EmptySequence);
        }

        // Phase 1: find the existing prefix and check it for back-edges.
        let mut ancestors: Vec<NodeId> = Vec::new();
        let mut parent = None;
        for k in &chords {
            let Some(edge) = self.graph.edges(parent).get(k) else {
                break;
            };
            if ancestors.contains(&edge.target) {
                return Err(GraphError::CyclicChordDefinition {
                    path: Path(chords.clone()),
                });
            }
            ancestors.push(edge.target);
            parent = Some(edge.target);
        }

        // Phase 2: widen the existing prefix and create the rest.
        let mut parent: Option<NodeId> = None;
        for (depth, k) in chords.iter().enumerate() {
            let target = match ancestors.get(depth) {
                Some(&id) => id,
                None => self.push_node(*k, chords[..=depth].to_vec()),
            };
            self.connect(parent, *k, target, &binding.scope);
            self.graph.nodes[target.index()]
                .valid_apps
                .union_with(&binding.scope);
            parent = Some(target);
        }

        if let Some(leaf) = parent {
            let node = &mut self.graph.nodes[leaf.index()];
            if let Some(id) = binding.sequence.last()
                && node.actions.is_empty()
            {
                // Keep the configured label on the node's identity.
                node.identity = id.clone();
            }
            node.actions.push((binding.scope.clone(), binding.action.clone()));
            node.standalone_apps.union_with(&binding.scope);
        }
        Ok(())
    }

    /// Add the edge `from --key--> to` valid for `scope`.
    ///
    /// Fails with [`GraphError::CyclicChordDefinition`] when `from` is
    /// reachable from `to`.
    pub fn link(
        &mut self,
        scope: &AppScope,
        from: Option<NodeId>,
        key: Chord,
        to: NodeId,
    ) -> Result<(), GraphError> {
        let path = |g: &ChordGraph| {
            let mut p = from.map(|f| g.node(f).path.clone()).unwrap_or_default();
            p.push(key);
            Path(p)
        };
        if let Some(f) = from
            && self.graph.reaches(to, f)
        {
            return Err(GraphError::CyclicChordDefinition {
                path: path(&self.graph),
            });
        }
        if let Some(existing) = self.graph.edges(from).get(&key)
            && existing.target != to
        {
            return Err(GraphError::DuplicateEdge {
                path: path(&self.graph),
            });
        }
        self.connect(from, key, to, scope);
        self.graph.nodes[to.index()].valid_apps.union_with(scope);
        Ok(())
    }

    /// Resolve a [`Link`]'s paths and add its edge.
    pub fn link_paths(&mut self, link: &Link) -> Result<(), GraphError> {
        let from = if link.from.is_empty() {
            None
        } else {
            Some(self.resolve(&link.from)?)
        };
        let to = self.resolve(&link.to)?;
        self.link(&link.scope, from, link.key, to)
    }

    /// Find the node at `path`, ignoring scopes.
    fn resolve(&self, path: &[Chord]) -> Result<NodeId, GraphError> {
        let mut cur = None;
        for k in path {
            match self.graph.edges(cur).get(k) {
                Some(e) => cur = Some(e.target),
                None => break,
            }
        }
        match cur {
            Some(id) if self.graph.node(id).path.len() == path.len() => Ok(id),
            _ => Err(GraphError::UnknownPath {
                path: Path(path.to_vec()),
            }),
        }
    }

    /// Allocate a node.
    fn push_node(&mut self, key: Chord, path: Vec<Chord>) -> NodeId {
        let id = NodeId(self.graph.nodes.len() as u32);
        self.graph.nodes.push(Node::new(key, path));
        id
    }

    /// Create or widen the edge `parent --key--> target`.
    fn connect(&mut self, parent: Option<NodeId>, key: Chord, target: NodeId, scope: &AppScope) {
        let edges = match parent {
            Some(p) => &mut self.graph.nodes[p.index()].children,
            None => &mut self.graph.roots,
        };
        edges
            .entry(key)
            .and_modify(|e| e.scope.union_with(scope))
            .or_insert_with(|| Edge {
                target,
                scope: scope.clone(),
            });
        if let Some(p) = parent {
            self.graph.nodes[p.index()].prefix_apps.union_with(scope);
        }
    }

    /// Finish construction.
    pub fn finish(self) -> ChordGraph {
        self.graph
    }
}

#[cfg(test)]
mod tests {
    use config::{AppRegistry, MappingConfig};

    use super::*;

    fn chord(s: &str) -> Chord {
        Chord::parse(s).unwrap()
    }

    fn path(keys: &[&str]) -> Vec<Chord> {
        keys.iter().map(|k| chord(k)).collect()
    }

    fn build(ron_text: &str) -> (ChordGraph, Vec<GraphError>) {
        let cfg: MappingConfig = ron::from_str(ron_text).unwrap();
        let (reg, errs) = AppRegistry::build(&cfg);
        assert!(errs.is_empty(), "{errs:?}");
        ChordGraph::from_registry(&reg)
    }

    #[test]
    fn shared_prefixes_merge() {
        let (g, errs) = build(
            r#"(global: [
                (keys: ["ctrl+x", "ctrl+s"], action: named("save")),
                (keys: ["ctrl+x", "ctrl+c"], action: named("quit")),
            ])"#,
        );
        assert!(errs.is_empty());
        assert_eq!(g.len(), 3);
        assert_eq!(g.roots().len(), 1);
        let x = g.lookup(&path(&["ctrl+x"]), None).unwrap();
        let n = g.node(x);
        assert!(n.is_prefix());
        assert!(!n.is_standalone());
        assert_eq!(n.children().len(), 2);
        assert_eq!(n.next_chord_key(), None);
        let conts: BTreeSet<Chord> = g.continuations(x, None).into_iter().collect();
        assert_eq!(
            conts,
            path(&["ctrl+c", "ctrl+s"]).into_iter().collect::<BTreeSet<_>>()
        );
    }

    #[test]
    fn node_can_be_prefix_and_standalone() {
        let (g, _) = build(
            r#"(global: [
                (keys: ["g"], action: named("one")),
                (keys: ["g", "g"], action: named("two")),
            ])"#,
        );
        let n = g.node(g.lookup(&path(&["g"]), None).unwrap());
        assert!(n.is_prefix() && n.is_standalone());
        assert_eq!(n.next_chord_key(), Some(chord("g")));
        let gg = g.node(g.lookup(&path(&["g", "g"]), None).unwrap());
        assert!(gg.is_standalone() && !gg.is_prefix());
    }

    #[test]
    fn app_scope_is_checked_at_every_hop() {
        let (g, _) = build(
            r#"(
                global: [(keys: ["ctrl+x", "g"], action: named("global"))],
                apps: [
                    (name: "A", bindings: [(keys: ["ctrl+x", "a"], action: named("a"))]),
                    (name: "B"),
                ],
            )"#,
        );
        let a = Some(AppId(1));
        let b = Some(AppId(2));
        let x = g.next_node(None, &chord("ctrl+x"), b).unwrap();
        assert_eq!(g.next_node(Some(x), &chord("a"), b), None);
        assert_eq!(g.next_node(Some(x), &chord("a"), None), None);
        assert!(g.next_node(Some(x), &chord("a"), a).is_some());
        assert!(g.next_node(Some(x), &chord("g"), b).is_some());
        assert_eq!(g.node(x).valid_apps(), &AppScope::Global);
        assert_eq!(g.continuations(x, b), path(&["g"]));
        assert_eq!(g.continuations(x, a), path(&["a", "g"]));
    }

    #[test]
    fn app_only_roots_are_invisible_elsewhere() {
        let (g, _) = build(
            r#"(apps: [
                (name: "A", bindings: [(keys: ["cmd+k"], action: named("a"))]),
                (name: "B"),
            ])"#,
        );
        assert_eq!(g.top_level(Some(AppId(1))), path(&["cmd+k"]));
        assert!(g.top_level(Some(AppId(2))).is_empty());
        assert!(g.top_level(None).is_empty());
        assert_eq!(g.all_chords().len(), 1);
        assert_eq!(g.apps(), BTreeSet::from([AppId(1)]));
    }

    #[test]
    fn prefix_status_is_per_app() {
        let (g, _) = build(
            r#"(
                global: [(keys: ["f"], action: named("find"))],
                apps: [(name: "A", bindings: [(keys: ["f", "j"], action: named("jump"))])],
            )"#,
        );
        let f = g.lookup(&path(&["f"]), None).unwrap();
        let any = |_: &Chord| true;
        assert!(!g.is_prefix_for(f, None, &any));
        assert!(g.is_prefix_for(f, Some(AppId(1)), &any));
        assert!(!g.is_prefix_for(f, Some(AppId(1)), &|_: &Chord| false));
        assert!(g.node(f).standalone_apps().is_global());
        assert!(!g.node(f).prefix_apps().contains(None));
    }

    #[test]
    fn app_actions_override_globals() {
        let (g, _) = build(
            r#"(
                global: [(keys: ["cmd+k"], action: named("global"))],
                apps: [(name: "A", bindings: [(keys: ["cmd+k"], action: named("app"))])],
            )"#,
        );
        let k = g.node(g.lookup(&path(&["cmd+k"]), None).unwrap());
        assert_eq!(k.action_for(None), Some(&Action::Named("global".into())));
        assert_eq!(
            k.action_for(Some(AppId(1))),
            Some(&Action::Named("app".into()))
        );
    }

    #[test]
    fn links_share_nodes() {
        let (g, errs) = build(
            r#"(
                global: [
                    (keys: ["ctrl+x", "a"], action: named("a")),
                    (keys: ["ctrl+c"], action: named("c")),
                ],
                links: [(from: ["ctrl+x"], key: "c", to: ["ctrl+c"])],
            )"#,
        );
        assert!(errs.is_empty());
        assert_eq!(
            g.lookup(&path(&["ctrl+x", "c"]), None),
            g.lookup(&path(&["ctrl+c"]), None)
        );
    }

    #[test]
    fn cyclic_links_are_rejected_and_graph_kept() {
        let (g, errs) = build(
            r#"(
                global: [(keys: ["a", "b", "c"], action: named("abc"))],
                links: [
                    (from: ["a", "b", "c"], key: "d", to: ["a"]),
                    (from: ["a"], key: "a", to: ["a"]),
                    (from: ["a"], key: "z", to: ["q"]),
                    (from: ["a"], key: "b", to: ["a", "b", "c"]),
                ],
            )"#,
        );
        assert_eq!(errs.len(), 4);
        assert!(matches!(errs[0], GraphError::CyclicChordDefinition { .. }));
        assert!(matches!(errs[1], GraphError::CyclicChordDefinition { .. }));
        assert!(matches!(errs[2], GraphError::UnknownPath { .. }));
        assert!(matches!(errs[3], GraphError::DuplicateEdge { .. }));
        assert_eq!(errs[0].to_string(), "cyclic chord definition at [a, b, c, d]");
        let c = g.lookup(&path(&["a", "b", "c"]), None).unwrap();
        assert!(g.node(c).children().is_empty());
        assert_eq!(g.len(), 3);
    }

    #[test]
    fn empty_sequences_are_rejected() {
        let mut b = GraphBuilder::default();
        let binding = Binding {
            scope: AppScope::Global,
            sequence: vec![],
            action: Action::Named("x".into()),
            desc: String::new(),
        };
        assert_eq!(b.insert(&binding), Err(GraphError::EmptySequence));
        assert!(b.finish().is_empty());
    }
}
