//! Randomised checks of app scoping and firing.

use std::time::{Duration, Instant};

use config::{
    ActionSpec, AppId, AppRegistry, AppSpec, BindingSpec, ChordPolicy, MappingConfig,
};
use keycode::Chord;
use keymode::{ChordGraph, KeyResponse, State};
use proptest::prelude::*;

const KEYS: [&str; 4] = ["a", "b", "ctrl+a", "f5"];

/// (scope selector, key indices); selector 0 is global, n is app n.
type RawBinding = (u32, Vec<usize>);

fn binding_strategy() -> impl Strategy<Value = RawBinding> {
    (0u32..4, prop::collection::vec(0usize..KEYS.len(), 1..=3))
}

fn mapping(raw: &[RawBinding]) -> MappingConfig {
    let spec = |(i, (_, keys)): (usize, &RawBinding)| BindingSpec {
        keys: keys.iter().map(|&k| KEYS[k].to_string()).collect(),
        action: ActionSpec::Named(format!("b{i}")),
        desc: String::new(),
    };
    let mut cfg = MappingConfig {
        apps: (1..4)
            .map(|id| AppSpec {
                name: format!("App{id}"),
                id: Some(id),
                bindings: vec![],
            })
            .collect(),
        ..MappingConfig::default()
    };
    for (i, b) in raw.iter().enumerate() {
        match b.0 {
            0 => cfg.global.push(spec((i, b))),
            n => cfg.apps[(n - 1) as usize].bindings.push(spec((i, b))),
        }
    }
    cfg
}

fn app_for(sel: u32) -> Option<AppId> {
    (sel > 0).then_some(AppId(sel))
}

proptest! {
    #[test]
    fn fired_nodes_are_valid_for_the_firing_app(
        raw in prop::collection::vec(binding_strategy(), 1..8),
        presses in prop::collection::vec((0usize..KEYS.len(), 0u32..4, 0u64..700), 1..30),
        timer in any::<bool>(),
    ) {
        let (reg, errs) = AppRegistry::build(&mapping(&raw));
        prop_assert!(errs.is_empty());
        let (graph, gerrs) = ChordGraph::from_registry(&reg);
        prop_assert!(gerrs.is_empty());

        let policy = ChordPolicy { chord_timer: timer, ..ChordPolicy::default() };
        let mut state = State::new();
        let mut now = Instant::now();
        for (k, sel, delay) in presses {
            now += Duration::from_millis(delay);
            let key = Chord::parse(KEYS[k]).unwrap();
            let app = app_for(sel);
            let out = state.handle_key(&graph, &policy, &key, app, now, &|_: &Chord| true);
            prop_assert!(out.committed.is_none());
            match out.response {
                KeyResponse::Fire(f) => {
                    prop_assert_eq!(f.app, app);
                    prop_assert!(graph.node(f.node).valid_apps().contains(app));
                    for depth in 1..=f.path.len() {
                        prop_assert!(graph.lookup(&f.path[..depth], app).is_some());
                    }
                    prop_assert_eq!(graph.node(f.node).action_for(app), Some(&f.action));
                    prop_assert!(state.is_idle());
                }
                KeyResponse::Armed { node, .. } => {
                    prop_assert!(timer);
                    prop_assert!(graph.node(node).valid_apps().contains(app));
                    prop_assert_eq!(state.pending().map(|p| p.app), Some(app));
                }
                _ => {}
            }
        }
    }
}
