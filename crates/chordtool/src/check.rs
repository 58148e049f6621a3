//! `chordtool check`: validate a mapping and summarize what it defines.

use config::{AppRegistry, MappingConfig};
use keycode::Chord;
use keymode::ChordGraph;

use crate::{
    cli::CheckArgs,
    error::{Error, Result},
};

/// Load the mapping, print the summary, and fail if anything was rejected.
pub fn run(args: &CheckArgs) -> Result<()> {
    let mapping = config::load_mapping_from_path(&args.mapping)?;
    let (text, rejected) = summarize(&mapping);
    print!("{text}");
    if rejected > 0 {
        return Err(Error::Rejected { count: rejected });
    }
    Ok(())
}

/// Render a human-readable summary. Returns the text and the rejected count.
fn summarize(mapping: &MappingConfig) -> (String, usize) {
    let (registry, config_errors) = AppRegistry::build(mapping);
    let (graph, graph_errors) = ChordGraph::from_registry(&registry);

    let mut lines = vec![format!("apps: {}", registry.apps().len())];
    lines.extend(registry.apps().iter().map(|app| {
        format!("  {} {} ({} bindings)", app.id, app.name, app.bindings.len())
    }));
    lines.push(format!("global: {} bindings", registry.global_bindings().len()));
    lines.push(format!("nodes: {}", graph.len()));
    lines.push(format!("roots (global): {}", keys(&graph.top_level(None))));
    lines.extend(registry.apps().iter().map(|app| {
        format!("roots ({}): {}", app.name, keys(&graph.top_level(Some(app.id))))
    }));

    let rejected = config_errors.len() + graph_errors.len();
    if rejected > 0 {
        lines.push(format!("rejected: {rejected}"));
        lines.extend(config_errors.iter().map(|e| format!("  {}", e.pretty())));
        lines.extend(graph_errors.iter().map(|e| format!("  {e}")));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    (out, rejected)
}

/// Space-separated canonical key list.
fn keys(chords: &[Chord]) -> String {
    if chords.is_empty() {
        return "-".to_string();
    }
    chords
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
