//! `chordtool replay`: drive an engine over an in-memory backend and print
//! everything it publishes.

use std::{str::FromStr, sync::Arc, time::Duration};

use chord_engine::{Engine, EngineEvent, KeySender};
use config::{Action, ChordPolicy, MappingConfig, Settings};
use hotkey_backend::{EventKind, MemoryBackend};
use keycode::Chord;
use keymode::KeyResponse;
use tokio::{runtime, sync::mpsc::UnboundedReceiver, time};
use tracing::debug;

use crate::{
    cli::ReplayArgs,
    error::{Error, Result},
};

/// One replay step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Press and release a key.
    Key(Chord),
    /// Let time pass.
    Wait(Duration),
    /// Move focus to the named app; `None` clears focus.
    App(Option<String>),
}

impl FromStr for Step {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: String| Error::Step {
            step: s.to_string(),
            reason,
        };
        if let Some(d) = s.strip_prefix("wait:") {
            let d = humantime::parse_duration(d.trim()).map_err(|e| invalid(e.to_string()))?;
            return Ok(Self::Wait(d));
        }
        if let Some(name) = s.strip_prefix("app:") {
            let name = name.trim();
            return Ok(Self::App((!name.is_empty()).then(|| name.to_string())));
        }
        Chord::parse(s)
            .map(Self::Key)
            .map_err(|e| invalid(e.to_string()))
    }
}

/// Run the replay command.
pub fn run(args: &ReplayArgs) -> Result<()> {
    let mapping = config::load_mapping_from_path(&args.mapping)?;
    let settings = match &args.settings {
        Some(path) => config::load_settings_from_path(path)?,
        None => Settings::default(),
    };
    let policy = settings.policy()?;
    let steps = args
        .steps
        .iter()
        .map(|s| s.parse())
        .collect::<Result<Vec<Step>>>()?;
    let claims = args
        .claim
        .iter()
        .map(|c| Chord::parse(c).map_err(Error::from))
        .collect::<Result<Vec<_>>>()?;

    let mut builder = runtime::Builder::new_current_thread();
    builder.enable_time();
    if !args.realtime {
        builder.start_paused(true);
    }
    let runtime = builder.build()?;
    let replay = Replay {
        mapping,
        policy,
        claims,
        app: args.app.clone(),
    };
    runtime.block_on(replay.run(&steps, |line| println!("{line}")));
    Ok(())
}

/// Everything needed to set up one replay.
struct Replay {
    /// Mapping to install.
    mapping: MappingConfig,
    /// Initial policy.
    policy: ChordPolicy,
    /// Chords pre-claimed on the backend.
    claims: Vec<Chord>,
    /// Initial focus.
    app: Option<String>,
}

impl Replay {
    /// Execute `steps`, handing each output line to `emit`.
    async fn run<F: FnMut(String)>(self, steps: &[Step], mut emit: F) {
        let backend = Arc::new(MemoryBackend::new());
        for c in &self.claims {
            backend.claim(*c);
        }
        let sender: Arc<dyn KeySender> = backend.clone();
        let engine = Engine::new(backend.clone(), self.policy, Some(sender));
        let mut rx = engine.subscribe();
        let events = backend.events();

        for e in engine.set_mapping(&self.mapping).await {
            emit(format!("rejected: {e}"));
        }
        if let Some(name) = &self.app {
            engine.set_app_by_name(Some(name)).await;
        }
        flush(&mut rx, &backend, &mut emit);

        for step in steps {
            debug!(?step, "replay_step");
            match step {
                Step::Key(chord) => {
                    if backend.press(*chord).is_none() {
                        emit(format!("{chord}: not registered"));
                    }
                    for r in engine.pump(&events).await {
                        emit(format!("{chord}: {}", describe_response(&r)));
                    }
                }
                Step::Wait(d) => {
                    time::sleep(*d).await;
                    emit(format!("wait {}", humantime::format_duration(*d)));
                }
                Step::App(name) => {
                    let id = engine.set_app_by_name(name.as_deref()).await;
                    emit(match (name, id) {
                        (Some(n), Some(id)) => format!("focus {n} ({id})"),
                        (Some(n), None) => format!("focus {n} (unconfigured)"),
                        (None, _) => "focus cleared".to_string(),
                    });
                }
            }
            flush(&mut rx, &backend, &mut emit);
        }
        engine.shutdown().await;
    }
}

/// Print queued engine events and relayed keys.
fn flush<F: FnMut(String)>(
    rx: &mut UnboundedReceiver<EngineEvent>,
    backend: &MemoryBackend,
    emit: &mut F,
) {
    while let Ok(ev) = rx.try_recv() {
        emit(describe_event(&ev));
    }
    for (chord, kind) in backend.take_posted() {
        if kind == EventKind::KeyDown {
            emit(format!("relayed {chord}"));
        }
    }
}

/// One-word outcome for a key press.
fn describe_response(r: &KeyResponse) -> &'static str {
    match r {
        KeyResponse::PassThrough => "unmatched",
        KeyResponse::Fire(_) => "fired",
        KeyResponse::Armed { .. } => "waiting",
        KeyResponse::Cancelled => "cancelled",
        KeyResponse::Pending => "escape counted",
    }
}

/// Action as printed in dispatch lines.
fn describe_action(a: &Action) -> String {
    match a {
        Action::Named(n) => n.clone(),
        Action::Send(chords) => format!("send {}", join(chords)),
    }
}

/// One output line per engine event.
fn describe_event(ev: &EngineEvent) -> String {
    match ev {
        EngineEvent::DidTriggerHotKey(d) => {
            format!("hotkey {} -> {}", join(&d.path), describe_action(&d.action))
        }
        EngineEvent::DidTriggerChordKey(d) => {
            format!("chord {} -> {}", join(&d.path), describe_action(&d.action))
        }
        EngineEvent::DidTriggerManualHotKey { chord, .. } => format!("manual hotkey {chord}"),
        EngineEvent::ConfigChanged => "config changed".to_string(),
        EngineEvent::HotKeysChanged { active } => format!("registered: {}", join(active)),
        EngineEvent::RegistrationFailed { chord, error } => {
            format!("registration failed: {chord}: {error}")
        }
    }
}

/// Space-separated chord list.
fn join(chords: &[Chord]) -> String {
    chords
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
