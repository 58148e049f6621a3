//! Engine settings, key-mapping input and the application registry.
//!
//! - [`Settings`] / [`ChordPolicy`]: engine-wide tunables and their resolved form.
//! - [`MappingConfig`]: global and per-app bindings as written by the user.
//! - [`AppRegistry`]: stable app ids plus parsed, ordered bindings.

mod apps;
mod defaults;
mod error;
mod loader;
mod mapping;
mod scope;
mod settings;

#[cfg(test)]
mod test_parse;

pub use apps::{Action, AppEntry, AppRegistry, Binding, Link};
pub use error::{Error, excerpt_at};
pub use loader::{
    load_mapping_from_path, load_mapping_from_str, load_settings_from_path,
    load_settings_from_str,
};
pub use mapping::{ActionSpec, AppSpec, BindingSpec, LinkSpec, MappingConfig};
pub use scope::{AppId, AppScope};
pub use settings::{ChordPolicy, Settings};
