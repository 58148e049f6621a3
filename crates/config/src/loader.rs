//! Parse and load settings and mapping documents.

use std::{fs, path::Path};

use ron::error::SpannedError;
use serde::de::DeserializeOwned;

use crate::{Error, MappingConfig, Settings, error::excerpt_at};

/// Deserialize a RON document, mapping failures to [`Error::Parse`].
fn parse_ron<T: DeserializeOwned>(source: &str, path: Option<&Path>) -> Result<T, Error> {
    ron::from_str(source).map_err(|e: SpannedError| {
        let line = e.span.start.line;
        let col = e.span.start.col;
        Error::Parse {
            path: path.map(Path::to_path_buf),
            line,
            col,
            message: e.code.to_string(),
            excerpt: excerpt_at(source, line, col),
        }
    })
}

/// Read a file to a string, mapping failures to [`Error::Read`].
fn read(path: &Path) -> Result<String, Error> {
    fs::read_to_string(path).map_err(|e| Error::Read {
        path: Some(path.to_path_buf()),
        message: e.to_string(),
    })
}

/// Parse [`Settings`] from RON text.
pub fn load_settings_from_str(source: &str, path: Option<&Path>) -> Result<Settings, Error> {
    let settings: Settings = parse_ron(source, path)?;
    // Surface descriptor errors at load time rather than at first use.
    settings.policy()?;
    Ok(settings)
}

/// Load [`Settings`] from a RON file.
pub fn load_settings_from_path(path: &Path) -> Result<Settings, Error> {
    load_settings_from_str(&read(path)?, Some(path))
}

/// Parse a [`MappingConfig`] from RON text.
///
/// Only the document shape is checked here; descriptor and id problems are
/// reported per binding by [`crate::AppRegistry::build`].
pub fn load_mapping_from_str(source: &str, path: Option<&Path>) -> Result<MappingConfig, Error> {
    parse_ron(source, path)
}

/// Load a [`MappingConfig`] from a RON file.
pub fn load_mapping_from_path(path: &Path) -> Result<MappingConfig, Error> {
    load_mapping_from_str(&read(path)?, Some(path))
}
