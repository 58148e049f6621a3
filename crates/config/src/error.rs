//! Error types for configuration loading and validation.

use std::{
    cmp::{max, min},
    fmt::Write as _,
    path::{Path, PathBuf},
};

use keycode::ParseError;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
/// Errors produced while loading, parsing, or validating configuration.
pub enum Error {
    #[error("{message}")]
    /// I/O or filesystem read error.
    Read {
        /// Optional path associated with the read error.
        path: Option<PathBuf>,
        /// Human-readable error message.
        message: String,
    },
    #[error("{message}")]
    /// RON parse error with a line/column location and excerpt.
    Parse {
        /// Optional path associated with the parse error.
        path: Option<PathBuf>,
        /// 1-based line number.
        line: usize,
        /// 1-based column number.
        col: usize,
        /// Human-readable error message.
        message: String,
        /// Rendered excerpt including a caret at the error location.
        excerpt: String,
    },
    #[error("{source}")]
    /// A binding referenced a malformed key descriptor and was skipped.
    Key {
        /// Owning application, or `None` for global bindings.
        app: Option<String>,
        /// Index of the binding within its list.
        binding: usize,
        /// Underlying descriptor error.
        source: ParseError,
    },
    #[error("{message}")]
    /// Structural problem in an otherwise well-formed configuration.
    Validation {
        /// Human-readable error message.
        message: String,
    },
}

impl Error {
    /// Render a human-friendly error message including location and an excerpt when available.
    pub fn pretty(&self) -> String {
        match self {
            Self::Read { path, message } => match path {
                Some(p) => format!("Read error at {}: {}", p.display(), message),
                None => format!("Read error: {}", message),
            },
            Self::Parse {
                path,
                line,
                col,
                message,
                excerpt,
            } => match path {
                Some(p) => format!(
                    "Config parse error at {}:{}:{}\n{}\n{}",
                    p.display(),
                    line,
                    col,
                    message,
                    excerpt
                ),
                None => format!(
                    "Config parse error at line {}, column {}\n{}\n{}",
                    line, col, message, excerpt
                ),
            },
            Self::Key {
                app,
                binding,
                source,
            } => match app {
                Some(a) => format!("Binding {} of app '{}' skipped: {}", binding, a, source),
                None => format!("Global binding {} skipped: {}", binding, source),
            },
            Self::Validation { message } => format!("Config validation error\n{}", message),
        }
    }

    /// Access the optional path attached to this error.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Read { path, .. } | Self::Parse { path, .. } => path.as_deref(),
            Self::Key { .. } | Self::Validation { .. } => None,
        }
    }

    /// Shorthand for a [`Error::Validation`].
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Build a small 2-3 line excerpt with a caret at `(line_no, col_no)`.
pub fn excerpt_at(source: &str, line_no: usize, col_no: usize) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let total = lines.len();
    let start = max(1usize, line_no.saturating_sub(2));
    let end = min(total, line_no + 1);

    let mut out = String::new();
    for n in start..=end {
        let text = lines.get(n - 1).copied().unwrap_or("");
        let _ignored = writeln!(out, " {:>4} | {}", n, text);
        if n == line_no {
            let prefix = format!(" {:>4} | ", n);
            let _ignored = writeln!(
                out,
                "{}{}^",
                " ".repeat(prefix.len()),
                " ".repeat(col_no.saturating_sub(1))
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_points_at_column() {
        let src = "one\ntwo\nthree";
        let ex = excerpt_at(src, 2, 3);
        assert!(ex.contains("    2 | two"));
        let caret_line = ex.lines().nth(2).unwrap();
        assert!(caret_line.ends_with("  ^"));
    }

    #[test]
    fn key_errors_name_their_app() {
        let source = keycode::Chord::parse("cmd+wat").unwrap_err();
        let e = Error::Key {
            app: Some("Safari".into()),
            binding: 2,
            source,
        };
        let p = e.pretty();
        assert!(p.contains("Safari"));
        assert!(p.contains("cmd+wat"));
        assert!(e.path().is_none());
    }
}
