use thiserror::Error;

/// Errors produced while parsing key descriptors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The descriptor names an unknown key, an unsupported modifier, or has
    /// no key component at all.
    #[error("malformed key descriptor '{descriptor}': {reason}")]
    MalformedKeyDescriptor {
        /// The descriptor text as written in configuration.
        descriptor: String,
        /// What was wrong with it.
        reason: String,
    },
}
