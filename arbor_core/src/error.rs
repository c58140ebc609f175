use thiserror::Error;

/// The error type for model construction, validation, and setup.
///
/// All variants are fatal to initialization.
/// Messages carry their own location text (file path, source line)
/// accumulated by [`Error::prepend`] as they propagate outward,
/// so the variant distinguishes only the kind of failure.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// A missing or unreadable input file.
    #[error("{0}")]
    Io(String),
    /// Two arguments resolve to the same entity,
    /// e.g. duplicate input paths or a repeated CCF member.
    #[error("{0}")]
    DuplicateArgument(String),
    /// Umbrella for schema failures, undefined references, arity mismatches,
    /// invalid attribute values, unit mismatches, and aggregated reports.
    #[error("{0}")]
    Validation(String),
    /// A cycle in the gate, parameter, or event-tree branch graph.
    #[error("{0}")]
    Cycle(String),
    /// An out-of-domain numeric input to an expression constructor.
    #[error("{0}")]
    InvalidArgument(String),
}

impl Error {
    /// Prepends location text to the message, preserving the error kind.
    #[must_use]
    pub fn prepend(self, prefix: &str) -> Self {
        match self {
            Error::Io(msg) => Error::Io(format!("{prefix}{msg}")),
            Error::DuplicateArgument(msg) => Error::DuplicateArgument(format!("{prefix}{msg}")),
            Error::Validation(msg) => Error::Validation(format!("{prefix}{msg}")),
            Error::Cycle(msg) => Error::Cycle(format!("{prefix}{msg}")),
            Error::InvalidArgument(msg) => Error::InvalidArgument(format!("{prefix}{msg}")),
        }
    }
}
