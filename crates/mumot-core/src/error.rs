use mumot_index::IndexError;
use thiserror::Error;

/// Coarse classification of [`MumotError`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed rule or expression text.
    Syntax,
    /// Parameters or model shapes the requested operation cannot use.
    Configuration,
    /// Evaluation produced no usable number.
    Numerical,
}

/// Errors surfaced by parsing, derivation, and simulation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MumotError {
    #[error("syntax error: {message}")]
    Syntax { message: String },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("numerical error: {0}")]
    Numerical(String),
    #[error(transparent)]
    Index(#[from] IndexError),
}

impl MumotError {
    pub(crate) fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax {
            message: message.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub(crate) fn numerical(message: impl Into<String>) -> Self {
        Self::Numerical(message.into())
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Syntax { .. } => ErrorKind::Syntax,
            Self::Config(_) | Self::Index(_) => ErrorKind::Configuration,
            Self::Numerical(_) => ErrorKind::Numerical,
        }
    }

    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self.kind(), ErrorKind::Configuration)
    }

    #[must_use]
    pub const fn is_numerical(&self) -> bool {
        matches!(self.kind(), ErrorKind::Numerical)
    }
}

pub type Result<T, E = MumotError> = std::result::Result<T, E>;
