use crate::chess::ChessError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("failed to launch engine {path}: {source}")]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load {path}: {reason}")]
    ManifestParse { path: PathBuf, reason: String },

    #[error("handshake command '{command}' failed: {reason}")]
    HandshakeCommand { command: String, reason: String },

    #[error("worker {worker} failed: {reason}")]
    Worker { worker: usize, reason: String },

    #[error("analysis failed: {0}")]
    Analysis(String),

    #[error("engine protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chess error: {0}")]
    Chess(#[from] ChessError),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, HarnessError>;

/// Result of an operation whose failure policy is fail-soft.
///
/// `Recovered` carries a usable value plus the warnings collected on the way;
/// `Fatal` means the operation could not produce a value at all. Call sites
/// decide what a fatal outcome means for them.
#[derive(Debug)]
#[must_use]
pub enum Outcome<T> {
    Success(T),
    Recovered { value: T, warnings: Vec<String> },
    Fatal(HarnessError),
}

impl<T> Outcome<T> {
    /// `Success` when no warnings were collected, `Recovered` otherwise
    pub fn from_parts(value: T, warnings: Vec<String>) -> Self {
        if warnings.is_empty() {
            Outcome::Success(value)
        } else {
            Outcome::Recovered { value, warnings }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Outcome::Fatal(_))
    }

    pub fn warnings(&self) -> &[String] {
        match self {
            Outcome::Recovered { warnings, .. } => warnings,
            _ => &[],
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Success(value) | Outcome::Recovered { value, .. } => Some(value),
            Outcome::Fatal(_) => None,
        }
    }

    /// Collapse into a `Result`, keeping the warnings next to the value
    pub fn into_result(self) -> Result<(T, Vec<String>)> {
        match self {
            Outcome::Success(value) => Ok((value, Vec::new())),
            Outcome::Recovered { value, warnings } => Ok((value, warnings)),
            Outcome::Fatal(err) => Err(err),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Success(value) => Outcome::Success(f(value)),
            Outcome::Recovered { value, warnings } => Outcome::Recovered {
                value: f(value),
                warnings,
            },
            Outcome::Fatal(err) => Outcome::Fatal(err),
        }
    }
}
