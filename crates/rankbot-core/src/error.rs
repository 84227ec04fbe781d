//! Error hierarchy for the dispatch pipeline.
//!
//! Each layer has its own enum; [`DispatchError`] is the terminal failure of
//! one pipeline run and carries a static `error_code()` for metrics labeling.

use crate::gate::DenyReason;
use thiserror::Error;

// ============================================================================
// Collaborator errors
// ============================================================================

/// Persistence collaborator failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Transient: the backing store could not be reached. Safe to retry.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A record exists but could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Messaging collaborator failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessengerError {
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Role/permission resolver failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("role lookup failed: {0}")]
    Lookup(String),
}

// ============================================================================
// Command errors
// ============================================================================

/// Outcome of a command implementation that did not complete normally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The command refused to act; `0` is shown to the invoker verbatim.
    #[error("denied: {0}")]
    Denied(String),
    /// The command broke; the cause is logged, never shown.
    #[error("failed: {0}")]
    Failed(String),
}

impl From<StoreError> for CommandError {
    fn from(err: StoreError) -> Self {
        Self::Failed(err.to_string())
    }
}

impl From<MessengerError> for CommandError {
    fn from(err: MessengerError) -> Self {
        Self::Failed(err.to_string())
    }
}

/// Result type for command implementations.
pub type CommandResult = Result<(), CommandError>;

// ============================================================================
// Registry errors
// ============================================================================

/// Errors raised while building a command registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// `key` (a name or alias of `command`) is already claimed by `existing`.
    #[error("duplicate command key '{key}' in '{command}' (already used by '{existing}')")]
    DuplicateCommand {
        command: String,
        key: String,
        existing: String,
    },
    #[error("invalid descriptor for '{command}': {reason}")]
    InvalidDescriptor { command: String, reason: String },
}

/// A plugin source failed to produce a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("plugin '{source_name}' failed to load: {reason}")]
pub struct PluginError {
    pub source_name: String,
    pub reason: String,
}

impl PluginError {
    pub fn new(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Dispatch errors
// ============================================================================

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Received,
    Parsed,
    Resolved,
    Authorized,
    Executed,
    Progressed,
    Notified,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Parsed => "parsed",
            Self::Resolved => "resolved",
            Self::Authorized => "authorized",
            Self::Executed => "executed",
            Self::Progressed => "progressed",
            Self::Notified => "notified",
        }
    }
}

/// Terminal failure of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("'{command}' denied by gate: {reason:?}")]
    GateDenied { command: String, reason: DenyReason },

    /// The command itself declined (`CommandError::Denied`).
    #[error("'{command}' refused: {reason}")]
    CommandRefused { command: String, reason: String },

    #[error("'{command}' failed: {cause}")]
    ExecutionFailed { command: String, cause: String },

    /// Persistence was unreachable after the pipeline reached `stage`.
    #[error("'{command}' persistence unavailable after {}: {source}", stage.as_str())]
    PersistenceUnavailable {
        command: String,
        stage: Stage,
        source: StoreError,
    },
}

impl DispatchError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownCommand(_) => "unknown_command",
            Self::GateDenied { reason, .. } => reason.error_code(),
            Self::CommandRefused { .. } => "command_refused",
            Self::ExecutionFailed { .. } => "execution_failed",
            Self::PersistenceUnavailable { .. } => "persistence_unavailable",
        }
    }

    /// Command name the failure belongs to.
    pub fn command(&self) -> &str {
        match self {
            Self::UnknownCommand(name) => name,
            Self::GateDenied { command, .. }
            | Self::CommandRefused { command, .. }
            | Self::ExecutionFailed { command, .. }
            | Self::PersistenceUnavailable { command, .. } => command,
        }
    }

    /// Expected, user-facing outcomes that are not bugs.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::UnknownCommand(_) | Self::GateDenied { .. } | Self::CommandRefused { .. }
        )
    }
}
