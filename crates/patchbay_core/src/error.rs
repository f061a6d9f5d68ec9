use std::fmt;

use crate::port::Port;

/// Why a resolved pair of selections did not change the graph.
///
/// These are ordinary outcomes of user interaction, not errors: the patcher
/// resets the controls and carries on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Both selections were senders, or both receivers.
    RoleMismatch,
    /// Sender and receiver carry different signal kinds.
    KindMismatch,
    /// Sender and receiver belong to the same module.
    SelfRouting,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::RoleMismatch => write!(f, "no match, both are senders or receivers"),
            Rejection::KindMismatch => write!(f, "incompatible signal kinds"),
            Rejection::SelfRouting => write!(f, "self-routing disallowed"),
        }
    }
}

/// A broken graph invariant. Always a defect in the patcher, never a user
/// error.
#[derive(Debug, Clone)]
pub enum InvariantViolation {
    /// More than one resolution's worth of selections is pending.
    PendingOverflow { pending: usize },
    /// A connection whose endpoints do not form a legal sender/receiver pair.
    MalformedConnection { sender: Port, receiver: Port },
    /// The same (sender, receiver) pair is recorded twice.
    DuplicateConnection { sender: Port, receiver: Port },
    /// A connection's receiver is missing from (or repeated in) its sender's
    /// fan-out list.
    FanOutMismatch {
        sender: Port,
        receiver: Port,
        occurrences: usize,
    },
    /// A fan-out entry with no matching connection.
    OrphanedFanOut { sender: Port, receiver: Port },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantViolation::PendingOverflow { pending } => {
                write!(f, "{} selections pending, at most 1 may survive an event", pending)
            }
            InvariantViolation::MalformedConnection { sender, receiver } => {
                write!(f, "malformed connection {} -> {}", sender, receiver)
            }
            InvariantViolation::DuplicateConnection { sender, receiver } => {
                write!(f, "duplicate connection {} -> {}", sender, receiver)
            }
            InvariantViolation::FanOutMismatch {
                sender,
                receiver,
                occurrences,
            } => write!(
                f,
                "{} appears {} times in the fan-out of {}, expected once",
                receiver, occurrences, sender
            ),
            InvariantViolation::OrphanedFanOut { sender, receiver } => {
                write!(f, "fan-out entry {} -> {} has no connection", sender, receiver)
            }
        }
    }
}

impl std::error::Error for InvariantViolation {}

/// Failure to load a [`crate::config::PatcherConfig`].
#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse(err) => write!(f, "invalid patcher config: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Parse(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err)
    }
}
