// ============================================================================
// spark-context - Errors
// Host protocol violations and the out-of-range change mask diagnostic
// ============================================================================

use std::fmt;

use thiserror::Error;

use crate::core::types::ScopeKey;

/// Which side of a context an error refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Provider,
    Consumer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Provider => f.write_str("provider"),
            Role::Consumer => f.write_str("consumer"),
        }
    }
}

/// Errors raised by the host-facing lifecycle API.
///
/// Steady-state outcomes (bound or defaulted, changed or unchanged, observed
/// or ignored) are never errors. `ChangedBitsOutOfRange` is only ever logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error(
        "calculate_changed_bits ({context}): expected the return value to be a 31-bit integer, instead received: {received}"
    )]
    ChangedBitsOutOfRange { context: String, received: i64 },

    #[error("{role} for {context} is already mounted")]
    AlreadyMounted { role: Role, context: String },

    #[error("{role} for {context} is not mounted")]
    NotMounted { role: Role, context: String },

    #[error("value published under {key} is not an emitter for {context}")]
    ScopeTypeMismatch { key: ScopeKey, context: String },
}

pub type Result<T> = std::result::Result<T, ContextError>;
