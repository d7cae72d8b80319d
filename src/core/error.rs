use crate::core::{ChildId, SlotId, SymbolId};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while building or evaluating an operator graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("unresolved connection endpoint in symbol {symbol}: child {child}, slot {slot}")]
    UnresolvedConnectionEndpoint {
        symbol: SymbolId,
        child: ChildId,
        slot: SlotId,
    },

    #[error("type mismatch connecting {source_slot} -> {target_slot}: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
        source_slot: SlotId,
        target_slot: SlotId,
    },

    #[error("cyclic dependency: {0}")]
    CyclicDependency(String),

    #[error("native computation of slot {slot} failed: {message}")]
    NativeComputationFailure { slot: SlotId, message: String },

    #[error("unknown symbol {0}")]
    UnknownSymbol(SymbolId),

    #[error("symbol {0} is already registered")]
    DuplicateSymbol(SymbolId),

    #[error("no slot '{slot}' on {owner}")]
    UnknownSlot { owner: String, slot: String },
}

impl GraphError {
    /// Failure raised from inside an operator's update function.
    ///
    /// The failing slot id is filled in by the slot that ran the computation.
    pub fn computation(message: impl Into<String>) -> Self {
        GraphError::NativeComputationFailure {
            slot: Uuid::nil(),
            message: message.into(),
        }
    }

    /// Attributes an anonymous computation failure to `slot`.
    pub(crate) fn attributed_to(self, slot: SlotId) -> Self {
        match self {
            GraphError::NativeComputationFailure { slot: s, message } if s.is_nil() => {
                GraphError::NativeComputationFailure { slot, message }
            }
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_failure_is_attributed() {
        let slot = Uuid::new_v4();
        let err = GraphError::computation("division by zero").attributed_to(slot);
        assert_eq!(
            err,
            GraphError::NativeComputationFailure {
                slot,
                message: "division by zero".to_string()
            }
        );
    }

    #[test]
    fn test_attributed_failure_keeps_origin() {
        let origin = Uuid::new_v4();
        let err = GraphError::computation("boom").attributed_to(origin);
        let again = err.clone().attributed_to(Uuid::new_v4());
        assert_eq!(err, again);
    }

    #[test]
    fn test_other_errors_pass_through() {
        let err = GraphError::CyclicDependency("a -> b -> a".into());
        assert_eq!(err.clone().attributed_to(Uuid::new_v4()), err);
        assert_eq!(err.to_string(), "cyclic dependency: a -> b -> a");
    }
}
