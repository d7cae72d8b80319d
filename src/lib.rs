//! # opgraph
//!
//! A demand-driven operator dataflow graph: typed value slots wired into
//! networks that recompute lazily and at most once per evaluation pass.
//!
//! ## Features
//!
//! - **Typed Slots, Untyped Wiring**: Operators read and write plain Rust values while
//!   construction and traversal work over an erased [`AnySlot`] facade
//! - **Lazy Memoization**: Values are pulled on demand and cached per [`PassVersion`], so
//!   shared producers in diamond-shaped graphs run once per pass
//! - **Composable Symbols**: Templates made of inputs, outputs, child symbols and
//!   connections, instantiated as often as needed with no shared state
//! - **Multi-Input Fan-In**: Ordered aggregation that flattens chained multi-inputs
//! - **Explicit Reconciliation**: Re-published symbols are applied to live instances only
//!   when asked to
//!
//! ## Quick Start
//!
//! ```rust
//! use opgraph::prelude::*;
//!
//! let mut add = Symbol::new("Add");
//! let a = add.add_input("Value1", 5.0f32);
//! add.add_input("Value2", 10.0f32);
//! let result = add.add_output::<f32>("Result");
//! let add = add.with_operator_fn(|slots| {
//!     let a = slots.input::<f32>("Value1")?;
//!     let b = slots.input::<f32>("Value2")?;
//!     slots
//!         .output::<f32>("Result")?
//!         .set_update(move |ctx| Ok(a.get_value(ctx)? + b.get_value(ctx)?));
//!     Ok(())
//! });
//!
//! let mut registry = SymbolRegistry::new();
//! let add_id = registry.register(add)?;
//! let instance = registry.create_instance(add_id, Uuid::new_v4())?;
//!
//! let mut ctx = EvaluationContext::new();
//! assert_eq!(instance.get_value::<f32>(result, &ctx)?, 15.0);
//!
//! let value1 = instance.typed_input::<f32>(a)?;
//! value1.set_input_value(2.0);
//! value1.invalidate();
//! ctx.next_pass();
//! assert_eq!(instance.get_value::<f32>(result, &ctx)?, 12.0);
//! # Ok::<(), opgraph::GraphError>(())
//! ```
//!
//! ## Module Organization
//!
//! - [`builtin`]: Ready-made operators (`Add`, `Sum`, `Multiply`, `Time`, `Random`, text helpers)
//! - [`prelude`]: Commonly used types and traits (import with `use opgraph::prelude::*`)
//! - [`slot_prelude`]: Only the slot layer, for code that wires slots by hand

// ============================================================================
// Core Module
// ============================================================================

mod core;

// ============================================================================
// Public Re-exports - Granular Imports
// ============================================================================

// Identifiers
pub use crate::core::{ChildId, InstanceId, SlotId, SymbolId};

// Errors
pub use crate::core::error::{GraphError, Result};

// Evaluation
pub use crate::core::context::{DEFAULT_MAX_DEPTH, EvaluationContext, PassVersion};
pub use crate::core::telemetry::{MemoryTelemetry, Telemetry, TraceEntry, TraceOutcome};

// Slots
pub use crate::core::slot::{
    AnySlot, DefaultValue, DirtyFlag, DirtyState, InputSlot, MultiInputSlot, Slot, SlotKind,
    SlotValue, ValueType, downcast_slot,
};

// Symbols and instances
pub use crate::core::instance::{ConsistencyReport, Instance};
pub use crate::core::operator::{Operator, OperatorSlots};
pub use crate::core::symbol::registry::SymbolRegistry;
pub use crate::core::symbol::{Connection, InputDefinition, OutputDefinition, Symbol, SymbolChild};
pub use crate::core::validation::{ValidationIssue, ValidationResult, validate_symbol};

// ============================================================================
// Built-in Operators
// ============================================================================

pub mod builtin;

// ============================================================================
// Prelude Modules - Convenient Bulk Imports
// ============================================================================

/// The main prelude: everything needed to author symbols and evaluate instances.
///
/// # Example
/// ```rust
/// use opgraph::prelude::*;
/// ```
pub mod prelude {
    pub use super::{
        AnySlot,
        Connection,
        // Evaluation
        EvaluationContext,
        GraphError,
        InputSlot,
        Instance,
        MultiInputSlot,
        Operator,
        OperatorSlots,
        Result,
        Slot,
        // Graph
        Symbol,
        SymbolRegistry,
        Uuid,
    };
}

/// Prelude for working with slots directly, without symbols or instances.
///
/// # Example
/// ```rust
/// use opgraph::slot_prelude::*;
/// ```
pub mod slot_prelude {
    pub use super::{
        AnySlot, DirtyFlag, DirtyState, EvaluationContext, GraphError, InputSlot,
        MultiInputSlot, Result, Slot, SlotValue, Uuid,
    };
}

// ============================================================================
// Re-export commonly used external types for convenience
// ============================================================================

pub use serde_json::Value as JsonValue;
pub use uuid::Uuid;

// ============================================================================
// Library Metadata
// ============================================================================

/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of this crate.
pub const NAME: &str = env!("CARGO_PKG_NAME");
