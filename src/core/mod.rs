pub mod context;
pub mod error;
pub mod instance;
pub mod operator;
pub mod slot;
pub mod symbol;
pub mod telemetry;
pub mod validation;

use std::any::Any;
use uuid::Uuid;

/// Identifies a symbol across registries.
pub type SymbolId = Uuid;
/// Identifies a child usage inside its parent symbol.
pub type ChildId = Uuid;
/// Identifies an input or output definition, and the slots built from it.
pub type SlotId = Uuid;
/// Identifies a constructed instance; children reuse their `ChildId`.
pub type InstanceId = Uuid;

/// A helper trait that just provides the `as_any` method.
/// Needed for downcasting operators back to their concrete type.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: 'static> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}
