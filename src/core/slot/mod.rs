//! Typed value slots and the non-generic facade the graph layer works with.
//!
//! - [`Slot`] is the typed, memoized value cell every output is made of
//! - [`InputSlot`] and [`MultiInputSlot`] add an authored input value and
//!   fan-in on top of it
//! - [`AnySlot`] lets construction and wiring code handle slots without
//!   knowing their value type
//! - [`DirtyFlag`] gates recomputation per evaluation pass

pub mod dirty_flag;
pub mod input_slot;
pub mod value_slot;

pub use dirty_flag::{DirtyFlag, DirtyState};
pub use input_slot::{DefaultValue, InputSlot, MultiInputSlot};
pub use value_slot::Slot;

use crate::core::SlotId;
use crate::core::context::EvaluationContext;
use crate::core::error::Result;
use std::any::{Any, TypeId};
use std::fmt;

/// Bound shared by every value that can live in a slot.
///
/// Values also appear as input defaults on symbols, hence `Send + Sync`.
pub trait SlotValue: Clone + Default + fmt::Debug + Send + Sync + 'static {}

impl<T: Clone + Default + fmt::Debug + Send + Sync + 'static> SlotValue for T {}

/// Runtime descriptor of a slot's value type.
#[derive(Clone, Copy)]
pub struct ValueType {
    id: TypeId,
    name: &'static str,
    new_output: fn(SlotId) -> Box<dyn AnySlot>,
}

fn new_output_slot<T: SlotValue>(id: SlotId) -> Box<dyn AnySlot> {
    Box::new(Slot::<T>::new(id))
}

impl ValueType {
    pub fn of<T: SlotValue>() -> Self {
        ValueType {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            new_output: new_output_slot::<T>,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path, e.g. `String` for `alloc::string::String`.
    ///
    /// Generic types keep their full name.
    pub fn short_name(&self) -> &'static str {
        if self.name.contains('<') {
            return self.name;
        }
        self.name.rsplit("::").next().unwrap_or(self.name)
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    /// Allocates an unconnected output slot holding this type's default value.
    pub fn create_output_slot(&self, id: SlotId) -> Box<dyn AnySlot> {
        (self.new_output)(id)
    }
}

impl PartialEq for ValueType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ValueType {}

impl fmt::Debug for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueType({})", self.name)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Role a slot plays on its instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SlotKind {
    Output,
    Input,
    MultiInput,
}

impl SlotKind {
    pub fn is_input(self) -> bool {
        !matches!(self, SlotKind::Output)
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotKind::Output => f.write_str("output"),
            SlotKind::Input => f.write_str("input"),
            SlotKind::MultiInput => f.write_str("multi-input"),
        }
    }
}

/// Type-erased view of a [`Slot`].
///
/// Connection wiring, invalidation and traversal go through this trait. The
/// only places that recover the concrete type are [`AnySlot::add_connection`]
/// and [`downcast_slot`].
pub trait AnySlot {
    fn id(&self) -> SlotId;

    fn kind(&self) -> SlotKind;

    fn value_type(&self) -> ValueType;

    fn is_multi_input(&self) -> bool {
        self.kind() == SlotKind::MultiInput
    }

    fn is_connected(&self) -> bool {
        self.connection_count() > 0
    }

    fn connection_count(&self) -> usize;

    fn dirty_flag(&self) -> &DirtyFlag;

    fn invalidate(&self) {
        self.dirty_flag().invalidate();
    }

    /// Brings the slot up to date for the context's pass without handing out the value.
    fn update(&self, context: &EvaluationContext) -> Result<()>;

    /// Direct upstream slots in declaration order.
    fn connections(&self) -> Vec<Box<dyn AnySlot>>;

    /// Upstream slots with connected multi-inputs flattened in place.
    fn collect_inputs(&self) -> Vec<Box<dyn AnySlot>>;

    /// Appends `source` as an upstream slot.
    ///
    /// Fails with `TypeMismatch` when the value types differ and with
    /// `CyclicDependency` when `source` already depends on this slot. A
    /// single input drops its previous connection.
    fn add_connection(&self, source: &dyn AnySlot) -> Result<()>;

    /// Removes `source` from the upstream list, returning whether it was present.
    fn remove_connection(&self, source: &dyn AnySlot) -> bool;

    fn clear_connections(&self);

    /// Whether `other` is a handle to this very slot.
    fn same_slot(&self, other: &dyn AnySlot) -> bool;

    fn clone_slot(&self) -> Box<dyn AnySlot>;

    /// `Debug` rendering of the cached value.
    fn value_debug(&self) -> String;

    /// `Some(true)` when an input still carries its default value, `None` for outputs.
    fn is_default(&self) -> Option<bool>;

    /// Swaps in a new default value; inputs that still use the old default adopt it.
    fn apply_default(&self, default: &DefaultValue) -> Result<()>;

    fn as_any_ref(&self) -> &dyn Any;
}

impl fmt::Debug for dyn AnySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnySlot")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("value_type", &self.value_type())
            .field("connections", &self.connection_count())
            .field("value", &self.value_debug())
            .finish()
    }
}

/// Recovers the typed slot behind an erased one.
pub fn downcast_slot<T: SlotValue>(slot: &dyn AnySlot) -> Option<&Slot<T>> {
    slot.as_any_ref().downcast_ref::<Slot<T>>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_value_type_identity() {
        assert_eq!(ValueType::of::<f32>(), ValueType::of::<f32>());
        assert_ne!(ValueType::of::<f32>(), ValueType::of::<f64>());
        assert!(ValueType::of::<String>().is::<String>());
    }

    #[test]
    fn test_short_names() {
        assert_eq!(ValueType::of::<String>().short_name(), "String");
        assert_eq!(ValueType::of::<f32>().short_name(), "f32");
        assert_eq!(ValueType::of::<String>().to_string(), "String");
        assert!(ValueType::of::<Vec<String>>().short_name().starts_with("alloc::vec::Vec<"));
    }

    #[test]
    fn test_output_slot_factory() {
        let id = Uuid::new_v4();
        let slot = ValueType::of::<i32>().create_output_slot(id);
        assert_eq!(slot.id(), id);
        assert_eq!(slot.kind(), SlotKind::Output);
        assert_eq!(slot.value_type(), ValueType::of::<i32>());
        assert!(downcast_slot::<i32>(slot.as_ref()).is_some());
        assert!(downcast_slot::<f32>(slot.as_ref()).is_none());
        assert_eq!(slot.is_default(), None);
    }
}
