use crate::core::SlotId;
use crate::core::slot::{AnySlot, Slot, SlotKind, SlotValue, ValueType};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Authored value of an input: the definition's default or an override.
pub(crate) struct InputState<T: SlotValue> {
    default: RefCell<T>,
    value: RefCell<T>,
    is_default: Cell<bool>,
}

impl<T: SlotValue> InputState<T> {
    pub(crate) fn new(default: T) -> Self {
        InputState {
            value: RefCell::new(default.clone()),
            default: RefCell::new(default),
            is_default: Cell::new(true),
        }
    }

    pub(crate) fn value(&self) -> T {
        self.value.borrow().clone()
    }

    pub(crate) fn default_value(&self) -> T {
        self.default.borrow().clone()
    }

    pub(crate) fn is_default(&self) -> bool {
        self.is_default.get()
    }

    fn set(&self, value: T) {
        *self.value.borrow_mut() = value;
        self.is_default.set(false);
    }

    fn reset(&self) {
        *self.value.borrow_mut() = self.default.borrow().clone();
        self.is_default.set(true);
    }

    /// Installs a new default. Returns whether the effective value changed.
    pub(crate) fn replace_default(&self, default: T) -> bool {
        *self.default.borrow_mut() = default;
        if self.is_default.get() {
            self.reset();
            true
        } else {
            false
        }
    }
}

/// Typed handle to an input slot.
///
/// Unconnected, the slot yields its input value; connected, the value of its
/// single upstream slot.
#[derive(Clone, Debug)]
pub struct InputSlot<T: SlotValue>(Slot<T>);

impl<T: SlotValue> InputSlot<T> {
    pub fn new(id: SlotId, default: T) -> Self {
        InputSlot(Slot::new_input(id, default, false))
    }

    /// Wraps `slot` if it is a single input.
    pub fn from_slot(slot: Slot<T>) -> Option<Self> {
        (slot.kind() == SlotKind::Input).then_some(InputSlot(slot))
    }

    pub fn slot(&self) -> &Slot<T> {
        &self.0
    }

    /// Current authored value, ignoring connections.
    pub fn input_value(&self) -> T {
        input_state(&self.0).value()
    }

    /// Overrides the authored value.
    ///
    /// The slot is not invalidated; callers decide when the change takes
    /// effect, or rely on the next pass.
    pub fn set_input_value(&self, value: T) {
        input_state(&self.0).set(value);
    }

    pub fn default_value(&self) -> T {
        input_state(&self.0).default_value()
    }

    pub fn is_default(&self) -> bool {
        input_state(&self.0).is_default()
    }

    pub fn reset_to_default(&self) {
        input_state(&self.0).reset();
    }
}

impl<T: SlotValue> Deref for InputSlot<T> {
    type Target = Slot<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Typed handle to a multi-input slot that aggregates several upstream slots in order.
#[derive(Clone, Debug)]
pub struct MultiInputSlot<T: SlotValue>(Slot<T>);

impl<T: SlotValue> MultiInputSlot<T> {
    pub fn new(id: SlotId, default: T) -> Self {
        MultiInputSlot(Slot::new_input(id, default, true))
    }

    /// Wraps `slot` if it is a multi-input.
    pub fn from_slot(slot: Slot<T>) -> Option<Self> {
        slot.is_multi_input().then_some(MultiInputSlot(slot))
    }

    pub fn slot(&self) -> &Slot<T> {
        &self.0
    }

    /// Flattened, ordered upstream slots.
    pub fn collected_inputs(&self) -> Vec<Slot<T>> {
        self.0.collected_inputs()
    }

    pub fn input_value(&self) -> T {
        input_state(&self.0).value()
    }

    pub fn set_input_value(&self, value: T) {
        input_state(&self.0).set(value);
    }

    pub fn is_default(&self) -> bool {
        input_state(&self.0).is_default()
    }

    pub fn reset_to_default(&self) {
        input_state(&self.0).reset();
    }
}

impl<T: SlotValue> Deref for MultiInputSlot<T> {
    type Target = Slot<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Input handles are only constructed around slots built by `Slot::new_input`.
fn input_state<T: SlotValue>(slot: &Slot<T>) -> &InputState<T> {
    match slot.input_state() {
        Some(state) => state,
        None => unreachable!("input handle wraps output slot {}", slot.id()),
    }
}

trait ErasedDefault: Send + Sync {
    fn value_type(&self) -> ValueType;
    fn create_input_slot(&self, id: SlotId, multi: bool) -> Box<dyn AnySlot>;
    fn value_any(&self) -> &dyn Any;
    fn render(&self) -> String;
}

struct TypedDefault<T: SlotValue>(T);

impl<T: SlotValue> ErasedDefault for TypedDefault<T> {
    fn value_type(&self) -> ValueType {
        ValueType::of::<T>()
    }

    fn create_input_slot(&self, id: SlotId, multi: bool) -> Box<dyn AnySlot> {
        Box::new(Slot::new_input(id, self.0.clone(), multi))
    }

    fn value_any(&self) -> &dyn Any {
        &self.0
    }

    fn render(&self) -> String {
        format!("{:?}", self.0)
    }
}

/// Type-erased default value of an input definition.
///
/// Carries its value type, so the definition needs no separate type field.
#[derive(Clone)]
pub struct DefaultValue(Arc<dyn ErasedDefault>);

impl DefaultValue {
    pub fn new<T: SlotValue>(value: T) -> Self {
        DefaultValue(Arc::new(TypedDefault(value)))
    }

    pub fn value_type(&self) -> ValueType {
        self.0.value_type()
    }

    pub fn get<T: SlotValue>(&self) -> Option<&T> {
        self.0.value_any().downcast_ref::<T>()
    }

    /// `Debug` rendering of the value.
    pub fn render(&self) -> String {
        self.0.render()
    }

    /// Allocates an input slot seeded with this value.
    pub fn create_input_slot(&self, id: SlotId, multi: bool) -> Box<dyn AnySlot> {
        self.0.create_input_slot(id, multi)
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DefaultValue<{}>({})", self.value_type(), self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::EvaluationContext;
    use crate::core::slot::downcast_slot;
    use uuid::Uuid;

    fn constant(value: i32) -> Slot<i32> {
        Slot::with_value(Uuid::new_v4(), value)
    }

    #[test]
    fn test_input_value_overrides_default() {
        let input = InputSlot::new(Uuid::new_v4(), 5.0f32);
        let mut ctx = EvaluationContext::new();
        assert_eq!(input.get_value(&ctx).unwrap(), 5.0);
        assert!(input.is_default());

        input.set_input_value(2.0);
        assert!(!input.is_default());
        // Still cached for this pass until invalidated.
        assert_eq!(input.get_value(&ctx).unwrap(), 5.0);

        ctx.next_pass();
        assert_eq!(input.get_value(&ctx).unwrap(), 2.0);

        input.reset_to_default();
        input.invalidate();
        assert_eq!(input.get_value(&ctx).unwrap(), 5.0);
        assert_eq!(input.default_value(), 5.0);
    }

    #[test]
    fn test_collected_inputs_preserve_order() {
        let target = MultiInputSlot::new(Uuid::new_v4(), 0);
        let (a, b, c) = (constant(1), constant(2), constant(3));
        target.connect(&a).unwrap();
        target.connect(&b).unwrap();
        target.connect(&c).unwrap();

        let collected = target.collected_inputs();
        assert_eq!(collected.len(), 3);
        assert!(collected[0].ptr_eq(&a));
        assert!(collected[1].ptr_eq(&b));
        assert!(collected[2].ptr_eq(&c));
    }

    #[test]
    fn test_chained_multi_inputs_are_flattened() {
        let target = MultiInputSlot::new(Uuid::new_v4(), 0);
        let aggregator = MultiInputSlot::new(Uuid::new_v4(), 0);
        let (a, b1, b2, c) = (constant(1), constant(21), constant(22), constant(3));
        aggregator.connect(&b1).unwrap();
        aggregator.connect(&b2).unwrap();

        target.connect(&a).unwrap();
        target.connect(aggregator.slot()).unwrap();
        target.connect(&c).unwrap();

        let ids: Vec<_> = target.collected_inputs().iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec![a.id(), b1.id(), b2.id(), c.id()]);
    }

    #[test]
    fn test_unconnected_multi_input_is_collected_as_is() {
        let target = MultiInputSlot::new(Uuid::new_v4(), 0);
        let empty = MultiInputSlot::new(Uuid::new_v4(), 9);
        target.connect(empty.slot()).unwrap();

        let collected = target.collected_inputs();
        assert_eq!(collected.len(), 1);
        assert!(collected[0].ptr_eq(empty.slot()));
    }

    #[test]
    fn test_collection_reflects_live_topology() {
        let target = MultiInputSlot::new(Uuid::new_v4(), 0);
        let aggregator = MultiInputSlot::new(Uuid::new_v4(), 0);
        let b1 = constant(1);
        target.connect(aggregator.slot()).unwrap();
        aggregator.connect(&b1).unwrap();
        assert!(target.collected_inputs()[0].ptr_eq(&b1));

        aggregator.disconnect(&b1);
        assert!(target.collected_inputs()[0].ptr_eq(aggregator.slot()));
    }

    #[test]
    fn test_multi_input_pulled_directly_yields_first_source() {
        let target = MultiInputSlot::new(Uuid::new_v4(), 0);
        let ctx = EvaluationContext::new();
        assert_eq!(target.get_value(&ctx).unwrap(), 0);

        target.connect(&constant(4)).unwrap();
        target.connect(&constant(5)).unwrap();
        assert_eq!(target.get_value(&ctx).unwrap(), 4);
    }

    #[test]
    fn test_handles_check_slot_kind() {
        let output: Slot<i32> = Slot::new(Uuid::new_v4());
        assert!(InputSlot::from_slot(output.clone()).is_none());
        assert!(MultiInputSlot::from_slot(output).is_none());

        let multi = MultiInputSlot::new(Uuid::new_v4(), 0);
        assert!(InputSlot::from_slot(multi.slot().clone()).is_none());
    }

    #[test]
    fn test_default_value_allocates_typed_slots() {
        let default = DefaultValue::new(String::from("hello"));
        assert_eq!(default.value_type(), ValueType::of::<String>());
        assert_eq!(default.get::<String>().map(String::as_str), Some("hello"));
        assert!(default.get::<f32>().is_none());
        assert_eq!(default.render(), "\"hello\"");

        let id = Uuid::new_v4();
        let slot = default.create_input_slot(id, true);
        assert_eq!(slot.kind(), SlotKind::MultiInput);
        assert_eq!(slot.is_default(), Some(true));
        let typed = downcast_slot::<String>(slot.as_ref()).unwrap();
        assert_eq!(typed.value(), "hello");
    }

    #[test]
    fn test_apply_default_only_touches_untouched_inputs() {
        let kept = InputSlot::new(Uuid::new_v4(), 1.0f32);
        let overridden = InputSlot::new(Uuid::new_v4(), 1.0f32);
        overridden.set_input_value(8.0);

        let new_default = DefaultValue::new(3.0f32);
        AnySlot::apply_default(kept.slot(), &new_default).unwrap();
        AnySlot::apply_default(overridden.slot(), &new_default).unwrap();

        assert_eq!(kept.input_value(), 3.0);
        assert_eq!(overridden.input_value(), 8.0);
        assert_eq!(overridden.default_value(), 3.0);

        let wrong = DefaultValue::new(3i32);
        assert!(AnySlot::apply_default(kept.slot(), &wrong).is_err());
    }
}
