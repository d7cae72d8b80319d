use crate::core::error::{GraphError, Result};
use crate::core::slot::{
    AnySlot, InputSlot, MultiInputSlot, Slot, SlotKind, SlotValue, ValueType, downcast_slot,
};
use crate::core::symbol::Symbol;
use crate::core::{AsAny, InstanceId, SlotId};

/// Native computation behind a symbol.
///
/// `bind` runs once per constructed instance (and again after consistency
/// updates). It fetches typed handles from [`OperatorSlots`] and installs
/// update functions on the outputs. Operators live on symbols, which may be
/// shared between threads, so they must be `Send + Sync`.
pub trait Operator: AsAny + Send + Sync + 'static {
    fn bind(&self, slots: &OperatorSlots<'_>) -> Result<()>;
}

impl<F> Operator for F
where
    F: Fn(&OperatorSlots<'_>) -> Result<()> + Send + Sync + 'static,
{
    fn bind(&self, slots: &OperatorSlots<'_>) -> Result<()> {
        self(slots)
    }
}

/// Typed access to the slots of one instance while its operator is bound.
pub struct OperatorSlots<'a> {
    symbol: &'a Symbol,
    instance_id: InstanceId,
    inputs: &'a [Box<dyn AnySlot>],
    outputs: &'a [Box<dyn AnySlot>],
}

impl<'a> OperatorSlots<'a> {
    pub(crate) fn new(
        symbol: &'a Symbol,
        instance_id: InstanceId,
        inputs: &'a [Box<dyn AnySlot>],
        outputs: &'a [Box<dyn AnySlot>],
    ) -> Self {
        OperatorSlots {
            symbol,
            instance_id,
            inputs,
            outputs,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        self.symbol
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    /// Single input by definition name.
    pub fn input<T: SlotValue>(&self, name: &str) -> Result<InputSlot<T>> {
        let id = self.input_id(name)?;
        self.input_by_id(id)
    }

    pub fn input_by_id<T: SlotValue>(&self, id: SlotId) -> Result<InputSlot<T>> {
        let slot = self.typed::<T>(self.inputs, id)?;
        InputSlot::from_slot(slot).ok_or_else(|| self.wrong_kind(id, SlotKind::Input))
    }

    /// Multi-input by definition name.
    pub fn multi_input<T: SlotValue>(&self, name: &str) -> Result<MultiInputSlot<T>> {
        let id = self.input_id(name)?;
        self.multi_input_by_id(id)
    }

    pub fn multi_input_by_id<T: SlotValue>(&self, id: SlotId) -> Result<MultiInputSlot<T>> {
        let slot = self.typed::<T>(self.inputs, id)?;
        MultiInputSlot::from_slot(slot).ok_or_else(|| self.wrong_kind(id, SlotKind::MultiInput))
    }

    /// Output by definition name.
    pub fn output<T: SlotValue>(&self, name: &str) -> Result<Slot<T>> {
        let id = self
            .symbol
            .output_definitions()
            .iter()
            .find(|def| def.name == name)
            .map(|def| def.id)
            .ok_or_else(|| self.unknown(name))?;
        self.output_by_id(id)
    }

    pub fn output_by_id<T: SlotValue>(&self, id: SlotId) -> Result<Slot<T>> {
        self.typed::<T>(self.outputs, id)
    }

    fn input_id(&self, name: &str) -> Result<SlotId> {
        self.symbol
            .input_definitions()
            .iter()
            .find(|def| def.name == name)
            .map(|def| def.id)
            .ok_or_else(|| self.unknown(name))
    }

    fn typed<T: SlotValue>(&self, slots: &[Box<dyn AnySlot>], id: SlotId) -> Result<Slot<T>> {
        let slot = slots
            .iter()
            .find(|s| s.id() == id)
            .ok_or_else(|| self.unknown(&id.to_string()))?;
        downcast_slot::<T>(slot.as_ref())
            .cloned()
            .ok_or_else(|| GraphError::TypeMismatch {
                expected: ValueType::of::<T>().name(),
                found: slot.value_type().name(),
                source_slot: id,
                target_slot: id,
            })
    }

    fn unknown(&self, slot: &str) -> GraphError {
        GraphError::UnknownSlot {
            owner: format!("symbol '{}'", self.symbol.name()),
            slot: slot.to_string(),
        }
    }

    fn wrong_kind(&self, id: SlotId, wanted: SlotKind) -> GraphError {
        GraphError::UnknownSlot {
            owner: format!("symbol '{}'", self.symbol.name()),
            slot: format!("{id} as {wanted}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::EvaluationContext;
    use crate::core::symbol::registry::SymbolRegistry;

    fn scale_symbol() -> Symbol {
        let mut symbol = Symbol::new("Scale");
        symbol.add_input("Value", 2.0f32);
        symbol.add_input("Factor", 3.0f32);
        symbol.add_output::<f32>("Result");
        symbol.with_operator_fn(|slots| {
            let value = slots.input::<f32>("Value")?;
            let factor = slots.input::<f32>("Factor")?;
            slots
                .output::<f32>("Result")?
                .set_update(move |ctx| Ok(value.get_value(ctx)? * factor.get_value(ctx)?));
            Ok(())
        })
    }

    #[test]
    fn test_closure_operator_binds_outputs() {
        let symbol = scale_symbol();
        let result_id = symbol.output_definitions()[0].id;
        let mut registry = SymbolRegistry::new();
        let id = registry.register(symbol).unwrap();

        let instance = registry.create_instance(id, InstanceId::new_v4()).unwrap();
        let ctx = EvaluationContext::new();
        assert_eq!(instance.get_value::<f32>(result_id, &ctx).unwrap(), 6.0);
    }

    #[test]
    fn test_wrong_type_is_reported() {
        let mut symbol = Symbol::new("Broken");
        symbol.add_input("Value", 1i32);
        let symbol = symbol.with_operator_fn(|slots| {
            slots.input::<f32>("Value").map(|_| ())
        });
        let mut registry = SymbolRegistry::new();
        let id = registry.register(symbol).unwrap();

        let err = registry.create_instance(id, InstanceId::new_v4()).unwrap_err();
        assert!(matches!(err, GraphError::TypeMismatch { .. }));
    }

    #[test]
    fn test_unknown_names_and_wrong_kinds() {
        let mut symbol = Symbol::new("Lookup");
        symbol.add_input("Single", 1i32);
        symbol.add_multi_input("Many", 0i32);
        let symbol = symbol.with_operator_fn(|slots| {
            assert!(matches!(
                slots.input::<i32>("Missing"),
                Err(GraphError::UnknownSlot { .. })
            ));
            assert!(slots.multi_input::<i32>("Single").is_err());
            assert!(slots.input::<i32>("Many").is_err());
            assert!(slots.multi_input::<i32>("Many").is_ok());
            assert!(slots.output::<i32>("Result").is_err());
            Ok(())
        });
        let mut registry = SymbolRegistry::new();
        let id = registry.register(symbol).unwrap();
        registry.create_instance(id, InstanceId::new_v4()).unwrap();
    }
}
