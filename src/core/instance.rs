use crate::core::context::EvaluationContext;
use crate::core::error::{GraphError, Result};
use crate::core::operator::{Operator, OperatorSlots};
use crate::core::slot::{
    AnySlot, DefaultValue, InputSlot, MultiInputSlot, Slot, SlotValue, ValueType, downcast_slot,
};
use crate::core::symbol::registry::SymbolRegistry;
use crate::core::symbol::{Connection, Symbol};
use crate::core::validation;
use crate::core::{ChildId, InstanceId, SlotId, SymbolId};
use std::fmt;

/// What [`Instance::update_consistency`] changed, summed over the subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConsistencyReport {
    pub added_inputs: Vec<SlotId>,
    pub removed_inputs: Vec<SlotId>,
    pub added_outputs: Vec<SlotId>,
    pub removed_outputs: Vec<SlotId>,
    pub added_children: Vec<ChildId>,
    pub removed_children: Vec<ChildId>,
}

impl ConsistencyReport {
    pub fn is_empty(&self) -> bool {
        self.added_inputs.is_empty()
            && self.removed_inputs.is_empty()
            && self.added_outputs.is_empty()
            && self.removed_outputs.is_empty()
            && self.added_children.is_empty()
            && self.removed_children.is_empty()
    }

    pub fn merge(&mut self, other: ConsistencyReport) {
        self.added_inputs.extend(other.added_inputs);
        self.removed_inputs.extend(other.removed_inputs);
        self.added_outputs.extend(other.added_outputs);
        self.removed_outputs.extend(other.removed_outputs);
        self.added_children.extend(other.added_children);
        self.removed_children.extend(other.removed_children);
    }
}

/// A live node built from a [`Symbol`]: concrete slots, child instances and
/// resolved connections.
///
/// Owns its slots and children; dropping an instance tears down its whole
/// subtree. Two instances of the same symbol share no slot state.
pub struct Instance {
    id: InstanceId,
    symbol_id: SymbolId,
    symbol_name: String,
    inputs: Vec<Box<dyn AnySlot>>,
    outputs: Vec<Box<dyn AnySlot>>,
    children: Vec<Instance>,
}

impl Instance {
    pub(crate) fn build(
        registry: &SymbolRegistry,
        symbol_id: SymbolId,
        id: InstanceId,
    ) -> Result<Self> {
        let symbol = registry
            .get(symbol_id)
            .ok_or(GraphError::UnknownSymbol(symbol_id))?;
        let instance = Self::construct(registry, symbol, id)?;
        log::debug!(
            "constructed instance {id} of '{}' with {} children",
            symbol.name(),
            instance.children.len()
        );
        Ok(instance)
    }

    fn construct(registry: &SymbolRegistry, symbol: &Symbol, id: InstanceId) -> Result<Self> {
        // Rejects recursive composition before descending into children.
        validation::validate_symbol(registry, symbol).into_result()?;

        let (inputs, outputs) = fresh_slots(symbol);
        let children = symbol
            .children()
            .iter()
            .map(|child| {
                let child_symbol = registry
                    .get(child.symbol_id)
                    .ok_or(GraphError::UnknownSymbol(child.symbol_id))?;
                Self::construct(registry, child_symbol, child.id)
            })
            .collect::<Result<Vec<_>>>()?;

        let instance = Instance {
            id,
            symbol_id: symbol.id(),
            symbol_name: symbol.name().to_string(),
            inputs,
            outputs,
            children,
        };
        instance.bind_operator(symbol)?;
        instance.wire(symbol)?;
        Ok(instance)
    }

    fn bind_operator(&self, symbol: &Symbol) -> Result<()> {
        let Some(operator) = symbol.operator() else {
            return Ok(());
        };
        let operator: &dyn Operator = &**operator;
        let slots = OperatorSlots::new(symbol, self.id, &self.inputs, &self.outputs);
        operator.bind(&slots)
    }

    /// Replaces the connections this level owns (own outputs, children's
    /// inputs) with the ones `symbol` declares.
    fn wire(&self, symbol: &Symbol) -> Result<()> {
        let resolved = symbol
            .connections()
            .iter()
            .map(|c| self.resolve(symbol, c))
            .collect::<Result<Vec<_>>>()?;

        for output in &self.outputs {
            output.clear_connections();
        }
        for child in &self.children {
            for input in &child.inputs {
                input.clear_connections();
            }
        }
        for (source, target) in resolved {
            target.add_connection(source)?;
        }
        Ok(())
    }

    fn resolve(&self, symbol: &Symbol, c: &Connection) -> Result<(&dyn AnySlot, &dyn AnySlot)> {
        Ok((self.source_slot(symbol, c)?, self.target_slot(symbol, c)?))
    }

    fn source_slot(&self, symbol: &Symbol, c: &Connection) -> Result<&dyn AnySlot> {
        let slot = if c.is_source_boundary() {
            find_slot(&self.inputs, c.output_definition_id)
        } else {
            self.child(c.source_child_id)
                .and_then(|child| find_slot(&child.outputs, c.output_definition_id))
        };
        slot.ok_or(GraphError::UnresolvedConnectionEndpoint {
            symbol: symbol.id(),
            child: c.source_child_id,
            slot: c.output_definition_id,
        })
    }

    fn target_slot(&self, symbol: &Symbol, c: &Connection) -> Result<&dyn AnySlot> {
        let slot = if c.is_target_boundary() {
            find_slot(&self.outputs, c.input_definition_id)
        } else {
            self.child(c.target_child_id)
                .and_then(|child| find_slot(&child.inputs, c.input_definition_id))
        };
        slot.ok_or(GraphError::UnresolvedConnectionEndpoint {
            symbol: symbol.id(),
            child: c.target_child_id,
            slot: c.input_definition_id,
        })
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn symbol_id(&self) -> SymbolId {
        self.symbol_id
    }

    pub fn symbol_name(&self) -> &str {
        &self.symbol_name
    }

    pub fn inputs(&self) -> &[Box<dyn AnySlot>] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Box<dyn AnySlot>] {
        &self.outputs
    }

    pub fn children(&self) -> &[Instance] {
        &self.children
    }

    pub fn child(&self, id: ChildId) -> Option<&Instance> {
        self.children.iter().find(|child| child.id == id)
    }

    /// Follows a path of child ids down the tree.
    pub fn find_descendant(&self, path: &[ChildId]) -> Option<&Instance> {
        path.iter().try_fold(self, |current, id| current.child(*id))
    }

    pub fn input(&self, id: SlotId) -> Option<&dyn AnySlot> {
        find_slot(&self.inputs, id)
    }

    pub fn output(&self, id: SlotId) -> Option<&dyn AnySlot> {
        find_slot(&self.outputs, id)
    }

    pub fn typed_input<T: SlotValue>(&self, id: SlotId) -> Result<InputSlot<T>> {
        let slot = self.typed(&self.inputs, id)?;
        InputSlot::from_slot(slot).ok_or_else(|| self.unknown(format!("{id} as input")))
    }

    pub fn typed_multi_input<T: SlotValue>(&self, id: SlotId) -> Result<MultiInputSlot<T>> {
        let slot = self.typed(&self.inputs, id)?;
        MultiInputSlot::from_slot(slot)
            .ok_or_else(|| self.unknown(format!("{id} as multi-input")))
    }

    pub fn typed_output<T: SlotValue>(&self, id: SlotId) -> Result<Slot<T>> {
        self.typed(&self.outputs, id)
    }

    /// Pulls an output, recomputing whatever is stale for the context's pass.
    pub fn get_value<T: SlotValue>(
        &self,
        output_id: SlotId,
        context: &EvaluationContext,
    ) -> Result<T> {
        self.typed_output::<T>(output_id)?.get_value(context)
    }

    /// Marks every slot in the subtree dirty.
    pub fn invalidate_all(&self) {
        for slot in self.inputs.iter().chain(&self.outputs) {
            slot.invalidate();
        }
        for child in &self.children {
            child.invalidate_all();
        }
    }

    /// Re-resolves connections across the subtree from the current symbols.
    ///
    /// Call after connection edits; the structure of the instance must still
    /// match its symbols (see [`Instance::update_consistency`] otherwise).
    pub fn resolve_connections(&self, registry: &SymbolRegistry) -> Result<()> {
        let symbol = registry
            .get(self.symbol_id)
            .ok_or(GraphError::UnknownSymbol(self.symbol_id))?;
        validation::validate_symbol(registry, symbol).into_result()?;
        for child in &self.children {
            child.resolve_connections(registry)?;
        }
        self.wire(symbol)?;
        log::debug!("resolved {} connections of {}", symbol.connections().len(), self.id);
        Ok(())
    }

    /// Reconciles the subtree with re-published symbols.
    ///
    /// Slots and children that still match their definitions are kept along
    /// with their authored values; missing ones are created with defaults and
    /// removed ones dropped. Operators are bound again and connections
    /// re-resolved.
    ///
    /// Every check runs before a slot shared with the live tree is touched:
    /// endpoints are resolved and each operator is first bound to scratch
    /// slots. On error the instance is left as it was.
    pub fn update_consistency(&mut self, registry: &SymbolRegistry) -> Result<ConsistencyReport> {
        let (updated, pending, report) = self.plan(registry)?;
        updated.commit(&pending)?;
        *self = updated;
        self.invalidate_all();
        if report.is_empty() {
            log::debug!("instance {} of '{}' already consistent", self.id, self.symbol_name);
        } else {
            log::debug!(
                "instance {} of '{}' reconciled: +{}/-{} inputs, +{}/-{} outputs, +{}/-{} children",
                self.id,
                self.symbol_name,
                report.added_inputs.len(),
                report.removed_inputs.len(),
                report.added_outputs.len(),
                report.removed_outputs.len(),
                report.added_children.len(),
                report.removed_children.len()
            );
        }
        Ok(report)
    }

    /// Builds the reconciled tree without mutating any kept slot.
    fn plan<'r>(
        &self,
        registry: &'r SymbolRegistry,
    ) -> Result<(Instance, PendingCommit<'r>, ConsistencyReport)> {
        let symbol = registry
            .get(self.symbol_id)
            .ok_or(GraphError::UnknownSymbol(self.symbol_id))?;
        validation::validate_symbol(registry, symbol).into_result()?;
        let mut report = ConsistencyReport::default();
        let mut pending = PendingCommit {
            symbol,
            defaults: Vec::new(),
            children: Vec::new(),
        };

        let mut inputs = Vec::with_capacity(symbol.input_definitions().len());
        for def in symbol.input_definitions() {
            // matching on the default's type keeps `apply_default` infallible
            let kept = self.inputs.iter().find(|s| {
                s.id() == def.id
                    && s.value_type() == def.value_type()
                    && s.is_multi_input() == def.is_multi_input
            });
            match kept {
                Some(slot) => {
                    pending.defaults.push((inputs.len(), &def.default_value));
                    inputs.push(slot.clone_slot());
                }
                None => {
                    report.added_inputs.push(def.id);
                    inputs.push(def.default_value.create_input_slot(def.id, def.is_multi_input));
                }
            }
        }
        report.removed_inputs = dropped(&self.inputs, &inputs);

        let mut outputs = Vec::with_capacity(symbol.output_definitions().len());
        for def in symbol.output_definitions() {
            match self
                .outputs
                .iter()
                .find(|s| s.id() == def.id && s.value_type() == def.value_type)
            {
                Some(slot) => outputs.push(slot.clone_slot()),
                None => {
                    report.added_outputs.push(def.id);
                    outputs.push(def.value_type.create_output_slot(def.id));
                }
            }
        }
        report.removed_outputs = dropped(&self.outputs, &outputs);

        let mut children = Vec::with_capacity(symbol.children().len());
        for child in symbol.children() {
            let existing = self
                .children
                .iter()
                .find(|c| c.id == child.id && c.symbol_id == child.symbol_id);
            match existing {
                Some(existing) => {
                    let (updated, child_pending, child_report) = existing.plan(registry)?;
                    report.merge(child_report);
                    pending.children.push((children.len(), child_pending));
                    children.push(updated);
                }
                None => {
                    let child_symbol = registry
                        .get(child.symbol_id)
                        .ok_or(GraphError::UnknownSymbol(child.symbol_id))?;
                    children.push(Self::construct(registry, child_symbol, child.id)?);
                    report.added_children.push(child.id);
                }
            }
        }
        report.removed_children = self
            .children
            .iter()
            .filter(|old| {
                !children
                    .iter()
                    .any(|c| c.id == old.id && c.symbol_id == old.symbol_id)
            })
            .map(|old| old.id)
            .collect();

        let updated = Instance {
            id: self.id,
            symbol_id: symbol.id(),
            symbol_name: symbol.name().to_string(),
            inputs,
            outputs,
            children,
        };
        for connection in symbol.connections() {
            updated.resolve(symbol, connection)?;
        }
        updated.trial_bind(symbol)?;
        Ok((updated, pending, report))
    }

    /// Binds the operator to throwaway slots shaped like `symbol`'s.
    fn trial_bind(&self, symbol: &Symbol) -> Result<()> {
        let Some(operator) = symbol.operator() else {
            return Ok(());
        };
        let operator: &dyn Operator = &**operator;
        let (inputs, outputs) = fresh_slots(symbol);
        let slots = OperatorSlots::new(symbol, self.id, &inputs, &outputs);
        operator.bind(&slots)
    }

    /// Applies a plan bottom-up: defaults, operator binding, then wiring.
    fn commit(&self, pending: &PendingCommit<'_>) -> Result<()> {
        for (index, child) in &pending.children {
            self.children[*index].commit(child)?;
        }
        for (index, default) in &pending.defaults {
            self.inputs[*index].apply_default(default)?;
        }
        self.bind_operator(pending.symbol)?;
        self.wire(pending.symbol)
    }

    fn typed<T: SlotValue>(&self, slots: &[Box<dyn AnySlot>], id: SlotId) -> Result<Slot<T>> {
        let slot = find_slot(slots, id).ok_or_else(|| self.unknown(id.to_string()))?;
        downcast_slot::<T>(slot)
            .cloned()
            .ok_or_else(|| GraphError::TypeMismatch {
                expected: ValueType::of::<T>().name(),
                found: slot.value_type().name(),
                source_slot: id,
                target_slot: id,
            })
    }

    fn unknown(&self, slot: String) -> GraphError {
        GraphError::UnknownSlot {
            owner: format!("instance {} of '{}'", self.id, self.symbol_name),
            slot,
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("symbol", &self.symbol_name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("children", &self.children)
            .finish()
    }
}

/// Shared slots a reconciliation still has to touch, per kept instance.
struct PendingCommit<'a> {
    symbol: &'a Symbol,
    /// Kept inputs by index, with the default they take on.
    defaults: Vec<(usize, &'a DefaultValue)>,
    /// Kept children by index; rebuilt children are already bound and wired.
    children: Vec<(usize, PendingCommit<'a>)>,
}

type SlotList = Vec<Box<dyn AnySlot>>;

/// New input and output slots for every definition of `symbol`.
fn fresh_slots(symbol: &Symbol) -> (SlotList, SlotList) {
    let inputs = symbol
        .input_definitions()
        .iter()
        .map(|def| def.default_value.create_input_slot(def.id, def.is_multi_input))
        .collect();
    let outputs = symbol
        .output_definitions()
        .iter()
        .map(|def| def.value_type.create_output_slot(def.id))
        .collect();
    (inputs, outputs)
}

fn find_slot(slots: &[Box<dyn AnySlot>], id: SlotId) -> Option<&dyn AnySlot> {
    slots.iter().find(|s| s.id() == id).map(|s| s.as_ref())
}

/// Ids of `old` slots that did not make it into `kept`.
fn dropped(old: &[Box<dyn AnySlot>], kept: &[Box<dyn AnySlot>]) -> Vec<SlotId> {
    old.iter()
        .filter(|slot| !kept.iter().any(|k| k.same_slot(slot.as_ref())))
        .map(|slot| slot.id())
        .collect()
}
