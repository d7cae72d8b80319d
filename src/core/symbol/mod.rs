//! Symbols: the templates instances are built from.
//!
//! A [`Symbol`] lists typed input and output definitions, child usages of
//! other symbols and the [`Connection`]s wiring them together. Connections
//! are plain data; they are resolved into slot references only when an
//! instance is constructed or explicitly re-resolved.

pub mod registry;

use crate::core::error::Result;
use crate::core::operator::{Operator, OperatorSlots};
use crate::core::slot::{DefaultValue, SlotValue, ValueType};
use crate::core::{AsAny, ChildId, SlotId, SymbolId};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Definition of one input of a symbol.
#[derive(Debug, Clone)]
pub struct InputDefinition {
    pub id: SlotId,
    pub name: String,
    pub default_value: DefaultValue,
    pub is_multi_input: bool,
}

impl InputDefinition {
    pub fn new<T: SlotValue>(id: SlotId, name: impl Into<String>, default: T) -> Self {
        InputDefinition {
            id,
            name: name.into(),
            default_value: DefaultValue::new(default),
            is_multi_input: false,
        }
    }

    /// Turns the definition into a multi-input.
    pub fn multi(mut self) -> Self {
        self.is_multi_input = true;
        self
    }

    pub fn value_type(&self) -> ValueType {
        self.default_value.value_type()
    }
}

/// Definition of one output of a symbol.
#[derive(Debug, Clone)]
pub struct OutputDefinition {
    pub id: SlotId,
    pub name: String,
    pub value_type: ValueType,
}

impl OutputDefinition {
    pub fn new<T: SlotValue>(id: SlotId, name: impl Into<String>) -> Self {
        OutputDefinition {
            id,
            name: name.into(),
            value_type: ValueType::of::<T>(),
        }
    }
}

/// Usage of another symbol inside a composite symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolChild {
    pub id: ChildId,
    pub symbol_id: SymbolId,
    pub name: Option<String>,
}

/// Structural edge from an output to an input.
///
/// A [`Connection::BOUNDARY`] child id stands for the symbol itself: as a
/// source it names one of the symbol's inputs, as a target one of its outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Connection {
    pub source_child_id: ChildId,
    pub output_definition_id: SlotId,
    pub target_child_id: ChildId,
    pub input_definition_id: SlotId,
}

impl Connection {
    pub const BOUNDARY: ChildId = Uuid::nil();

    pub fn new(
        source_child_id: ChildId,
        output_definition_id: SlotId,
        target_child_id: ChildId,
        input_definition_id: SlotId,
    ) -> Self {
        Connection {
            source_child_id,
            output_definition_id,
            target_child_id,
            input_definition_id,
        }
    }

    pub fn is_source_boundary(&self) -> bool {
        self.source_child_id == Self::BOUNDARY
    }

    pub fn is_target_boundary(&self) -> bool {
        self.target_child_id == Self::BOUNDARY
    }

    /// Whether both connections feed the same input.
    pub fn same_target(&self, other: &Connection) -> bool {
        self.target_child_id == other.target_child_id
            && self.input_definition_id == other.input_definition_id
    }

    /// Whether either endpoint is the given child.
    pub fn touches_child(&self, child: ChildId) -> bool {
        self.source_child_id == child || self.target_child_id == child
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.source_child_id,
            self.output_definition_id,
            self.target_child_id,
            self.input_definition_id
        )
    }
}

/// Template describing an operator: its slots, children and internal wiring.
#[derive(Clone)]
pub struct Symbol {
    id: SymbolId,
    name: String,
    inputs: Vec<InputDefinition>,
    outputs: Vec<OutputDefinition>,
    children: Vec<SymbolChild>,
    connections: Vec<Connection>,
    operator: Option<Arc<dyn Operator>>,
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Symbol")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("children", &self.children)
            .field("connections", &self.connections)
            .field("operator", &self.operator.is_some())
            .finish()
    }
}

impl Symbol {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), name)
    }

    pub fn with_id(id: SymbolId, name: impl Into<String>) -> Self {
        Symbol {
            id,
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            children: Vec::new(),
            connections: Vec::new(),
            operator: None,
        }
    }

    /// Attaches the native computation instances of this symbol run.
    pub fn with_operator<O: Operator>(mut self, operator: O) -> Self {
        self.operator = Some(Arc::new(operator));
        self
    }

    /// Same as [`Symbol::with_operator`], for closures.
    pub fn with_operator_fn<F>(self, bind: F) -> Self
    where
        F: Fn(&OperatorSlots<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.with_operator(bind)
    }

    pub fn set_operator(&mut self, operator: Option<Arc<dyn Operator>>) {
        self.operator = operator;
    }

    pub fn id(&self) -> SymbolId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn operator(&self) -> Option<&Arc<dyn Operator>> {
        self.operator.as_ref()
    }

    /// Downcasts the attached operator.
    pub fn operator_as<O: Operator>(&self) -> Option<&O> {
        let operator: &dyn Operator = &**self.operator.as_ref()?;
        operator.as_any().downcast_ref::<O>()
    }

    pub fn input_definitions(&self) -> &[InputDefinition] {
        &self.inputs
    }

    pub fn output_definitions(&self) -> &[OutputDefinition] {
        &self.outputs
    }

    pub fn children(&self) -> &[SymbolChild] {
        &self.children
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn input_definition(&self, id: SlotId) -> Option<&InputDefinition> {
        self.inputs.iter().find(|def| def.id == id)
    }

    pub fn output_definition(&self, id: SlotId) -> Option<&OutputDefinition> {
        self.outputs.iter().find(|def| def.id == id)
    }

    pub fn input_id(&self, name: &str) -> Option<SlotId> {
        self.inputs.iter().find(|def| def.name == name).map(|def| def.id)
    }

    pub fn output_id(&self, name: &str) -> Option<SlotId> {
        self.outputs.iter().find(|def| def.name == name).map(|def| def.id)
    }

    pub fn child(&self, id: ChildId) -> Option<&SymbolChild> {
        self.children.iter().find(|child| child.id == id)
    }

    pub fn add_input<T: SlotValue>(&mut self, name: impl Into<String>, default: T) -> SlotId {
        self.insert_input(InputDefinition::new(Uuid::new_v4(), name, default))
    }

    pub fn add_multi_input<T: SlotValue>(&mut self, name: impl Into<String>, default: T) -> SlotId {
        self.insert_input(InputDefinition::new(Uuid::new_v4(), name, default).multi())
    }

    /// Adds an input definition, replacing one with the same id in place.
    pub fn insert_input(&mut self, definition: InputDefinition) -> SlotId {
        let id = definition.id;
        match self.inputs.iter_mut().find(|def| def.id == id) {
            Some(existing) => *existing = definition,
            None => self.inputs.push(definition),
        }
        id
    }

    pub fn add_output<T: SlotValue>(&mut self, name: impl Into<String>) -> SlotId {
        self.insert_output(OutputDefinition::new::<T>(Uuid::new_v4(), name))
    }

    /// Adds an output definition, replacing one with the same id in place.
    pub fn insert_output(&mut self, definition: OutputDefinition) -> SlotId {
        let id = definition.id;
        match self.outputs.iter_mut().find(|def| def.id == id) {
            Some(existing) => *existing = definition,
            None => self.outputs.push(definition),
        }
        id
    }

    /// Removes an input along with the connections using it.
    pub fn remove_input(&mut self, id: SlotId) -> Option<InputDefinition> {
        let pos = self.inputs.iter().position(|def| def.id == id)?;
        self.connections
            .retain(|c| !(c.is_source_boundary() && c.output_definition_id == id));
        Some(self.inputs.remove(pos))
    }

    /// Removes an output along with the connections feeding it.
    pub fn remove_output(&mut self, id: SlotId) -> Option<OutputDefinition> {
        let pos = self.outputs.iter().position(|def| def.id == id)?;
        self.connections
            .retain(|c| !(c.is_target_boundary() && c.input_definition_id == id));
        Some(self.outputs.remove(pos))
    }

    pub fn add_child(&mut self, symbol_id: SymbolId) -> ChildId {
        self.push_child(symbol_id, None)
    }

    pub fn add_named_child(&mut self, symbol_id: SymbolId, name: impl Into<String>) -> ChildId {
        self.push_child(symbol_id, Some(name.into()))
    }

    fn push_child(&mut self, symbol_id: SymbolId, name: Option<String>) -> ChildId {
        let id = Uuid::new_v4();
        self.children.push(SymbolChild {
            id,
            symbol_id,
            name,
        });
        id
    }

    /// Removes a child usage along with every connection touching it.
    pub fn remove_child(&mut self, id: ChildId) -> Option<SymbolChild> {
        let pos = self.children.iter().position(|child| child.id == id)?;
        self.connections.retain(|c| !c.touches_child(id));
        Some(self.children.remove(pos))
    }

    /// Appends a connection without checking it; exact duplicates are ignored.
    ///
    /// Use [`registry::SymbolRegistry::connect`] for a validated edit.
    pub fn add_connection(&mut self, connection: Connection) {
        if !self.connections.contains(&connection) {
            self.connections.push(connection);
        }
    }

    pub(crate) fn insert_connection(&mut self, index: usize, connection: Connection) {
        let index = index.min(self.connections.len());
        self.connections.insert(index, connection);
    }

    pub fn remove_connection(&mut self, connection: &Connection) -> bool {
        match self.connections.iter().position(|c| c == connection) {
            Some(pos) => {
                self.connections.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Connections into one input, in declaration order.
    pub fn connections_to(&self, child: ChildId, input: SlotId) -> Vec<Connection> {
        self.connections
            .iter()
            .filter(|c| c.target_child_id == child && c.input_definition_id == input)
            .copied()
            .collect()
    }

    /// Structural snapshot for persistence and authoring layers.
    pub fn describe(&self) -> serde_json::Value {
        let inputs: Vec<_> = self
            .inputs
            .iter()
            .map(|def| {
                json!({
                    "id": def.id.to_string(),
                    "name": def.name,
                    "type": def.value_type().short_name(),
                    "default": def.default_value.render(),
                    "multiInput": def.is_multi_input,
                })
            })
            .collect();
        let outputs: Vec<_> = self
            .outputs
            .iter()
            .map(|def| {
                json!({
                    "id": def.id.to_string(),
                    "name": def.name,
                    "type": def.value_type.short_name(),
                })
            })
            .collect();
        let children: Vec<_> = self
            .children
            .iter()
            .map(|child| {
                json!({
                    "id": child.id.to_string(),
                    "symbolId": child.symbol_id.to_string(),
                    "name": child.name,
                })
            })
            .collect();
        let connections: Vec<_> = self
            .connections
            .iter()
            .map(|c| {
                json!({
                    "sourceChildId": c.source_child_id.to_string(),
                    "outputDefinitionId": c.output_definition_id.to_string(),
                    "targetChildId": c.target_child_id.to_string(),
                    "inputDefinitionId": c.input_definition_id.to_string(),
                })
            })
            .collect();

        json!({
            "id": self.id.to_string(),
            "name": self.name,
            "inputs": inputs,
            "outputs": outputs,
            "children": children,
            "connections": connections,
        })
    }
}
