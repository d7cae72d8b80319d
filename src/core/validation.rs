use crate::core::error::{GraphError, Result};
use crate::core::slot::ValueType;
use crate::core::symbol::registry::SymbolRegistry;
use crate::core::symbol::{Connection, Symbol};
use crate::core::{ChildId, SymbolId};
use std::collections::{HashMap, HashSet};

/// Represents an issue found while validating a symbol.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    /// A hard error: instances of the symbol cannot be constructed.
    Error(GraphError),
    /// A warning: construction succeeds but the result may surprise the author.
    Warning(String),
}

/// The result of a validation pass.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: GraphError) {
        self.issues.push(ValidationIssue::Error(error));
    }

    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.issues.push(ValidationIssue::Warning(msg.into()));
    }

    pub fn is_safe(&self) -> bool {
        !self.issues.iter().any(|i| matches!(i, ValidationIssue::Error(_)))
    }

    pub fn has_warnings(&self) -> bool {
        self.issues.iter().any(|i| matches!(i, ValidationIssue::Warning(_)))
    }

    pub fn errors(&self) -> impl Iterator<Item = &GraphError> {
        self.issues.iter().filter_map(|i| match i {
            ValidationIssue::Error(err) => Some(err),
            ValidationIssue::Warning(_) => None,
        })
    }

    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.issues.iter().filter_map(|i| match i {
            ValidationIssue::Warning(msg) => Some(msg.as_str()),
            ValidationIssue::Error(_) => None,
        })
    }

    /// First error, if any.
    pub fn into_result(self) -> Result<()> {
        match self.issues.into_iter().find_map(|i| match i {
            ValidationIssue::Error(err) => Some(err),
            ValidationIssue::Warning(_) => None,
        }) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn log_summary(&self, symbol_name: &str) {
        if self.is_safe() && !self.has_warnings() {
            log::info!("symbol '{symbol_name}' passed validation");
            return;
        }

        for issue in &self.issues {
            match issue {
                ValidationIssue::Error(err) => log::error!("symbol '{symbol_name}': {err}"),
                ValidationIssue::Warning(msg) => log::warn!("symbol '{symbol_name}': {msg}"),
            }
        }
    }
}

/// Value type of the slot a connection reads from.
pub(crate) fn source_type(
    registry: &SymbolRegistry,
    symbol: &Symbol,
    connection: &Connection,
) -> Result<ValueType> {
    let unresolved = || GraphError::UnresolvedConnectionEndpoint {
        symbol: symbol.id(),
        child: connection.source_child_id,
        slot: connection.output_definition_id,
    };

    if connection.is_source_boundary() {
        return symbol
            .input_definition(connection.output_definition_id)
            .map(|def| def.value_type())
            .ok_or_else(unresolved);
    }
    let child = symbol.child(connection.source_child_id).ok_or_else(unresolved)?;
    let child_symbol = registry
        .get(child.symbol_id)
        .ok_or(GraphError::UnknownSymbol(child.symbol_id))?;
    child_symbol
        .output_definition(connection.output_definition_id)
        .map(|def| def.value_type)
        .ok_or_else(unresolved)
}

/// Value type of the slot a connection feeds, and whether it is a multi-input.
pub(crate) fn target_type(
    registry: &SymbolRegistry,
    symbol: &Symbol,
    connection: &Connection,
) -> Result<(ValueType, bool)> {
    let unresolved = || GraphError::UnresolvedConnectionEndpoint {
        symbol: symbol.id(),
        child: connection.target_child_id,
        slot: connection.input_definition_id,
    };

    if connection.is_target_boundary() {
        return symbol
            .output_definition(connection.input_definition_id)
            .map(|def| (def.value_type, false))
            .ok_or_else(unresolved);
    }
    let child = symbol.child(connection.target_child_id).ok_or_else(unresolved)?;
    let child_symbol = registry
        .get(child.symbol_id)
        .ok_or(GraphError::UnknownSymbol(child.symbol_id))?;
    child_symbol
        .input_definition(connection.input_definition_id)
        .map(|def| (def.value_type(), def.is_multi_input))
        .ok_or_else(unresolved)
}

/// Resolves both endpoints and checks that their value types agree.
///
/// Types must be equal even when the target is a multi-input: a multi-input
/// collects values of its own type and never converts between types.
/// Returns whether the target accepts several sources.
pub(crate) fn check_connection(
    registry: &SymbolRegistry,
    symbol: &Symbol,
    connection: &Connection,
) -> Result<bool> {
    let source = source_type(registry, symbol, connection)?;
    let (target, is_multi) = target_type(registry, symbol, connection)?;
    if source != target {
        return Err(GraphError::TypeMismatch {
            expected: target.name(),
            found: source.name(),
            source_slot: connection.output_definition_id,
            target_slot: connection.input_definition_id,
        });
    }
    Ok(is_multi)
}

/// Checks everything instance construction relies on.
pub fn validate_symbol(registry: &SymbolRegistry, symbol: &Symbol) -> ValidationResult {
    let mut result = ValidationResult::new();

    for child in symbol.children() {
        if !registry.contains(child.symbol_id) {
            result.add_error(GraphError::UnknownSymbol(child.symbol_id));
        }
    }

    let mut single_targets: HashMap<(ChildId, ChildId), usize> = HashMap::new();
    for connection in symbol.connections() {
        match check_connection(registry, symbol, connection) {
            Ok(false) => {
                *single_targets
                    .entry((connection.target_child_id, connection.input_definition_id))
                    .or_default() += 1;
            }
            Ok(true) => {}
            Err(err) => result.add_error(err),
        }
    }
    for ((child, input), count) in single_targets {
        if count > 1 {
            result.add_warning(format!(
                "input {input} of child {child} has {count} connections; only the last one is used"
            ));
        }
    }

    if let Some(cycle) = find_child_cycle(symbol) {
        result.add_error(GraphError::CyclicDependency(format!(
            "children of '{}' form a loop: {}",
            symbol.name(),
            describe_children(symbol, &cycle)
        )));
    }

    if let Some(path) = find_composition_cycle(registry, symbol) {
        result.add_error(GraphError::CyclicDependency(format!(
            "symbol '{}' contains itself: {}",
            symbol.name(),
            describe_symbols(registry, symbol, &path)
        )));
    }

    warn_duplicate_names(
        &mut result,
        "input",
        symbol.input_definitions().iter().map(|d| d.name.as_str()),
    );
    warn_duplicate_names(
        &mut result,
        "output",
        symbol.output_definitions().iter().map(|d| d.name.as_str()),
    );

    result
}

fn warn_duplicate_names<'a>(
    result: &mut ValidationResult,
    what: &str,
    names: impl Iterator<Item = &'a str>,
) {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for name in names {
        if !seen.insert(name) && reported.insert(name) {
            result.add_warning(format!("duplicate {what} name '{name}'"));
        }
    }
}

/// Finds a loop among the children of `symbol`, following connections between them.
pub(crate) fn find_child_cycle(symbol: &Symbol) -> Option<Vec<ChildId>> {
    let mut edges: HashMap<ChildId, Vec<ChildId>> = HashMap::new();
    for c in symbol.connections() {
        if !c.is_source_boundary() && !c.is_target_boundary() {
            edges.entry(c.source_child_id).or_default().push(c.target_child_id);
        }
    }

    let mut done = HashSet::new();
    for child in symbol.children() {
        let mut path = Vec::new();
        if let Some(cycle) = visit(child.id, &edges, &mut path, &mut done) {
            return Some(cycle);
        }
    }
    None
}

fn visit(
    node: ChildId,
    edges: &HashMap<ChildId, Vec<ChildId>>,
    path: &mut Vec<ChildId>,
    done: &mut HashSet<ChildId>,
) -> Option<Vec<ChildId>> {
    if let Some(start) = path.iter().position(|n| *n == node) {
        let mut cycle = path[start..].to_vec();
        cycle.push(node);
        return Some(cycle);
    }
    if done.contains(&node) {
        return None;
    }
    path.push(node);
    for next in edges.get(&node).into_iter().flatten() {
        if let Some(cycle) = visit(*next, edges, path, done) {
            return Some(cycle);
        }
    }
    path.pop();
    done.insert(node);
    None
}

/// Finds a chain of child usages leading from `symbol` back to itself.
pub(crate) fn find_composition_cycle(
    registry: &SymbolRegistry,
    symbol: &Symbol,
) -> Option<Vec<SymbolId>> {
    let mut path = vec![symbol.id()];
    let mut done = HashSet::new();
    composition_visit(registry, symbol, symbol.id(), &mut path, &mut done)
}

fn composition_visit(
    registry: &SymbolRegistry,
    current: &Symbol,
    root: SymbolId,
    path: &mut Vec<SymbolId>,
    done: &mut HashSet<SymbolId>,
) -> Option<Vec<SymbolId>> {
    for child in current.children() {
        if child.symbol_id == root || path.contains(&child.symbol_id) {
            let mut cycle = path.clone();
            cycle.push(child.symbol_id);
            return Some(cycle);
        }
        if done.contains(&child.symbol_id) {
            continue;
        }
        let Some(child_symbol) = registry.get(child.symbol_id) else {
            continue;
        };
        path.push(child.symbol_id);
        if let Some(cycle) = composition_visit(registry, child_symbol, root, path, done) {
            return Some(cycle);
        }
        path.pop();
        done.insert(child.symbol_id);
    }
    None
}

fn describe_children(symbol: &Symbol, cycle: &[ChildId]) -> String {
    cycle
        .iter()
        .map(|id| match symbol.child(*id).and_then(|c| c.name.clone()) {
            Some(name) => name,
            None => id.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn describe_symbols(registry: &SymbolRegistry, root: &Symbol, path: &[SymbolId]) -> String {
    path.iter()
        .map(|id| {
            if *id == root.id() {
                root.name().to_string()
            } else {
                registry
                    .get(*id)
                    .map(|s| s.name().to_string())
                    .unwrap_or_else(|| id.to_string())
            }
        })
        .collect::<Vec<_>>()
        .join(" -> ")
}
