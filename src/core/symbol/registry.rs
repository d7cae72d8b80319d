use crate::core::error::{GraphError, Result};
use crate::core::instance::Instance;
use crate::core::symbol::{Connection, Symbol};
use crate::core::validation::{self, ValidationResult};
use crate::core::{InstanceId, SymbolId};
use std::collections::HashMap;

/// Resolver from symbol id to symbol, passed explicitly to everything that
/// constructs or validates graphs.
#[derive(Debug, Default, Clone)]
pub struct SymbolRegistry {
    symbols: HashMap<SymbolId, Symbol>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self {
            symbols: HashMap::new(),
        }
    }

    /// Stores a symbol without validating it, returning the one it replaced.
    ///
    /// Needed when symbols reference each other and can only be checked once
    /// all of them are present.
    pub fn insert(&mut self, symbol: Symbol) -> Option<Symbol> {
        self.symbols.insert(symbol.id(), symbol)
    }

    /// Validates and stores a new symbol.
    pub fn register(&mut self, symbol: Symbol) -> Result<SymbolId> {
        if self.symbols.contains_key(&symbol.id()) {
            return Err(GraphError::DuplicateSymbol(symbol.id()));
        }
        self.publish(symbol)
    }

    /// Validates and stores a symbol, replacing an earlier version.
    ///
    /// Existing instances keep their old shape until
    /// [`Instance::update_consistency`] is called on them.
    pub fn publish(&mut self, symbol: Symbol) -> Result<SymbolId> {
        let result = validation::validate_symbol(self, &symbol);
        if result.has_warnings() {
            result.log_summary(symbol.name());
        }
        result.into_result()?;

        let id = symbol.id();
        log::debug!("published symbol '{}' ({id})", symbol.name());
        self.symbols.insert(id, symbol);
        Ok(id)
    }

    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(&id)
    }

    /// Direct mutable access. Edits made here are not validated.
    pub fn get_mut(&mut self, id: SymbolId) -> Option<&mut Symbol> {
        self.symbols.get_mut(&id)
    }

    pub fn remove(&mut self, id: SymbolId) -> Option<Symbol> {
        self.symbols.remove(&id)
    }

    pub fn contains(&self, id: SymbolId) -> bool {
        self.symbols.contains_key(&id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Symbol> {
        self.symbols.values().find(|s| s.name() == name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    /// Adds a connection to a stored symbol after checking it.
    ///
    /// A connection into a single input takes the place of the one already
    /// there. On any error the symbol is left untouched.
    pub fn connect(&mut self, symbol_id: SymbolId, connection: Connection) -> Result<()> {
        let symbol = self
            .get(symbol_id)
            .ok_or(GraphError::UnknownSymbol(symbol_id))?;
        let mut edited = symbol.clone();

        let is_multi = validation::check_connection(self, &edited, &connection)?;
        if is_multi {
            edited.add_connection(connection);
        } else {
            let replaced =
                edited.connections_to(connection.target_child_id, connection.input_definition_id);
            let position = replaced
                .first()
                .and_then(|old| edited.connections().iter().position(|c| c == old))
                .unwrap_or(edited.connections().len());
            for old in &replaced {
                log::debug!("'{}': replacing connection {old}", edited.name());
                edited.remove_connection(old);
            }
            edited.insert_connection(position, connection);
        }

        if let Some(cycle) = validation::find_child_cycle(&edited) {
            log::error!(
                "'{}': connection {connection} would close a loop through {} children",
                edited.name(),
                cycle.len() - 1
            );
            return Err(GraphError::CyclicDependency(format!(
                "connection {connection} closes a loop in '{}'",
                edited.name()
            )));
        }

        log::debug!("'{}': connected {connection}", edited.name());
        self.symbols.insert(symbol_id, edited);
        Ok(())
    }

    /// Removes a connection from a stored symbol.
    pub fn disconnect(&mut self, symbol_id: SymbolId, connection: &Connection) -> Result<bool> {
        let symbol = self
            .get_mut(symbol_id)
            .ok_or(GraphError::UnknownSymbol(symbol_id))?;
        Ok(symbol.remove_connection(connection))
    }

    pub fn validate(&self, symbol_id: SymbolId) -> Result<ValidationResult> {
        let symbol = self
            .get(symbol_id)
            .ok_or(GraphError::UnknownSymbol(symbol_id))?;
        Ok(validation::validate_symbol(self, symbol))
    }

    /// Builds a live instance of a stored symbol, children included.
    pub fn create_instance(
        &self,
        symbol_id: SymbolId,
        instance_id: InstanceId,
    ) -> Result<Instance> {
        Instance::build(self, symbol_id, instance_id)
    }
}
