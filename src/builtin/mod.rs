//! Ready-made operator symbols.
//!
//! Every operator here is a unit struct implementing [`Operator`] with a
//! `symbol()` constructor. Symbol and slot ids are fixed, so graphs built
//! against them stay valid across runs.
//!
//! ```rust
//! use opgraph::builtin::{self, Add};
//! use opgraph::prelude::*;
//!
//! let mut registry = SymbolRegistry::new();
//! builtin::register_all(&mut registry).unwrap();
//!
//! let add = registry.create_instance(Add::SYMBOL_ID, Uuid::new_v4()).unwrap();
//! let ctx = EvaluationContext::new();
//! assert_eq!(add.get_value::<f32>(Add::RESULT, &ctx).unwrap(), 15.0);
//! ```
//!
//! [`Operator`]: crate::Operator

pub mod math;
pub mod random;
pub mod text;
pub mod time;

pub use math::{Add, Multiply, Sum};
pub use random::Random;
pub use text::{StringConcat, StringLength};
pub use time::Time;

use crate::core::error::Result;
use crate::core::symbol::Symbol;
use crate::core::symbol::registry::SymbolRegistry;

/// Fresh copies of every built-in symbol.
pub fn symbols() -> Vec<Symbol> {
    vec![
        Add::symbol(),
        Sum::symbol(),
        Multiply::symbol(),
        Time::symbol(),
        Random::symbol(),
        StringConcat::symbol(),
        StringLength::symbol(),
    ]
}

/// Registers every built-in symbol, failing if one is already present.
pub fn register_all(registry: &mut SymbolRegistry) -> Result<()> {
    for symbol in symbols() {
        registry.register(symbol)?;
    }
    Ok(())
}
