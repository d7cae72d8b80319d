use crate::core::error::{GraphError, Result};
use crate::core::operator::{Operator, OperatorSlots};
use crate::core::symbol::{InputDefinition, OutputDefinition, Symbol};
use crate::core::{SlotId, SymbolId};
use uuid::Uuid;

/// Joins every string connected to `Parts` with `Separator`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringConcat;

impl StringConcat {
    pub const SYMBOL_ID: SymbolId = Uuid::from_u128(0x5d1c_0a01_0000_4000_8000_0000_0000_0005);
    pub const PARTS: SlotId = Uuid::from_u128(0x5d1c_0a01_0000_4000_8000_0000_0000_0141);
    pub const SEPARATOR: SlotId = Uuid::from_u128(0x5d1c_0a01_0000_4000_8000_0000_0000_0142);
    pub const RESULT: SlotId = Uuid::from_u128(0x5d1c_0a01_0000_4000_8000_0000_0000_0241);

    pub fn symbol() -> Symbol {
        let mut symbol = Symbol::with_id(Self::SYMBOL_ID, "StringConcat");
        symbol.insert_input(InputDefinition::new(Self::PARTS, "Parts", String::new()).multi());
        symbol.insert_input(InputDefinition::new(Self::SEPARATOR, "Separator", String::new()));
        symbol.insert_output(OutputDefinition::new::<String>(Self::RESULT, "Result"));
        symbol.with_operator(StringConcat)
    }
}

impl Operator for StringConcat {
    fn bind(&self, slots: &OperatorSlots<'_>) -> Result<()> {
        let parts = slots.multi_input_by_id::<String>(Self::PARTS)?;
        let separator = slots.input_by_id::<String>(Self::SEPARATOR)?;
        slots.output_by_id::<String>(Self::RESULT)?.set_update(move |ctx| {
            if !parts.is_connected() {
                return parts.get_value(ctx);
            }
            let pieces = parts
                .collected_inputs()
                .iter()
                .map(|slot| slot.get_value(ctx))
                .collect::<Result<Vec<_>>>()?;
            let separator = separator.get_value(ctx)?;
            Ok(pieces.join(separator.as_str()))
        });
        Ok(())
    }
}

/// Character count of `Text`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringLength;

impl StringLength {
    pub const SYMBOL_ID: SymbolId = Uuid::from_u128(0x5d1c_0a01_0000_4000_8000_0000_0000_0006);
    pub const TEXT: SlotId = Uuid::from_u128(0x5d1c_0a01_0000_4000_8000_0000_0000_0151);
    pub const LENGTH: SlotId = Uuid::from_u128(0x5d1c_0a01_0000_4000_8000_0000_0000_0251);

    pub fn symbol() -> Symbol {
        let mut symbol = Symbol::with_id(Self::SYMBOL_ID, "StringLength");
        symbol.insert_input(InputDefinition::new(Self::TEXT, "Text", String::new()));
        symbol.insert_output(OutputDefinition::new::<i32>(Self::LENGTH, "Length"));
        symbol.with_operator(StringLength)
    }
}

impl Operator for StringLength {
    fn bind(&self, slots: &OperatorSlots<'_>) -> Result<()> {
        let text = slots.input_by_id::<String>(Self::TEXT)?;
        slots.output_by_id::<i32>(Self::LENGTH)?.set_update(move |ctx| {
            let count = text.with_value_in(ctx, |s| s.chars().count())?;
            i32::try_from(count)
                .map_err(|_| GraphError::computation(format!("{count} characters overflow i32")))
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::EvaluationContext;
    use crate::core::symbol::Connection;
    use crate::core::symbol::registry::SymbolRegistry;

    #[test]
    fn test_concat_then_measure() {
        let mut registry = SymbolRegistry::new();
        crate::builtin::register_all(&mut registry).unwrap();

        let mut greeting = Symbol::new("Greeting");
        let hello = greeting.add_input("Hello", String::from("hello"));
        let world = greeting.add_input("World", String::from("wörld"));
        let text = greeting.add_output::<String>("Text");
        let length = greeting.add_output::<i32>("Length");
        let concat = greeting.add_child(StringConcat::SYMBOL_ID);
        let measure = greeting.add_child(StringLength::SYMBOL_ID);
        for connection in [
            Connection::new(Connection::BOUNDARY, hello, concat, StringConcat::PARTS),
            Connection::new(Connection::BOUNDARY, world, concat, StringConcat::PARTS),
            Connection::new(concat, StringConcat::RESULT, Connection::BOUNDARY, text),
            Connection::new(concat, StringConcat::RESULT, measure, StringLength::TEXT),
            Connection::new(measure, StringLength::LENGTH, Connection::BOUNDARY, length),
        ] {
            greeting.add_connection(connection);
        }
        let greeting_id = registry.register(greeting).unwrap();

        let instance = registry.create_instance(greeting_id, Uuid::new_v4()).unwrap();
        instance
            .child(concat)
            .unwrap()
            .typed_input::<String>(StringConcat::SEPARATOR)
            .unwrap()
            .set_input_value(", ".to_string());

        let ctx = EvaluationContext::new();
        assert_eq!(instance.get_value::<String>(text, &ctx).unwrap(), "hello, wörld");
        assert_eq!(instance.get_value::<i32>(length, &ctx).unwrap(), 12);
    }
}
