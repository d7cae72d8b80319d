use crate::core::error::Result;
use crate::core::operator::{Operator, OperatorSlots};
use crate::core::symbol::{InputDefinition, OutputDefinition, Symbol};
use crate::core::{SlotId, SymbolId};
use uuid::Uuid;

/// `Result = Value1 + Value2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Add;

impl Add {
    pub const SYMBOL_ID: SymbolId = Uuid::from_u128(0x5d1c_0a01_0000_4000_8000_0000_0000_0001);
    pub const VALUE1: SlotId = Uuid::from_u128(0x5d1c_0a01_0000_4000_8000_0000_0000_0101);
    pub const VALUE2: SlotId = Uuid::from_u128(0x5d1c_0a01_0000_4000_8000_0000_0000_0102);
    pub const RESULT: SlotId = Uuid::from_u128(0x5d1c_0a01_0000_4000_8000_0000_0000_0201);

    pub fn symbol() -> Symbol {
        let mut symbol = Symbol::with_id(Self::SYMBOL_ID, "Add");
        symbol.insert_input(InputDefinition::new(Self::VALUE1, "Value1", 5.0f32));
        symbol.insert_input(InputDefinition::new(Self::VALUE2, "Value2", 10.0f32));
        symbol.insert_output(OutputDefinition::new::<f32>(Self::RESULT, "Result"));
        symbol.with_operator(Add)
    }
}

impl Operator for Add {
    fn bind(&self, slots: &OperatorSlots<'_>) -> Result<()> {
        let value1 = slots.input_by_id::<f32>(Self::VALUE1)?;
        let value2 = slots.input_by_id::<f32>(Self::VALUE2)?;
        slots
            .output_by_id::<f32>(Self::RESULT)?
            .set_update(move |ctx| Ok(value1.get_value(ctx)? + value2.get_value(ctx)?));
        Ok(())
    }
}

/// Adds up every value connected to `Values`, in connection order.
///
/// With nothing connected the authored value of `Values` is used.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

impl Sum {
    pub const SYMBOL_ID: SymbolId = Uuid::from_u128(0x5d1c_0a01_0000_4000_8000_0000_0000_0002);
    pub const VALUES: SlotId = Uuid::from_u128(0x5d1c_0a01_0000_4000_8000_0000_0000_0111);
    pub const RESULT: SlotId = Uuid::from_u128(0x5d1c_0a01_0000_4000_8000_0000_0000_0211);

    pub fn symbol() -> Symbol {
        let mut symbol = Symbol::with_id(Self::SYMBOL_ID, "Sum");
        symbol.insert_input(InputDefinition::new(Self::VALUES, "Values", 0.0f32).multi());
        symbol.insert_output(OutputDefinition::new::<f32>(Self::RESULT, "Result"));
        symbol.with_operator(Sum)
    }
}

impl Operator for Sum {
    fn bind(&self, slots: &OperatorSlots<'_>) -> Result<()> {
        let values = slots.multi_input_by_id::<f32>(Self::VALUES)?;
        slots.output_by_id::<f32>(Self::RESULT)?.set_update(move |ctx| {
            if !values.is_connected() {
                return values.get_value(ctx);
            }
            let mut total = 0.0;
            for slot in values.collected_inputs() {
                total += slot.get_value(ctx)?;
            }
            Ok(total)
        });
        Ok(())
    }
}

/// `Result = Value * Factor`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Multiply;

impl Multiply {
    pub const SYMBOL_ID: SymbolId = Uuid::from_u128(0x5d1c_0a01_0000_4000_8000_0000_0000_0003);
    pub const VALUE: SlotId = Uuid::from_u128(0x5d1c_0a01_0000_4000_8000_0000_0000_0121);
    pub const FACTOR: SlotId = Uuid::from_u128(0x5d1c_0a01_0000_4000_8000_0000_0000_0122);
    pub const RESULT: SlotId = Uuid::from_u128(0x5d1c_0a01_0000_4000_8000_0000_0000_0221);

    pub fn symbol() -> Symbol {
        let mut symbol = Symbol::with_id(Self::SYMBOL_ID, "Multiply");
        symbol.insert_input(InputDefinition::new(Self::VALUE, "Value", 1.0f32));
        symbol.insert_input(InputDefinition::new(Self::FACTOR, "Factor", 1.0f32));
        symbol.insert_output(OutputDefinition::new::<f32>(Self::RESULT, "Result"));
        symbol.with_operator(Multiply)
    }
}

impl Operator for Multiply {
    fn bind(&self, slots: &OperatorSlots<'_>) -> Result<()> {
        let value = slots.input_by_id::<f32>(Self::VALUE)?;
        let factor = slots.input_by_id::<f32>(Self::FACTOR)?;
        slots
            .output_by_id::<f32>(Self::RESULT)?
            .set_update(move |ctx| Ok(value.get_value(ctx)? * factor.get_value(ctx)?));
        Ok(())
    }
}
