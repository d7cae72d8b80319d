use crate::core::error::Result;
use crate::core::operator::{Operator, OperatorSlots};
use crate::core::symbol::{OutputDefinition, Symbol};
use crate::core::{SlotId, SymbolId};
use uuid::Uuid;

/// Exposes the context's times. Its outputs are always dirty, so every pull
/// sees the current pass's clock without any invalidation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Time;

impl Time {
    pub const SYMBOL_ID: SymbolId = Uuid::from_u128(0x5d1c_0a01_0000_4000_8000_0000_0000_0004);
    pub const TIME: SlotId = Uuid::from_u128(0x5d1c_0a01_0000_4000_8000_0000_0000_0231);
    pub const LOCAL_TIME: SlotId = Uuid::from_u128(0x5d1c_0a01_0000_4000_8000_0000_0000_0232);

    pub fn symbol() -> Symbol {
        let mut symbol = Symbol::with_id(Self::SYMBOL_ID, "Time");
        symbol.insert_output(OutputDefinition::new::<f64>(Self::TIME, "Time"));
        symbol.insert_output(OutputDefinition::new::<f64>(Self::LOCAL_TIME, "LocalTime"));
        symbol.with_operator(Time)
    }
}

impl Operator for Time {
    fn bind(&self, slots: &OperatorSlots<'_>) -> Result<()> {
        let time = slots.output_by_id::<f64>(Self::TIME)?;
        time.dirty_flag().set_always_dirty(true);
        time.set_update(|ctx| Ok(ctx.time));

        let local_time = slots.output_by_id::<f64>(Self::LOCAL_TIME)?;
        local_time.dirty_flag().set_always_dirty(true);
        local_time.set_update(|ctx| Ok(ctx.local_time));
        Ok(())
    }
}
