use crate::core::error::Result;
use crate::core::operator::{Operator, OperatorSlots};
use crate::core::symbol::{InputDefinition, OutputDefinition, Symbol};
use crate::core::{SlotId, SymbolId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

/// A float in `[0, 1)` drawn from a generator seeded with `Seed`.
///
/// The same seed always yields the same value, so the output only changes
/// when the seed does.
#[derive(Debug, Clone, Copy, Default)]
pub struct Random;

impl Random {
    pub const SYMBOL_ID: SymbolId = Uuid::from_u128(0x5d1c_0a01_0000_4000_8000_0000_0000_0007);
    pub const SEED: SlotId = Uuid::from_u128(0x5d1c_0a01_0000_4000_8000_0000_0000_0261);
    pub const RESULT: SlotId = Uuid::from_u128(0x5d1c_0a01_0000_4000_8000_0000_0000_0271);

    pub fn symbol() -> Symbol {
        let mut symbol = Symbol::with_id(Self::SYMBOL_ID, "Random");
        symbol.insert_input(InputDefinition::new(Self::SEED, "Seed", 0i32));
        symbol.insert_output(OutputDefinition::new::<f32>(Self::RESULT, "Result"));
        symbol.with_operator(Random)
    }
}

impl Operator for Random {
    fn bind(&self, slots: &OperatorSlots<'_>) -> Result<()> {
        let seed = slots.input_by_id::<i32>(Self::SEED)?;
        slots.output_by_id::<f32>(Self::RESULT)?.set_update(move |ctx| {
            let mut rng = StdRng::seed_from_u64(seed.get_value(ctx)? as u64);
            Ok(rng.gen_range(0.0..1.0))
        });
        Ok(())
    }
}
