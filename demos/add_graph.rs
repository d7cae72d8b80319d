//! A complete example showing how to compose and evaluate an operator graph.
//!
//! This example demonstrates:
//! - Registering the built-in operators
//! - Composing them into a new symbol with boundary inputs and outputs
//! - Evaluating an instance across several passes
//! - Watching which slots actually recompute
//!
//! Run with `RUST_LOG=debug cargo run --example add_graph` to see the engine's logs.

use opgraph::builtin::{self, Add, Multiply, Sum, Time};
use opgraph::prelude::*;
use opgraph::MemoryTelemetry;
use std::rc::Rc;

fn main() -> Result<()> {
    env_logger::init();

    // ========================================================================
    // Step 1: Register the building blocks
    // ========================================================================

    let mut registry = SymbolRegistry::new();
    builtin::register_all(&mut registry)?;

    // ========================================================================
    // Step 2: Compose "Wave" = (Time * Gain + Offset) + Offset
    // ========================================================================

    // Time is f64, the math operators are f32: a small closure operator adapts it.
    let mut to_f32 = Symbol::new("ToF32");
    let seconds = to_f32.add_input("Seconds", 0.0f64);
    let as_f32 = to_f32.add_output::<f32>("Value");
    let to_f32 = to_f32.with_operator_fn(|slots| {
        let seconds = slots.input::<f64>("Seconds")?;
        slots
            .output::<f32>("Value")?
            .set_update(move |ctx| Ok(seconds.get_value(ctx)? as f32));
        Ok(())
    });
    let to_f32_id = registry.register(to_f32)?;

    let mut wave = Symbol::new("Wave");
    let gain = wave.add_input("Gain", 2.0f32);
    let offset = wave.add_input("Offset", 0.5f32);
    let out = wave.add_output::<f32>("Out");
    let time = wave.add_named_child(Time::SYMBOL_ID, "clock");
    let adapter = wave.add_named_child(to_f32_id, "adapter");
    let multiply = wave.add_named_child(Multiply::SYMBOL_ID, "scale");
    let add = wave.add_named_child(Add::SYMBOL_ID, "shift");
    let sum = wave.add_named_child(Sum::SYMBOL_ID, "total");
    let wave_id = registry.register(wave)?;

    for connection in [
        Connection::new(time, Time::TIME, adapter, seconds),
        Connection::new(adapter, as_f32, multiply, Multiply::VALUE),
        Connection::new(Connection::BOUNDARY, gain, multiply, Multiply::FACTOR),
        Connection::new(multiply, Multiply::RESULT, add, Add::VALUE1),
        Connection::new(Connection::BOUNDARY, offset, add, Add::VALUE2),
        Connection::new(add, Add::RESULT, sum, Sum::VALUES),
        Connection::new(Connection::BOUNDARY, offset, sum, Sum::VALUES),
        Connection::new(sum, Sum::RESULT, Connection::BOUNDARY, out),
    ] {
        registry.connect(wave_id, connection)?;
    }

    if let Some(symbol) = registry.get(wave_id) {
        println!("{}", serde_json::to_string_pretty(&symbol.describe()).unwrap_or_default());
    }

    // ========================================================================
    // Step 3: Evaluate a few frames
    // ========================================================================

    let instance = registry.create_instance(wave_id, Uuid::new_v4())?;
    let telemetry = Rc::new(MemoryTelemetry::new());
    let mut ctx = EvaluationContext::new().with_telemetry(telemetry.clone());

    for frame in 0..4 {
        ctx.advance(frame as f64 * 0.5);
        let value = instance.get_value::<f32>(out, &ctx)?;
        // a second pull in the same pass is served from cache
        instance.get_value::<f32>(out, &ctx)?;
        println!("t = {:.1}s -> {value}", ctx.time);
    }

    // ========================================================================
    // Step 4: Edit an input
    // ========================================================================

    let gain_slot = instance.typed_input::<f32>(gain)?;
    gain_slot.set_input_value(10.0);
    gain_slot.invalidate();
    ctx.next_pass();
    println!("gain 10 at t = {:.1}s -> {}", ctx.time, instance.get_value::<f32>(out, &ctx)?);

    println!(
        "Multiply ran {} times, {} slot updates in total",
        telemetry.count_for(Multiply::RESULT),
        telemetry.get_traces().len()
    );

    Ok(())
}
