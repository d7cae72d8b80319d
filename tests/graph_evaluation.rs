use opgraph::builtin::{self, Add, Multiply, StringConcat, Sum, Time};
use opgraph::prelude::*;
use opgraph::{DirtyState, MemoryTelemetry, SlotId, SymbolId, TraceOutcome};
use pretty_assertions::assert_eq;
use std::rc::Rc;

fn registry() -> SymbolRegistry {
    let mut registry = SymbolRegistry::new();
    builtin::register_all(&mut registry).unwrap();
    registry
}

#[test]
fn test_add_scenario() {
    let registry = registry();
    let add = registry.create_instance(Add::SYMBOL_ID, Uuid::new_v4()).unwrap();

    let mut ctx = EvaluationContext::new();
    assert_eq!(add.get_value::<f32>(Add::RESULT, &ctx).unwrap(), 15.0);

    let value1 = add.typed_input::<f32>(Add::VALUE1).unwrap();
    value1.set_input_value(2.0);
    value1.invalidate();
    ctx.next_pass();
    assert_eq!(add.get_value::<f32>(Add::RESULT, &ctx).unwrap(), 12.0);
}

/// Multiply feeds two Adds, both Adds feed a Sum.
fn diamond(registry: &mut SymbolRegistry) -> (SymbolId, SlotId) {
    let mut graph = Symbol::new("Diamond");
    let out = graph.add_output::<f32>("Out");
    let producer = graph.add_child(Multiply::SYMBOL_ID);
    let left = graph.add_child(Add::SYMBOL_ID);
    let right = graph.add_child(Add::SYMBOL_ID);
    let sink = graph.add_child(Sum::SYMBOL_ID);
    let id = registry.register(graph).unwrap();

    for connection in [
        Connection::new(producer, Multiply::RESULT, left, Add::VALUE1),
        Connection::new(producer, Multiply::RESULT, right, Add::VALUE2),
        Connection::new(left, Add::RESULT, sink, Sum::VALUES),
        Connection::new(right, Add::RESULT, sink, Sum::VALUES),
        Connection::new(sink, Sum::RESULT, Connection::BOUNDARY, out),
    ] {
        registry.connect(id, connection).unwrap();
    }
    (id, out)
}

#[test]
fn test_diamond_producer_runs_once_per_pass() {
    let mut registry = registry();
    let (id, out) = diamond(&mut registry);
    let instance = registry.create_instance(id, Uuid::new_v4()).unwrap();
    let producer = instance.children()[0].id();
    instance
        .child(producer)
        .unwrap()
        .typed_input::<f32>(Multiply::VALUE)
        .unwrap()
        .set_input_value(3.0);
    instance
        .child(producer)
        .unwrap()
        .typed_input::<f32>(Multiply::FACTOR)
        .unwrap()
        .set_input_value(2.0);

    let telemetry = Rc::new(MemoryTelemetry::new());
    let mut ctx = EvaluationContext::new().with_telemetry(telemetry.clone());

    // (6 + 10) + (5 + 6)
    assert_eq!(instance.get_value::<f32>(out, &ctx).unwrap(), 27.0);
    assert_eq!(telemetry.count_for(Multiply::RESULT), 1);
    assert_eq!(telemetry.count_for(Add::RESULT), 2);
    assert_eq!(telemetry.count_for(Sum::RESULT), 1);

    assert_eq!(instance.get_value::<f32>(out, &ctx).unwrap(), 27.0);
    assert_eq!(telemetry.count_for(Multiply::RESULT), 1);

    ctx.next_pass();
    instance.get_value::<f32>(out, &ctx).unwrap();
    assert_eq!(telemetry.count_for(Multiply::RESULT), 2);
    assert!(
        telemetry
            .get_traces()
            .iter()
            .all(|t| t.outcome == TraceOutcome::Computed)
    );
}

#[test]
fn test_unpulled_slots_never_compute() {
    let mut registry = registry();
    let (id, _) = diamond(&mut registry);
    let instance = registry.create_instance(id, Uuid::new_v4()).unwrap();

    let telemetry = Rc::new(MemoryTelemetry::new());
    let ctx = EvaluationContext::new().with_telemetry(telemetry.clone());
    instance.invalidate_all();
    assert!(telemetry.get_traces().is_empty());

    // pulling one branch leaves the other and the sink untouched
    let left = &instance.children()[1];
    assert_eq!(left.get_value::<f32>(Add::RESULT, &ctx).unwrap(), 11.0);
    assert_eq!(telemetry.count_for(Sum::RESULT), 0);
    assert_eq!(telemetry.count_for(Add::RESULT), 1);
    assert_eq!(
        instance.children()[2].output(Add::RESULT).unwrap().dirty_flag().state(),
        DirtyState::Dirty
    );
}

#[test]
fn test_invalidation_recomputes_once() {
    let registry = registry();
    let add = registry.create_instance(Add::SYMBOL_ID, Uuid::new_v4()).unwrap();
    let telemetry = Rc::new(MemoryTelemetry::new());
    let ctx = EvaluationContext::new().with_telemetry(telemetry.clone());

    add.get_value::<f32>(Add::RESULT, &ctx).unwrap();
    assert_eq!(telemetry.count_for(Add::RESULT), 1);

    add.output(Add::RESULT).unwrap().invalidate();
    add.get_value::<f32>(Add::RESULT, &ctx).unwrap();
    add.get_value::<f32>(Add::RESULT, &ctx).unwrap();
    assert_eq!(telemetry.count_for(Add::RESULT), 2);
}

#[test]
fn test_multi_input_order_through_nested_aggregation() {
    let mut registry = registry();

    // First, Middle.., Last all feed one concat in that order
    let mut sentence = Symbol::new("Sentence");
    let first = sentence.add_input("First", String::new());
    let middle = sentence.add_multi_input("Middle", String::new());
    let last = sentence.add_input("Last", String::new());
    let text = sentence.add_output::<String>("Text");
    let concat = sentence.add_child(StringConcat::SYMBOL_ID);
    for input in [first, middle, last] {
        sentence.add_connection(Connection::new(
            Connection::BOUNDARY,
            input,
            concat,
            StringConcat::PARTS,
        ));
    }
    sentence.add_connection(Connection::new(
        concat,
        StringConcat::RESULT,
        Connection::BOUNDARY,
        text,
    ));
    let sentence_id = registry.register(sentence).unwrap();

    let mut outer = Symbol::new("Outer");
    let words: Vec<_> = ["a", "b1", "b2", "c"]
        .iter()
        .map(|w| outer.add_input(*w, w.to_string()))
        .collect();
    let out = outer.add_output::<String>("Out");
    let s = outer.add_child(sentence_id);
    let targets = [first, middle, middle, last];
    for (word, target) in words.iter().zip(targets) {
        outer.add_connection(Connection::new(Connection::BOUNDARY, *word, s, target));
    }
    outer.add_connection(Connection::new(s, text, Connection::BOUNDARY, out));
    let outer_id = registry.register(outer).unwrap();

    let instance = registry.create_instance(outer_id, Uuid::new_v4()).unwrap();
    let sentence = instance.child(s).unwrap();
    sentence.children()[0]
        .typed_input::<String>(StringConcat::SEPARATOR)
        .unwrap()
        .set_input_value(" ".to_string());

    let ctx = EvaluationContext::new();
    assert_eq!(instance.get_value::<String>(out, &ctx).unwrap(), "a b1 b2 c");

    let parts = sentence.children()[0]
        .typed_multi_input::<String>(StringConcat::PARTS)
        .unwrap();
    let collected: Vec<_> = parts.collected_inputs().iter().map(|slot| slot.id()).collect();
    assert_eq!(collected, vec![first, words[1], words[2], last]);
}

#[test]
fn test_instances_share_no_state() {
    let registry = registry();
    let first = registry.create_instance(Add::SYMBOL_ID, Uuid::new_v4()).unwrap();
    let second = registry.create_instance(Add::SYMBOL_ID, Uuid::new_v4()).unwrap();
    let ctx = EvaluationContext::new();

    first.get_value::<f32>(Add::RESULT, &ctx).unwrap();
    second.get_value::<f32>(Add::RESULT, &ctx).unwrap();

    first.typed_input::<f32>(Add::VALUE2).unwrap().set_input_value(0.0);
    first.invalidate_all();

    assert_eq!(first.get_value::<f32>(Add::RESULT, &ctx).unwrap(), 5.0);
    assert_eq!(second.get_value::<f32>(Add::RESULT, &ctx).unwrap(), 15.0);
    assert_eq!(
        second.typed_input::<f32>(Add::VALUE2).unwrap().input_value(),
        10.0
    );
}

#[test]
fn test_failure_leaves_slot_dirty_and_recovers() {
    let mut registry = registry();
    let mut root = Symbol::new("Root");
    let input = root.add_input("Value", -4.0f32);
    let output = root.add_output::<f32>("Root");
    let root = root.with_operator_fn(|slots| {
        let value = slots.input::<f32>("Value")?;
        slots.output::<f32>("Root")?.set_update(move |ctx| {
            let v = value.get_value(ctx)?;
            if v < 0.0 {
                return Err(GraphError::computation(format!("negative input {v}")));
            }
            Ok(v.sqrt())
        });
        Ok(())
    });
    let root_id = registry.register(root).unwrap();
    let instance = registry.create_instance(root_id, Uuid::new_v4()).unwrap();

    let telemetry = Rc::new(MemoryTelemetry::new());
    let mut ctx = EvaluationContext::new().with_telemetry(telemetry.clone());
    let err = instance.get_value::<f32>(output, &ctx).unwrap_err();
    assert_eq!(
        err,
        GraphError::NativeComputationFailure {
            slot: output,
            message: "negative input -4".to_string()
        }
    );
    assert_eq!(
        instance.output(output).unwrap().dirty_flag().state(),
        DirtyState::Dirty
    );
    assert!(matches!(
        telemetry.get_traces().last().map(|t| &t.outcome),
        Some(TraceOutcome::Failed(_))
    ));

    instance.typed_input::<f32>(input).unwrap().set_input_value(16.0);
    ctx.next_pass();
    assert_eq!(instance.get_value::<f32>(output, &ctx).unwrap(), 4.0);
}

#[test]
fn test_time_driven_graph_needs_no_invalidation() {
    let mut registry = registry();
    let mut clock = Symbol::new("Clock");
    let out = clock.add_output::<f64>("Seconds");
    let time = clock.add_child(Time::SYMBOL_ID);
    clock.add_connection(Connection::new(time, Time::TIME, Connection::BOUNDARY, out));
    let clock_id = registry.register(clock).unwrap();
    let instance = registry.create_instance(clock_id, Uuid::new_v4()).unwrap();

    let mut ctx = EvaluationContext::new();
    for t in [0.5, 1.0, 4.25] {
        ctx.advance(t);
        assert_eq!(instance.get_value::<f64>(out, &ctx).unwrap(), t);
    }
}
