use crate::core::SlotId;
use crate::core::context::EvaluationContext;
use crate::core::error::{GraphError, Result};
use crate::core::slot::input_slot::InputState;
use crate::core::slot::{AnySlot, DefaultValue, DirtyFlag, SlotKind, SlotValue, ValueType};
use crate::core::telemetry::{TraceEntry, TraceOutcome};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Computation bound to a slot; its result becomes the slot's value.
pub type UpdateFn<T> = dyn Fn(&EvaluationContext) -> Result<T>;

/// A typed, memoized value cell.
///
/// `Slot` is a cheap handle: clones refer to the same cell, which is how
/// connections and operator computations share it.
pub struct Slot<T: SlotValue> {
    inner: Rc<SlotInner<T>>,
}

struct SlotInner<T: SlotValue> {
    id: SlotId,
    kind: SlotKind,
    value: RefCell<T>,
    dirty: DirtyFlag,
    update: RefCell<Option<Rc<UpdateFn<T>>>>,
    connections: RefCell<Vec<Slot<T>>>,
    input: Option<InputState<T>>,
    evaluating: Cell<bool>,
}

impl<T: SlotValue> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Slot {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: SlotValue> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("value", &*self.inner.value.borrow())
            .field("dirty", &self.inner.dirty.state())
            .field("connections", &self.inner.connections.borrow().len())
            .finish()
    }
}

impl<T: SlotValue> Slot<T> {
    /// Creates an output slot holding `T::default()`.
    pub fn new(id: SlotId) -> Self {
        Self::with_value(id, T::default())
    }

    /// Creates an output slot with an initial cached value.
    pub fn with_value(id: SlotId, value: T) -> Self {
        Self::build(id, SlotKind::Output, value, None)
    }

    pub(crate) fn new_input(id: SlotId, default: T, multi: bool) -> Self {
        let kind = if multi {
            SlotKind::MultiInput
        } else {
            SlotKind::Input
        };
        let input = InputState::new(default.clone());
        Self::build(id, kind, default, Some(input))
    }

    fn build(id: SlotId, kind: SlotKind, value: T, input: Option<InputState<T>>) -> Self {
        Slot {
            inner: Rc::new(SlotInner {
                id,
                kind,
                value: RefCell::new(value),
                dirty: DirtyFlag::new(),
                update: RefCell::new(None),
                connections: RefCell::new(Vec::new()),
                input,
                evaluating: Cell::new(false),
            }),
        }
    }

    pub fn id(&self) -> SlotId {
        self.inner.id
    }

    pub fn kind(&self) -> SlotKind {
        self.inner.kind
    }

    pub fn is_multi_input(&self) -> bool {
        self.inner.kind == SlotKind::MultiInput
    }

    pub fn is_connected(&self) -> bool {
        !self.inner.connections.borrow().is_empty()
    }

    pub fn dirty_flag(&self) -> &DirtyFlag {
        &self.inner.dirty
    }

    pub fn invalidate(&self) {
        self.inner.dirty.invalidate();
    }

    /// The last computed value, without evaluating.
    pub fn value(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Overwrites the cached value. The next recomputation replaces it again.
    pub fn set_value(&self, value: T) {
        *self.inner.value.borrow_mut() = value;
    }

    /// Binds the computation that produces this slot's value.
    pub fn set_update<F>(&self, update: F)
    where
        F: Fn(&EvaluationContext) -> Result<T> + 'static,
    {
        *self.inner.update.borrow_mut() = Some(Rc::new(update));
        self.inner.dirty.invalidate();
    }

    pub fn clear_update(&self) {
        *self.inner.update.borrow_mut() = None;
        self.inner.dirty.invalidate();
    }

    pub fn has_update(&self) -> bool {
        self.inner.update.borrow().is_some()
    }

    /// Returns the value for the context's pass, recomputing first when stale.
    ///
    /// Within one pass a slot recomputes at most once unless it is invalidated
    /// or always dirty. A failed computation leaves the slot dirty and keeps
    /// the previous value.
    pub fn get_value(&self, context: &EvaluationContext) -> Result<T> {
        self.refresh(context)?;
        Ok(self.inner.value.borrow().clone())
    }

    /// Like [`Slot::get_value`] but lends the cached value instead of cloning it.
    pub fn with_value_in<R>(
        &self,
        context: &EvaluationContext,
        f: impl FnOnce(&T) -> R,
    ) -> Result<R> {
        self.refresh(context)?;
        Ok(f(&self.inner.value.borrow()))
    }

    fn refresh(&self, context: &EvaluationContext) -> Result<()> {
        if self.inner.dirty.is_dirty_for(context.pass_version()) {
            self.recompute(context)?;
        }
        Ok(())
    }

    fn recompute(&self, context: &EvaluationContext) -> Result<()> {
        if self.inner.evaluating.get() {
            log::error!("slot {} was pulled while it was being evaluated", self.inner.id);
            return Err(GraphError::CyclicDependency(format!(
                "slot {} depends on itself",
                self.inner.id
            )));
        }
        let _depth = context.enter()?;

        self.inner.evaluating.set(true);
        let result = self.compute(context);
        self.inner.evaluating.set(false);

        match result {
            Ok(value) => {
                *self.inner.value.borrow_mut() = value;
                self.inner.dirty.mark_valid(context.pass_version());
                self.trace(context, TraceOutcome::Computed);
                Ok(())
            }
            Err(err) => {
                let originated_here = matches!(
                    &err,
                    GraphError::NativeComputationFailure { slot, .. } if slot.is_nil()
                );
                let err = err.attributed_to(self.inner.id);
                if originated_here {
                    log::warn!("{err}");
                } else {
                    log::debug!("slot {} not updated: {err}", self.inner.id);
                }
                self.inner.dirty.invalidate();
                self.trace(context, TraceOutcome::Failed(err.to_string()));
                Err(err)
            }
        }
    }

    fn compute(&self, context: &EvaluationContext) -> Result<T> {
        if self.is_connected() {
            // Pass-through: a multi-input pulled as a whole yields its first source.
            let source = if self.is_multi_input() {
                self.collected_inputs().into_iter().next()
            } else {
                self.inner.connections.borrow().first().cloned()
            };
            if let Some(source) = source {
                return source.get_value(context);
            }
        }

        let update = self.inner.update.borrow().clone();
        if let Some(update) = update {
            return update(context);
        }
        if let Some(input) = &self.inner.input {
            return Ok(input.value());
        }
        Ok(self.inner.value.borrow().clone())
    }

    fn trace(&self, context: &EvaluationContext, outcome: TraceOutcome) {
        if context.telemetry().is_none() {
            return;
        }
        context.record(TraceEntry {
            pass_version: context.pass_version().get(),
            slot: self.inner.id,
            kind: self.inner.kind,
            value_type: ValueType::of::<T>().short_name().to_string(),
            depth: context.depth(),
            outcome,
        });
    }

    /// Direct upstream slots in declaration order.
    pub fn connections(&self) -> Vec<Slot<T>> {
        self.inner.connections.borrow().clone()
    }

    /// Appends an upstream slot. A single input replaces its current source.
    pub fn connect(&self, source: &Slot<T>) -> Result<()> {
        if source.depends_on(self) {
            log::error!(
                "connecting {} -> {} would close a cycle",
                source.id(),
                self.id()
            );
            return Err(GraphError::CyclicDependency(format!(
                "connecting {} -> {} closes a loop",
                source.id(),
                self.id()
            )));
        }
        {
            let mut connections = self.inner.connections.borrow_mut();
            if !self.is_multi_input() && !connections.is_empty() {
                log::debug!("input {} replaces its existing connection", self.id());
                connections.clear();
            }
            connections.push(source.clone());
        }
        self.invalidate();
        Ok(())
    }

    /// Removes the first connection to `source`.
    pub fn disconnect(&self, source: &Slot<T>) -> bool {
        let removed = {
            let mut connections = self.inner.connections.borrow_mut();
            match connections.iter().position(|s| s.ptr_eq(source)) {
                Some(pos) => {
                    connections.remove(pos);
                    true
                }
                None => false,
            }
        };
        if removed {
            self.invalidate();
        }
        removed
    }

    pub fn clear_connections(&self) {
        self.inner.connections.borrow_mut().clear();
        self.invalidate();
    }

    /// Flattens the upstream list, splicing in the sources of connected multi-inputs.
    ///
    /// Rebuilt on every call so that topology edits show up immediately.
    pub fn collected_inputs(&self) -> Vec<Slot<T>> {
        let mut collected = Vec::new();
        for slot in self.inner.connections.borrow().iter() {
            if slot.is_multi_input() && slot.is_connected() {
                collected.extend(slot.collected_inputs());
            } else {
                collected.push(slot.clone());
            }
        }
        collected
    }

    /// Whether `other` is reachable upstream through connections, or is this slot.
    pub fn depends_on(&self, other: &Slot<T>) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        self.inner
            .connections
            .borrow()
            .iter()
            .any(|upstream| upstream.depends_on(other))
    }

    pub fn ptr_eq(&self, other: &Slot<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn input_state(&self) -> Option<&InputState<T>> {
        self.inner.input.as_ref()
    }
}

impl<T: SlotValue> AnySlot for Slot<T> {
    fn id(&self) -> SlotId {
        self.inner.id
    }

    fn kind(&self) -> SlotKind {
        self.inner.kind
    }

    fn value_type(&self) -> ValueType {
        ValueType::of::<T>()
    }

    fn connection_count(&self) -> usize {
        self.inner.connections.borrow().len()
    }

    fn dirty_flag(&self) -> &DirtyFlag {
        &self.inner.dirty
    }

    fn update(&self, context: &EvaluationContext) -> Result<()> {
        self.refresh(context)
    }

    fn connections(&self) -> Vec<Box<dyn AnySlot>> {
        self.inner
            .connections
            .borrow()
            .iter()
            .map(|s| Box::new(s.clone()) as Box<dyn AnySlot>)
            .collect()
    }

    fn collect_inputs(&self) -> Vec<Box<dyn AnySlot>> {
        self.collected_inputs()
            .into_iter()
            .map(|s| Box::new(s) as Box<dyn AnySlot>)
            .collect()
    }

    fn add_connection(&self, source: &dyn AnySlot) -> Result<()> {
        match source.as_any_ref().downcast_ref::<Slot<T>>() {
            Some(typed) => self.connect(typed),
            None => Err(GraphError::TypeMismatch {
                expected: ValueType::of::<T>().name(),
                found: source.value_type().name(),
                source_slot: source.id(),
                target_slot: self.inner.id,
            }),
        }
    }

    fn remove_connection(&self, source: &dyn AnySlot) -> bool {
        match source.as_any_ref().downcast_ref::<Slot<T>>() {
            Some(typed) => self.disconnect(typed),
            None => false,
        }
    }

    fn clear_connections(&self) {
        Slot::clear_connections(self);
    }

    fn same_slot(&self, other: &dyn AnySlot) -> bool {
        other
            .as_any_ref()
            .downcast_ref::<Slot<T>>()
            .is_some_and(|typed| self.ptr_eq(typed))
    }

    fn clone_slot(&self) -> Box<dyn AnySlot> {
        Box::new(self.clone())
    }

    fn value_debug(&self) -> String {
        format!("{:?}", &*self.inner.value.borrow())
    }

    fn is_default(&self) -> Option<bool> {
        self.inner.input.as_ref().map(|input| input.is_default())
    }

    fn apply_default(&self, default: &DefaultValue) -> Result<()> {
        let Some(input) = &self.inner.input else {
            return Ok(());
        };
        match default.get::<T>() {
            Some(value) => {
                if input.replace_default(value.clone()) {
                    self.invalidate();
                }
                Ok(())
            }
            None => Err(GraphError::TypeMismatch {
                expected: ValueType::of::<T>().name(),
                found: default.value_type().name(),
                source_slot: self.inner.id,
                target_slot: self.inner.id,
            }),
        }
    }

    fn as_any_ref(&self) -> &dyn Any {
        self
    }
}
