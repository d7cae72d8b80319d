use crate::core::error::{GraphError, Result};
use crate::core::telemetry::{Telemetry, TraceEntry};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_PASS: AtomicU64 = AtomicU64::new(1);

/// Recursion limit applied when a context is not configured otherwise.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Identifies one evaluation request.
///
/// Versions come from a process-wide counter so two contexts never hand out
/// the same version. They are only compared for equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PassVersion(u64);

impl PassVersion {
    pub fn fresh() -> Self {
        PassVersion(NEXT_PASS.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Ambient state threaded through every pull of one evaluation pass.
pub struct EvaluationContext {
    pub time: f64,
    pub local_time: f64,
    pub local_fx_time: f64,
    pass_version: PassVersion,
    max_depth: usize,
    depth: Cell<usize>,
    telemetry: Option<Rc<dyn Telemetry>>,
}

impl Default for EvaluationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EvaluationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationContext")
            .field("time", &self.time)
            .field("local_time", &self.local_time)
            .field("local_fx_time", &self.local_fx_time)
            .field("pass_version", &self.pass_version)
            .field("max_depth", &self.max_depth)
            .field("depth", &self.depth.get())
            .field("telemetry", &self.telemetry.is_some())
            .finish()
    }
}

impl EvaluationContext {
    /// Creates a context at time zero with a fresh pass version.
    pub fn new() -> Self {
        EvaluationContext {
            time: 0.0,
            local_time: 0.0,
            local_fx_time: 0.0,
            pass_version: PassVersion::fresh(),
            max_depth: DEFAULT_MAX_DEPTH,
            depth: Cell::new(0),
            telemetry: None,
        }
    }

    /// Sets global, local and fx time alike.
    pub fn with_time(mut self, time: f64) -> Self {
        self.time = time;
        self.local_time = time;
        self.local_fx_time = time;
        self
    }

    pub fn with_local_time(mut self, local_time: f64) -> Self {
        self.local_time = local_time;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Rc<dyn Telemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn pass_version(&self) -> PassVersion {
        self.pass_version
    }

    /// Starts a new pass, keeping the current times.
    pub fn next_pass(&mut self) -> PassVersion {
        self.pass_version = PassVersion::fresh();
        self.depth.set(0);
        self.pass_version
    }

    /// Starts a new pass at `time`.
    pub fn advance(&mut self, time: f64) -> PassVersion {
        self.time = time;
        self.local_time = time;
        self.local_fx_time = time;
        self.next_pass()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Current pull nesting depth.
    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    pub fn telemetry(&self) -> Option<&Rc<dyn Telemetry>> {
        self.telemetry.as_ref()
    }

    pub(crate) fn record(&self, entry: TraceEntry) {
        if let Some(t) = &self.telemetry {
            t.record(entry);
        }
    }

    /// Enters one level of recursive evaluation.
    pub(crate) fn enter(&self) -> Result<DepthGuard<'_>> {
        let depth = self.depth.get() + 1;
        if depth > self.max_depth {
            log::error!(
                "evaluation exceeded maximum depth {} in pass {}",
                self.max_depth,
                self.pass_version.get()
            );
            return Err(GraphError::CyclicDependency(format!(
                "evaluation exceeded maximum depth of {}",
                self.max_depth
            )));
        }
        self.depth.set(depth);
        Ok(DepthGuard { depth: &self.depth })
    }
}

/// Leaves the evaluation level on drop, including on early error returns.
pub(crate) struct DepthGuard<'a> {
    depth: &'a Cell<usize>,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_versions_are_distinct_across_contexts() {
        let a = EvaluationContext::new();
        let b = EvaluationContext::new();
        assert_ne!(a.pass_version(), b.pass_version());
    }

    #[test]
    fn test_next_pass_changes_version() {
        let mut ctx = EvaluationContext::new().with_time(2.5);
        let first = ctx.pass_version();
        let second = ctx.next_pass();
        assert_ne!(first, second);
        assert_eq!(ctx.pass_version(), second);
        assert_eq!(ctx.time, 2.5);

        ctx.advance(4.0);
        assert_eq!(ctx.time, 4.0);
        assert_eq!(ctx.local_fx_time, 4.0);
        assert_ne!(ctx.pass_version(), second);
    }

    #[test]
    fn test_depth_guard_unwinds() {
        let ctx = EvaluationContext::new().with_max_depth(2);
        {
            let _a = ctx.enter().unwrap();
            let _b = ctx.enter().unwrap();
            assert_eq!(ctx.depth(), 2);
            assert!(matches!(ctx.enter(), Err(GraphError::CyclicDependency(_))));
        }
        assert_eq!(ctx.depth(), 0);
    }
}
