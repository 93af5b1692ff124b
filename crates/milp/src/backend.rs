use std::time::Duration;

use crate::{
    MilpResult,
    model::{Constraint, Model},
    solution::MilpSolution,
};

/// Anything able to solve a [`Model`] to proven optimality.
pub trait MilpBackend {
    fn name(&self) -> &'static str;

    /// Solves `model`, using whatever `context` offers that the backend
    /// understands. Ignoring the context must not change the optimum.
    fn solve_with(&self, model: &Model, context: &SolveContext<'_>) -> MilpResult<MilpSolution>;

    fn solve(&self, model: &Model) -> MilpResult<MilpSolution> {
        self.solve_with(model, &SolveContext::new())
    }
}

impl<B: MilpBackend + ?Sized> MilpBackend for &B {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn solve_with(&self, model: &Model, context: &SolveContext<'_>) -> MilpResult<MilpSolution> {
        (**self).solve_with(model, context)
    }
}

/// Problem-specific separation of valid inequalities.
///
/// Returned rows must hold for every feasible solution of the model; the
/// model rows alone still decide feasibility.
pub trait CutGenerator {
    /// Rows violated by the relaxation `values` (indexed like the model
    /// variables). An empty vector ends separation for this node.
    fn separate(&self, values: &[f64]) -> Vec<Constraint>;
}

/// Optional help handed to a backend for one solve.
#[derive(Clone, Copy, Default)]
pub struct SolveContext<'a> {
    start: Option<&'a [f64]>,
    cuts: Option<&'a dyn CutGenerator>,
}

impl<'a> SolveContext<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A feasible assignment used as the first incumbent.
    pub fn with_start(mut self, values: &'a [f64]) -> Self {
        self.start = Some(values);
        self
    }

    pub fn with_cuts(mut self, cuts: &'a dyn CutGenerator) -> Self {
        self.cuts = Some(cuts);
        self
    }

    pub fn start(&self) -> Option<&'a [f64]> {
        self.start
    }

    pub fn cuts(&self) -> Option<&'a dyn CutGenerator> {
        self.cuts
    }
}

/// Resource budget for one solve. `None` means unlimited.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolveLimits {
    pub time_limit: Option<Duration>,
    pub node_limit: Option<usize>,
    /// Stop once `|incumbent - bound| / max(1, |incumbent|)` falls to this value.
    pub relative_gap: f64,
}

impl SolveLimits {
    pub const fn unlimited() -> Self {
        Self {
            time_limit: None,
            node_limit: None,
            relative_gap: 0.0,
        }
    }

    pub fn with_time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit = Some(time_limit);
        self
    }

    pub fn with_node_limit(mut self, node_limit: usize) -> Self {
        self.node_limit = Some(node_limit);
        self
    }

    pub fn with_relative_gap(mut self, relative_gap: f64) -> Self {
        self.relative_gap = relative_gap;
        self
    }
}

impl Default for SolveLimits {
    fn default() -> Self {
        Self::unlimited()
    }
}
