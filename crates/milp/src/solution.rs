use crate::model::VarId;

/// How a backend finished.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SolveStatus {
    /// The search tree was exhausted; the objective is a proven optimum.
    Optimal,
    /// Stopped early because the incumbent is within the configured
    /// relative gap of the best bound.
    GapLimit,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MilpSolution {
    pub status: SolveStatus,
    pub objective: f64,
    /// Best proven bound on the objective. Equal to `objective` when optimal.
    pub best_bound: f64,
    /// Explored branch-and-bound nodes, the root included.
    pub nodes: usize,
    values: Vec<f64>,
}

impl MilpSolution {
    pub fn new(
        status: SolveStatus,
        objective: f64,
        best_bound: f64,
        nodes: usize,
        values: Vec<f64>,
    ) -> Self {
        Self {
            status,
            objective,
            best_bound,
            nodes,
            values,
        }
    }

    pub fn value(&self, var: VarId) -> f64 {
        self.values[var.index()]
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }

    /// Relative distance between the objective and the best bound.
    pub fn gap(&self) -> f64 {
        relative_gap(self.objective, self.best_bound)
    }
}

pub(crate) fn relative_gap(incumbent: f64, bound: f64) -> f64 {
    (incumbent - bound).abs() / incumbent.abs().max(1.0)
}
