use std::{
    cmp::Ordering,
    collections::{BTreeMap, BinaryHeap},
    time::Instant,
};

use minilp::{ComparisonOp, OptimizationDirection};

use crate::{
    MilpError, MilpResult,
    backend::{CutGenerator, MilpBackend, SolveContext, SolveLimits},
    model::{Comparison, Constraint, Model, Sense},
    solution::{MilpSolution, SolveStatus, relative_gap},
};

const INTEGRALITY_TOLERANCE: f64 = 1e-6;
const FEASIBILITY_TOLERANCE: f64 = 1e-6;
const PRUNE_TOLERANCE: f64 = 1e-9;
const MAX_CUT_ROUNDS: usize = 200;

/// Exact LP-based branch and bound over `minilp` relaxations.
///
/// Open nodes are explored best bound first (deeper nodes win ties), branching
/// on the most fractional integral variable. Each node is tightened with the
/// rows of the context's [`CutGenerator`] before branching, and a feasible
/// start from the context seeds the incumbent. A node is pruned when its
/// relaxation bound cannot beat the incumbent. Optimality is proven when no
/// open node is left.
#[derive(Clone, Debug)]
pub struct BranchAndBound {
    limits: SolveLimits,
}

struct Node {
    /// Relaxation objective in minimization form.
    bound: f64,
    depth: usize,
    lp: minilp::Solution,
}

// `BinaryHeap` pops the greatest node: lowest bound, then deepest.
impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .bound
            .total_cmp(&self.bound)
            .then(self.depth.cmp(&other.depth))
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Node {}

struct Incumbent {
    key: f64,
    values: Vec<f64>,
}

/// Per-solve state shared by the node loop.
struct Search<'m> {
    model: &'m Model,
    lp_vars: Vec<minilp::Variable>,
    integral: Vec<usize>,
    sign: f64,
    incumbent: Option<Incumbent>,
    cuts_added: usize,
}

impl BranchAndBound {
    pub fn new(limits: SolveLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &SolveLimits {
        &self.limits
    }

    fn exceeded(&self, started: Instant, nodes: usize) -> Option<&'static str> {
        if let Some(node_limit) = self.limits.node_limit
            && nodes >= node_limit
        {
            return Some("node");
        }
        if let Some(time_limit) = self.limits.time_limit
            && started.elapsed() >= time_limit
        {
            return Some("time");
        }
        None
    }
}

impl Default for BranchAndBound {
    fn default() -> Self {
        Self::new(SolveLimits::unlimited())
    }
}

impl MilpBackend for BranchAndBound {
    fn name(&self) -> &'static str {
        "branch-and-bound/minilp"
    }

    fn solve_with(&self, model: &Model, context: &SolveContext<'_>) -> MilpResult<MilpSolution> {
        model.validate()?;
        let started = Instant::now();

        let (problem, lp_vars) = relaxation(model);
        let mut search = Search {
            model,
            lp_vars,
            integral: model
                .variables()
                .iter()
                .enumerate()
                .filter(|(_, v)| v.kind.is_integral())
                .map(|(idx, _)| idx)
                .collect(),
            sign: match model.sense() {
                Sense::Minimize => 1.0,
                Sense::Maximize => -1.0,
            },
            incumbent: None,
            cuts_added: 0,
        };

        let root = problem.solve()?;
        let root_bound = search.bound_of(&root)?;
        log::debug!(
            "bnb.root: model={} vars={} integral={} rows={} lp_objective={:.6}",
            model.name,
            model.num_vars(),
            search.integral.len(),
            model.num_constraints(),
            root.objective()
        );

        if let Some(start) = context.start() {
            search.seed(start);
        }

        let mut open = BinaryHeap::new();
        open.push(Node {
            bound: root_bound,
            depth: 0,
            lp: root,
        });
        let mut nodes = 0;

        while let Some(node) = open.pop() {
            if let Some(limit) = self.exceeded(started, nodes) {
                let bound = open.iter().map(|n| n.bound).fold(node.bound, f64::min);
                return Err(MilpError::LimitReached {
                    limit,
                    nodes,
                    best: search.incumbent.as_ref().map(|inc| search.sign * inc.key),
                    bound: search.sign * bound,
                });
            }
            nodes += 1;

            if search.is_pruned(node.bound) {
                continue;
            }
            let node = match context.cuts() {
                Some(cuts) => match search.tighten(node, cuts)? {
                    Some(node) => node,
                    None => continue,
                },
                None => node,
            };

            match search.branching_candidate(&node.lp) {
                None => search.offer(&node.lp, nodes),
                Some((idx, value)) => {
                    let depth = node.depth + 1;
                    for child in search.children(node, idx, value) {
                        match child {
                            Ok(lp) => {
                                let bound = search.bound_of(&lp)?;
                                if !search.is_pruned(bound) {
                                    open.push(Node { bound, depth, lp });
                                }
                            }
                            Err(minilp::Error::Infeasible) => {}
                            Err(err) => return Err(err.into()),
                        }
                    }
                }
            }

            if self.limits.relative_gap > 0.0
                && let Some(inc) = &search.incumbent
            {
                let bound = open.iter().map(|n| n.bound).fold(inc.key, f64::min);
                if relative_gap(inc.key, bound) <= self.limits.relative_gap {
                    log::debug!(
                        "bnb.gap: model={} nodes={nodes} objective={:.6} bound={:.6}",
                        model.name,
                        search.sign * inc.key,
                        search.sign * bound
                    );
                    return Ok(MilpSolution::new(
                        SolveStatus::GapLimit,
                        search.sign * inc.key,
                        search.sign * bound,
                        nodes,
                        inc.values.clone(),
                    ));
                }
            }
        }

        let sign = search.sign;
        let cuts_added = search.cuts_added;
        let Some(inc) = search.incumbent else {
            return Err(MilpError::Infeasible);
        };

        log::debug!(
            "bnb.done: model={} nodes={nodes} cuts={cuts_added} objective={:.6} elapsed={:.3}s",
            model.name,
            sign * inc.key,
            started.elapsed().as_secs_f64()
        );

        Ok(MilpSolution::new(
            SolveStatus::Optimal,
            sign * inc.key,
            sign * inc.key,
            nodes,
            inc.values,
        ))
    }
}

impl Search<'_> {
    /// Relaxation objective in minimization form; an unbounded relaxation
    /// comes back from `minilp` as an infinite objective.
    fn bound_of(&self, lp: &minilp::Solution) -> MilpResult<f64> {
        let objective = lp.objective();
        if objective.is_finite() {
            Ok(self.sign * objective)
        } else {
            Err(MilpError::Unbounded)
        }
    }

    fn is_pruned(&self, bound: f64) -> bool {
        self.incumbent
            .as_ref()
            .is_some_and(|inc| !improves(bound, inc.key))
    }

    fn seed(&mut self, start: &[f64]) {
        if !self.model.is_feasible(start, FEASIBILITY_TOLERANCE) {
            log::warn!("bnb.start: model={} start is infeasible, ignored", self.model.name);
            return;
        }
        let key = self.sign * self.model.objective().evaluate(start);
        log::debug!("bnb.start: model={} objective={:.6}", self.model.name, self.sign * key);
        self.incumbent = Some(Incumbent {
            key,
            values: start.to_vec(),
        });
    }

    /// Keeps an integral relaxation when it beats the incumbent.
    fn offer(&mut self, lp: &minilp::Solution, nodes: usize) {
        let values = self.snapped_values(lp);
        let key = self.sign * self.model.objective().evaluate(&values);
        if self.incumbent.as_ref().is_none_or(|inc| improves(key, inc.key)) {
            log::trace!("bnb.incumbent: node={nodes} objective={:.6}", self.sign * key);
            self.incumbent = Some(Incumbent { key, values });
        }
    }

    /// Adds separated rows until none is violated. `None` when the node
    /// became infeasible or can no longer beat the incumbent.
    fn tighten(&mut self, mut node: Node, cuts: &dyn CutGenerator) -> MilpResult<Option<Node>> {
        for _ in 0..MAX_CUT_ROUNDS {
            let values: Vec<f64> = self.lp_vars.iter().map(|var| node.lp[*var]).collect();
            let violated: Vec<Constraint> = cuts
                .separate(&values)
                .into_iter()
                .filter(|row| !row.is_satisfied(&values, FEASIBILITY_TOLERANCE))
                .collect();
            if violated.is_empty() {
                break;
            }

            for row in &violated {
                let (expr, op) = lp_row(row, &self.lp_vars);
                node.lp = match node.lp.add_constraint(expr, op, row.rhs) {
                    Ok(lp) => lp,
                    Err(minilp::Error::Infeasible) => return Ok(None),
                    Err(err) => return Err(err.into()),
                };
            }
            self.cuts_added += violated.len();

            node.bound = self.bound_of(&node.lp)?;
            if self.is_pruned(node.bound) {
                return Ok(None);
            }
        }
        Ok(Some(node))
    }

    /// Index (into the model variables) and value of the most fractional
    /// integral variable, or `None` when the relaxation is integral.
    fn branching_candidate(&self, lp: &minilp::Solution) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64, f64)> = None;
        for &idx in &self.integral {
            let value = lp[self.lp_vars[idx]];
            let fractionality = (value - value.round()).abs();
            if fractionality <= INTEGRALITY_TOLERANCE {
                continue;
            }
            if best.is_none_or(|(_, _, f)| fractionality > f) {
                best = Some((idx, value, fractionality));
            }
        }
        best.map(|(idx, value, _)| (idx, value))
    }

    fn children(
        &self,
        node: Node,
        idx: usize,
        value: f64,
    ) -> [Result<minilp::Solution, minilp::Error>; 2] {
        let var = self.lp_vars[idx];
        let floor = value.floor();
        let down = node
            .lp
            .clone()
            .add_constraint(single_term(var), ComparisonOp::Le, floor);
        let up = node
            .lp
            .add_constraint(single_term(var), ComparisonOp::Ge, floor + 1.0);
        [down, up]
    }

    fn snapped_values(&self, lp: &minilp::Solution) -> Vec<f64> {
        self.model
            .variables()
            .iter()
            .zip(&self.lp_vars)
            .map(|(var, lp_var)| {
                let value = lp[*lp_var];
                if var.kind.is_integral() {
                    value.round()
                } else {
                    value
                }
            })
            .collect()
    }
}

fn improves(bound: f64, incumbent_key: f64) -> bool {
    bound < incumbent_key - PRUNE_TOLERANCE * incumbent_key.abs().max(1.0)
}

fn relaxation(model: &Model) -> (minilp::Problem, Vec<minilp::Variable>) {
    let direction = match model.sense() {
        Sense::Minimize => OptimizationDirection::Minimize,
        Sense::Maximize => OptimizationDirection::Maximize,
    };
    let mut problem = minilp::Problem::new(direction);

    let mut objective = vec![0.0; model.num_vars()];
    for (var, coeff) in model.objective().terms() {
        objective[var.index()] += coeff;
    }

    let lp_vars: Vec<minilp::Variable> = model
        .variables()
        .iter()
        .zip(objective)
        .map(|(var, coeff)| problem.add_var(coeff, (var.lower, var.upper)))
        .collect();

    for constraint in model.constraints() {
        let (expr, op) = lp_row(constraint, &lp_vars);
        problem.add_constraint(expr, op, constraint.rhs);
    }

    (problem, lp_vars)
}

fn lp_row(
    constraint: &Constraint,
    lp_vars: &[minilp::Variable],
) -> (minilp::LinearExpr, ComparisonOp) {
    // minilp expects each variable at most once per row.
    let mut merged: BTreeMap<usize, f64> = BTreeMap::new();
    for (var, coeff) in constraint.expr.terms() {
        *merged.entry(var.index()).or_insert(0.0) += coeff;
    }

    let mut expr = minilp::LinearExpr::empty();
    for (idx, coeff) in merged {
        expr.add(lp_vars[idx], coeff);
    }

    let op = match constraint.op {
        Comparison::Eq => ComparisonOp::Eq,
        Comparison::Le => ComparisonOp::Le,
        Comparison::Ge => ComparisonOp::Ge,
    };
    (expr, op)
}

fn single_term(var: minilp::Variable) -> minilp::LinearExpr {
    let mut expr = minilp::LinearExpr::empty();
    expr.add(var, 1.0);
    expr
}
