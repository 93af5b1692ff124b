use milp::{
    backend::CutGenerator,
    model::{Comparison, Constraint, LinearExpr},
};

use crate::solver::MtzVars;

/// Relaxation values below this do not connect two nodes.
const SUPPORT_EPS: f64 = 1e-9;
const CUT_VIOLATION_EPS: f64 = 1e-6;

/// Separates subtour elimination rows `sum(x[i,j] : i in S, j not in S) >= 1`.
///
/// Disconnected supports yield one row per component. Connected supports
/// are checked with a global minimum cut of the symmetric flow
/// `x[i,j] + x[j,i]`; a cut lighter than 2 is a violated row.
pub(crate) struct SubtourCuts<'v> {
    vars: &'v MtzVars,
}

impl<'v> SubtourCuts<'v> {
    pub(crate) fn new(vars: &'v MtzVars) -> Self {
        Self { vars }
    }

    fn leaving(&self, inside: &[bool]) -> Constraint {
        let expr: LinearExpr = self
            .vars
            .arcs()
            .filter(|&(i, j, _)| inside[i] && !inside[j])
            .map(|(_, _, var)| (var, 1.0))
            .collect();
        let size = inside.iter().filter(|&&member| member).count();
        Constraint {
            name: format!("sec_{size}"),
            expr,
            op: Comparison::Ge,
            rhs: 1.0,
        }
    }
}

impl CutGenerator for SubtourCuts<'_> {
    fn separate(&self, values: &[f64]) -> Vec<Constraint> {
        let n = self.vars.n();
        if n < 3 {
            return Vec::new();
        }

        let mut weights = vec![0.0; n * n];
        for (i, j, var) in self.vars.arcs() {
            let value = values[var.index()];
            weights[i * n + j] += value;
            weights[j * n + i] += value;
        }

        let components = components(n, &weights);
        if components.len() > 1 {
            return components
                .iter()
                .map(|component| {
                    let mut inside = vec![false; n];
                    for &node in component {
                        inside[node] = true;
                    }
                    self.leaving(&inside)
                })
                .collect();
        }

        let (weight, inside) = min_cut(n, &mut weights);
        if weight < 2.0 - CUT_VIOLATION_EPS {
            vec![self.leaving(&inside)]
        } else {
            Vec::new()
        }
    }
}

/// Connected components of the graph whose edges have weight above
/// `SUPPORT_EPS`.
fn components(n: usize, weights: &[f64]) -> Vec<Vec<usize>> {
    let mut seen = vec![false; n];
    let mut out = Vec::new();
    for start in 0..n {
        if seen[start] {
            continue;
        }
        seen[start] = true;
        let mut component = vec![start];
        let mut next = 0;
        while let Some(&node) = component.get(next) {
            next += 1;
            for other in 0..n {
                if !seen[other] && weights[node * n + other] > SUPPORT_EPS {
                    seen[other] = true;
                    component.push(other);
                }
            }
        }
        out.push(component);
    }
    out
}

/// Stoer-Wagner global minimum cut of an undirected graph given as a
/// row-major symmetric `n x n` matrix, which is contracted in place.
/// Returns the cut weight and, per node, whether it lies on the cut side.
/// `n` must be at least 2.
fn min_cut(n: usize, weights: &mut [f64]) -> (f64, Vec<bool>) {
    let mut active: Vec<usize> = (0..n).collect();
    let mut members: Vec<Vec<usize>> = (0..n).map(|v| vec![v]).collect();
    let mut best_weight = f64::INFINITY;
    let mut best_side = vec![false; n];

    while active.len() > 1 {
        let mut added = vec![false; n];
        let mut attached = vec![0.0; n];
        let mut prev = active[0];
        let mut last = active[0];
        added[last] = true;
        for &v in &active {
            attached[v] = weights[last * n + v];
        }

        // Maximum adjacency order: repeatedly add the most attached node.
        for _ in 1..active.len() {
            let Some(next) = active
                .iter()
                .copied()
                .filter(|&v| !added[v])
                .max_by(|&a, &b| attached[a].total_cmp(&attached[b]))
            else {
                break;
            };
            prev = last;
            last = next;
            added[next] = true;
            for &v in &active {
                if !added[v] {
                    attached[v] += weights[next * n + v];
                }
            }
        }

        // Cut of the phase: `last` against everything else.
        if attached[last] < best_weight {
            best_weight = attached[last];
            best_side = vec![false; n];
            for &member in &members[last] {
                best_side[member] = true;
            }
        }

        let moved = std::mem::take(&mut members[last]);
        members[prev].extend(moved);
        for &v in &active {
            weights[prev * n + v] += weights[last * n + v];
            weights[v * n + prev] = weights[prev * n + v];
        }
        weights[prev * n + prev] = 0.0;
        active.retain(|&v| v != last);
    }

    (best_weight, best_side)
}
