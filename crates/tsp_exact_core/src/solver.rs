use std::path::{Path, PathBuf};

use milp::{
    backend::{MilpBackend, SolveContext},
    branch_bound::BranchAndBound,
    model::{Comparison, LinearExpr, Model, VarId},
    solution::SolveStatus,
};

use crate::{DistanceMatrix, Error, Result, Tour, subtour::SubtourCuts};

const SELECTED_EDGE_THRESHOLD: f64 = 0.5;

/// Variable handles of one MTZ model.
#[derive(Clone, Debug)]
pub struct MtzVars {
    n: usize,
    /// Row-major `n x n`; `None` on the diagonal.
    x: Vec<Option<VarId>>,
    u: Vec<VarId>,
}

impl MtzVars {
    pub fn n(&self) -> usize {
        self.n
    }

    pub fn x(&self, i: usize, j: usize) -> Option<VarId> {
        self.x[i * self.n + j]
    }

    pub fn u(&self, i: usize) -> VarId {
        self.u[i]
    }

    /// Every `(i, j, x[i,j])` with `i != j`.
    pub fn arcs(&self) -> impl Iterator<Item = (usize, usize, VarId)> + '_ {
        self.x
            .iter()
            .enumerate()
            .filter_map(|(idx, var)| var.map(|var| (idx / self.n, idx % self.n, var)))
    }

    /// Model assignment encoding `tour`: its arcs set to 1 and each order
    /// variable set to the node's 1-based position.
    pub fn assignment(&self, num_vars: usize, tour: &Tour) -> Vec<f64> {
        let mut values = vec![0.0; num_vars];
        for (i, j) in tour.edges() {
            if let Some(var) = self.x(i, j) {
                values[var.index()] = 1.0;
            }
        }
        for (position, &node) in tour.order().iter().enumerate() {
            values[self.u(node).index()] = (position + 1) as f64;
        }
        values
    }
}

/// Builds the assignment model with Miller-Tucker-Zemlin subtour elimination.
pub fn build_mtz_model(matrix: &DistanceMatrix, name: &str) -> (Model, MtzVars) {
    let n = matrix.n();
    let big_m = n as f64;
    let mut model = Model::new(name);

    let mut x = vec![None; n * n];
    for i in 0..n {
        for j in 0..n {
            if i != j {
                x[i * n + j] = Some(model.add_binary(format!("x_{i}_{j}")));
            }
        }
    }
    let u: Vec<VarId> = (0..n)
        .map(|i| model.add_continuous(format!("u_{i}"), 1.0, big_m))
        .collect();
    let vars = MtzVars { n, x, u };

    for i in 0..n {
        let outgoing = (0..n).filter_map(|j| vars.x(i, j)).map(|var| (var, 1.0)).collect();
        model.add_constraint(format!("out_{i}"), outgoing, Comparison::Eq, 1.0);
    }
    for j in 0..n {
        let incoming = (0..n).filter_map(|i| vars.x(i, j)).map(|var| (var, 1.0)).collect();
        model.add_constraint(format!("in_{j}"), incoming, Comparison::Eq, 1.0);
    }

    for (i, j, x_ij) in vars.arcs().filter(|&(i, j, _)| i != 0 && j != 0) {
        let row = LinearExpr::new()
            .with_term(vars.u(i), 1.0)
            .with_term(vars.u(j), -1.0)
            .with_term(x_ij, big_m);
        model.add_constraint(format!("mtz_{i}_{j}"), row, Comparison::Le, big_m - 1.0);
    }

    model.minimize(
        vars.arcs()
            .map(|(i, j, var)| (var, matrix.get(i, j)))
            .collect(),
    );

    (model, vars)
}

/// Optimal tour of one instance.
#[derive(Clone, Debug, PartialEq)]
pub struct TspSolution {
    /// Objective value reported by the backend.
    pub cost: f64,
    pub tour: Tour,
    /// Selected directed edges in tour order.
    pub edges: Vec<(usize, usize)>,
    pub status: SolveStatus,
    /// Explored branch-and-bound nodes.
    pub nodes: usize,
}

/// Exact solver: one fresh MTZ model per call, handed to `backend`.
#[derive(Clone, Debug, Default)]
pub struct TspSolver<B = BranchAndBound> {
    backend: B,
    lp_dump_dir: Option<PathBuf>,
}

impl TspSolver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<B: MilpBackend> TspSolver<B> {
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend,
            lp_dump_dir: None,
        }
    }

    /// Writes every model to `<dir>/<name>.lp` before solving it.
    pub fn with_lp_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.lp_dump_dir = Some(dir.into());
        self
    }

    pub fn solve(&self, matrix: DistanceMatrix) -> Result<TspSolution> {
        self.solve_named(matrix, "tsp")
    }

    pub fn solve_named(&self, matrix: DistanceMatrix, name: &str) -> Result<TspSolution> {
        let n = matrix.n();
        if n < 2 {
            return Err(Error::invalid_input(format!(
                "cannot solve an instance with {n} node(s), at least 2 are required"
            )));
        }

        let (model, vars) = build_mtz_model(&matrix, name);
        log::debug!(
            "solver.model: name={name} n={n} vars={} binaries={} rows={} backend={}",
            model.num_vars(),
            model.num_integral(),
            model.num_constraints(),
            self.backend.name()
        );
        if let Some(dir) = &self.lp_dump_dir {
            write_model(dir, name, &model)?;
        }

        let mut start = Tour::nearest_neighbor(&matrix);
        let greedy = start.length(&matrix);
        let moves = start.two_opt(&matrix);
        log::debug!(
            "solver.start: name={name} greedy={greedy:.3} two_opt={:.3} moves={moves}",
            start.length(&matrix)
        );
        let start = vars.assignment(model.num_vars(), &start);
        let cuts = SubtourCuts::new(&vars);
        let context = SolveContext::new().with_start(&start).with_cuts(&cuts);

        let solution = self.backend.solve_with(&model, &context)?;

        let selected: Vec<(usize, usize)> = vars
            .arcs()
            .filter(|&(_, _, var)| solution.value(var) > SELECTED_EDGE_THRESHOLD)
            .map(|(i, j, _)| (i, j))
            .collect();
        let tour = Tour::from_edges(n, &selected)?;
        let metrics = tour.metrics(&matrix);
        if (metrics.total - solution.objective).abs() > 1e-6 * solution.objective.abs().max(1.0) {
            log::warn!(
                "solver.mismatch: name={name} objective={:.6} tour_length={:.6}",
                solution.objective,
                metrics.total
            );
        }

        log::debug!(
            "solver.done: name={name} cost={:.3} status={:?} nodes={} gap={:.2e}",
            solution.objective,
            solution.status,
            solution.nodes,
            solution.gap()
        );

        Ok(TspSolution {
            cost: solution.objective,
            edges: tour.edges().collect(),
            tour,
            status: solution.status,
            nodes: solution.nodes,
        })
    }
}

/// Cost of an optimal tour over `matrix` with the default exact backend.
pub fn solve(matrix: DistanceMatrix) -> Result<f64> {
    TspSolver::new().solve(matrix).map(|solution| solution.cost)
}

fn write_model(dir: &Path, name: &str, model: &Model) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let file_name: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let path = dir.join(format!("{file_name}.lp"));
    std::fs::write(&path, model.to_string())?;
    log::debug!("solver.lp: name={name} path={}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        path::PathBuf,
        time::{Duration, SystemTime, UNIX_EPOCH},
    };

    use milp::{
        MilpError,
        backend::SolveLimits,
        branch_bound::BranchAndBound,
        solution::SolveStatus,
    };

    use super::{TspSolver, build_mtz_model, solve};
    use crate::{DistanceMatrix, Error, Point, Tour};

    fn unique_temp_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after epoch")
            .as_nanos();
        std::env::temp_dir().join(format!("tsp-exact-tests-{name}-{nanos}"))
    }

    fn pseudo_random_points(n: usize, seed: u64) -> Vec<Point> {
        let mut state = seed;
        let mut next = || {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            ((state >> 33) % 100) as f64
        };
        (0..n).map(|_| Point::new(next(), next())).collect()
    }

    fn triangle() -> DistanceMatrix {
        DistanceMatrix::from_points(&[
            Point::new(0.0, 0.0),
            Point::new(0.0, 3.0),
            Point::new(4.0, 0.0),
        ])
    }

    /// Shortest tour by enumerating every permutation of nodes `1..n`.
    fn brute_force(matrix: &DistanceMatrix) -> f64 {
        fn search(
            matrix: &DistanceMatrix,
            order: &mut Vec<usize>,
            used: &mut [bool],
            best: &mut f64,
        ) {
            if order.len() == used.len() {
                *best = best.min(matrix.cycle_length(order));
                return;
            }
            for next in 1..used.len() {
                if !used[next] {
                    used[next] = true;
                    order.push(next);
                    search(matrix, order, used, best);
                    order.pop();
                    used[next] = false;
                }
            }
        }

        let mut used = vec![false; matrix.n()];
        used[0] = true;
        let mut best = f64::INFINITY;
        search(matrix, &mut vec![0], &mut used, &mut best);
        best
    }

    /// Held-Karp dynamic program over subsets of nodes `1..n`.
    fn held_karp(matrix: &DistanceMatrix) -> f64 {
        let n = matrix.n();
        let rest = n - 1;
        let full = 1usize << rest;
        // best[mask * rest + last]: shortest path 0 -> ... -> last+1 visiting `mask`.
        let mut best = vec![f64::INFINITY; full * rest];
        for last in 0..rest {
            best[(1 << last) * rest + last] = matrix.get(0, last + 1);
        }
        for mask in 1..full {
            for last in 0..rest {
                let here = best[mask * rest + last];
                if mask & (1 << last) == 0 || !here.is_finite() {
                    continue;
                }
                for next in 0..rest {
                    if mask & (1 << next) != 0 {
                        continue;
                    }
                    let slot = &mut best[(mask | (1 << next)) * rest + next];
                    *slot = slot.min(here + matrix.get(last + 1, next + 1));
                }
            }
        }
        (0..rest)
            .map(|last| best[(full - 1) * rest + last] + matrix.get(last + 1, 0))
            .fold(f64::INFINITY, f64::min)
    }

    #[test]
    fn model_has_expected_shape() {
        let (model, vars) = build_mtz_model(&triangle(), "tri");
        // 6 arcs + 3 order variables; 3 out + 3 in + 2 MTZ rows.
        assert_eq!(model.num_vars(), 9);
        assert_eq!(model.num_integral(), 6);
        assert_eq!(model.num_constraints(), 8);
        assert!(vars.x(1, 1).is_none());
        assert_eq!(vars.arcs().count(), 6);
        assert!(model.validate().is_ok());
    }

    #[test]
    fn triangle_costs_its_perimeter() {
        let solution = TspSolver::new().solve(triangle()).expect("solve triangle");
        assert!((solution.cost - 12.0).abs() < 1e-6);
        assert_eq!(solution.status, SolveStatus::Optimal);
        assert_eq!(solution.tour.order()[0], 0);
        assert_eq!(solution.edges.len(), 3);
    }

    #[test]
    fn two_nodes_cost_twice_their_distance() {
        let matrix = DistanceMatrix::from_points(&[Point::new(1.0, 1.0), Point::new(4.0, 5.0)]);
        let solution = TspSolver::new().solve(matrix).expect("solve pair");
        assert!((solution.cost - 10.0).abs() < 1e-6);
        assert_eq!(solution.edges, vec![(0, 1), (1, 0)]);
    }

    #[test]
    fn fewer_than_two_nodes_is_invalid_input() {
        let err = solve(DistanceMatrix::from_points(&[Point::new(0.0, 0.0)])).expect_err("one node");
        assert!(matches!(err, Error::InvalidInput(_)));
        let err = solve(DistanceMatrix::from_points(&[])).expect_err("no nodes");
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn unit_square_tour_is_its_perimeter() {
        let matrix = DistanceMatrix::from_points(&[
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(1.0, 0.0),
            Point::new(0.0, 1.0),
        ]);
        let cost = solve(matrix).expect("solve square");
        assert!((cost - 4.0).abs() < 1e-6);
    }

    #[test]
    fn repeated_solves_agree() {
        let matrix = DistanceMatrix::from_points(&pseudo_random_points(5, 11));
        let first = solve(matrix.clone()).expect("first solve");
        let second = solve(matrix).expect("second solve");
        assert_eq!(first, second);
    }

    #[test]
    fn matches_brute_force_on_small_instances() {
        for (n, seed) in [(4, 1), (5, 2), (5, 3), (6, 4), (6, 5)] {
            let matrix = DistanceMatrix::from_points(&pseudo_random_points(n, seed));
            let expected = brute_force(&matrix);
            let solution = TspSolver::new().solve(matrix.clone()).expect("solve");
            assert!(
                (solution.cost - expected).abs() < 1e-6,
                "n={n} seed={seed}: milp={} brute={expected}",
                solution.cost
            );
            assert!((solution.tour.length(&matrix) - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn sixteen_nodes_are_solved_exactly_within_two_minutes() {
        let backend =
            BranchAndBound::new(SolveLimits::unlimited().with_time_limit(Duration::from_secs(120)));
        let solver = TspSolver::with_backend(backend);
        for seed in [16, 61] {
            let matrix = DistanceMatrix::from_points(&pseudo_random_points(16, seed));
            let expected = held_karp(&matrix);
            let solution = solver
                .solve_named(matrix.clone(), "random16")
                .expect("solve within the time limit");
            assert_eq!(solution.status, SolveStatus::Optimal);
            assert!(
                (solution.cost - expected).abs() < 1e-6,
                "seed={seed}: milp={} held_karp={expected}",
                solution.cost
            );
            assert!((solution.tour.length(&matrix) - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn held_karp_agrees_with_brute_force() {
        let matrix = DistanceMatrix::from_points(&pseudo_random_points(7, 3));
        assert!((held_karp(&matrix) - brute_force(&matrix)).abs() < 1e-9);
    }

    #[test]
    fn heuristic_start_encodes_a_feasible_assignment() {
        let matrix = DistanceMatrix::from_points(&pseudo_random_points(8, 5));
        let (model, vars) = build_mtz_model(&matrix, "start8");
        let mut tour = Tour::nearest_neighbor(&matrix);
        tour.two_opt(&matrix);

        let values = vars.assignment(model.num_vars(), &tour);
        assert!(model.is_feasible(&values, 1e-9));
        assert!((model.objective().evaluate(&values) - tour.length(&matrix)).abs() < 1e-9);
    }

    #[test]
    fn selected_edges_form_one_cycle_with_unit_degrees() {
        let matrix = DistanceMatrix::from_points(&pseudo_random_points(6, 9));
        let solution = TspSolver::new().solve(matrix).expect("solve");

        let mut out_degree = [0; 6];
        let mut in_degree = [0; 6];
        for &(i, j) in &solution.edges {
            out_degree[i] += 1;
            in_degree[j] += 1;
        }
        assert!(out_degree.iter().all(|&d| d == 1));
        assert!(in_degree.iter().all(|&d| d == 1));

        let mut order = solution.tour.order().to_vec();
        order.sort_unstable();
        assert_eq!(order, (0..6).collect::<Vec<_>>());
    }

    #[test]
    fn node_limit_surfaces_as_solve_error() {
        let backend = BranchAndBound::new(SolveLimits::unlimited().with_node_limit(0));
        let matrix = DistanceMatrix::from_points(&pseudo_random_points(5, 2));
        let err = TspSolver::with_backend(backend).solve(matrix).expect_err("node budget");
        assert!(err.is_solve());
        assert!(matches!(
            err,
            Error::Solve(MilpError::LimitReached { limit: "node", .. })
        ));
    }

    #[test]
    fn writes_lp_dump_when_requested() {
        let dir = unique_temp_dir("solver-lp");
        let solver = TspSolver::new().with_lp_dump_dir(&dir);
        solver.solve_named(triangle(), "tri 3").expect("solve triangle");

        let text = fs::read_to_string(dir.join("tri_3.lp")).expect("read lp dump");
        assert!(text.contains("Minimize"));
        assert!(text.contains(" out_0: "));
        assert!(text.contains(" mtz_1_2: "));
        assert!(text.contains("Binaries"));

        fs::remove_dir_all(&dir).expect("cleanup temp dir");
    }
}
