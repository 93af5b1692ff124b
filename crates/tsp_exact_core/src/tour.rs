use crate::{DistanceMatrix, Error, Result};

/// Smallest gain a 2-opt move must bring to be applied.
const TWO_OPT_EPS: f64 = 1e-9;

/// A Hamiltonian cycle, stored as the visiting order starting at node 0.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tour {
    order: Vec<usize>,
}

impl Tour {
    /// Rebuilds the cycle from directed edges `(from, to)`.
    ///
    /// Every node must have exactly one outgoing and one incoming edge, and
    /// following successors from node 0 must visit all `n` nodes.
    pub fn from_edges(n: usize, edges: &[(usize, usize)]) -> Result<Self> {
        if n < 2 {
            return Err(Error::invalid_input(format!(
                "a tour needs at least 2 nodes, got {n}"
            )));
        }
        if edges.len() != n {
            return Err(Error::invalid_data(format!(
                "expected {n} selected edges, got {}",
                edges.len()
            )));
        }

        let mut successor = vec![None; n];
        let mut has_predecessor = vec![false; n];
        for &(from, to) in edges {
            if from >= n || to >= n || from == to {
                return Err(Error::invalid_data(format!(
                    "edge ({from},{to}) is not valid for {n} nodes"
                )));
            }
            if successor[from].replace(to).is_some() {
                return Err(Error::invalid_data(format!(
                    "node {from} has more than one outgoing edge"
                )));
            }
            if std::mem::replace(&mut has_predecessor[to], true) {
                return Err(Error::invalid_data(format!(
                    "node {to} has more than one incoming edge"
                )));
            }
        }

        let successors = successor
            .into_iter()
            .enumerate()
            .map(|(node, next)| {
                next.ok_or_else(|| {
                    Error::invalid_data(format!("node {node} has no outgoing edge"))
                })
            })
            .collect::<Result<Vec<usize>>>()?;
        Self::from_successors(&successors)
    }

    /// `successors[i]` is the node visited right after `i`.
    pub fn from_successors(successors: &[usize]) -> Result<Self> {
        let n = successors.len();
        let mut order = Vec::with_capacity(n);
        let mut visited = vec![false; n];
        let mut node = 0;
        while n > 0 && !visited[node] {
            visited[node] = true;
            order.push(node);
            node = successors[node];
            if node >= n {
                return Err(Error::invalid_data(format!(
                    "successor {node} is out of range for {n} nodes"
                )));
            }
        }

        if order.len() != n || node != 0 {
            return Err(Error::invalid_data(format!(
                "selected edges form {} subtours instead of one tour over {n} nodes",
                count_cycles(successors)
            )));
        }
        Ok(Self { order })
    }

    /// Greedy tour from node 0, always moving to the closest unvisited node.
    pub fn nearest_neighbor(matrix: &DistanceMatrix) -> Self {
        let n = matrix.n();
        let mut visited = vec![false; n];
        let mut order = Vec::with_capacity(n);
        let mut current = 0;
        while n > 0 {
            visited[current] = true;
            order.push(current);
            let next = (0..n)
                .filter(|&node| !visited[node])
                .min_by(|&a, &b| matrix.get(current, a).total_cmp(&matrix.get(current, b)));
            match next {
                Some(node) => current = node,
                None => break,
            }
        }
        Self { order }
    }

    /// First-improvement 2-opt until no segment reversal shortens the tour.
    /// Node 0 stays first. Returns the number of applied moves.
    pub fn two_opt(&mut self, matrix: &DistanceMatrix) -> usize {
        let n = self.order.len();
        if n < 4 {
            return 0;
        }

        let mut moves = 0;
        let mut improved = true;
        while improved {
            improved = false;
            for i in 1..n - 1 {
                for j in i + 1..n {
                    let a = self.order[i - 1];
                    let b = self.order[i];
                    let c = self.order[j];
                    let d = self.order[(j + 1) % n];
                    let before = matrix.get(a, b) + matrix.get(c, d);
                    let after = matrix.get(a, c) + matrix.get(b, d);
                    if after + TWO_OPT_EPS < before {
                        self.order[i..=j].reverse();
                        moves += 1;
                        improved = true;
                    }
                }
            }
        }
        moves
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Directed edges of the closed tour, the last one returning to node 0.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.order
            .iter()
            .zip(self.order.iter().cycle().skip(1))
            .map(|(&a, &b)| (a, b))
    }

    pub fn length(&self, matrix: &DistanceMatrix) -> f64 {
        matrix.cycle_length(&self.order)
    }

    pub fn metrics(&self, matrix: &DistanceMatrix) -> TourMetrics {
        let legs: Vec<f64> = self.edges().map(|(a, b)| matrix.get(a, b)).collect();
        let total: f64 = legs.iter().sum();
        let longest = legs.iter().copied().fold(0.0_f64, f64::max);
        let shortest = legs.iter().copied().fold(f64::INFINITY, f64::min);
        let average = total / legs.len() as f64;

        log::debug!(
            "metrics: n={} total={total:.3} longest={longest:.3} shortest={shortest:.3} avg={average:.3}",
            legs.len()
        );

        TourMetrics {
            total,
            longest,
            shortest,
            average,
        }
    }
}

/// Leg statistics of one tour.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TourMetrics {
    pub total: f64,
    pub longest: f64,
    pub shortest: f64,
    pub average: f64,
}

/// Number of distinct cycles reachable in a successor map.
fn count_cycles(successors: &[usize]) -> usize {
    let n = successors.len();
    let mut state = vec![0u8; n];
    let mut cycles = 0;
    for start in 0..n {
        let mut node = start;
        while node < n && state[node] == 0 {
            state[node] = 1;
            node = successors[node];
        }
        if node < n && state[node] == 1 {
            cycles += 1;
        }
        let mut node = start;
        while node < n && state[node] == 1 {
            state[node] = 2;
            node = successors[node];
        }
    }
    cycles
}
