use crate::{Error, Point, Result};

const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// Square, symmetric, zero-diagonal matrix of non-negative edge lengths.
///
/// Stored row major. There are no mutating accessors, so the invariants
/// checked at construction hold for the lifetime of the value.
#[derive(Clone, Debug, PartialEq)]
pub struct DistanceMatrix {
    n: usize,
    data: Vec<f64>,
}

impl DistanceMatrix {
    /// Euclidean distances between every pair of `points`.
    pub fn from_points(points: &[Point]) -> Self {
        let n = points.len();
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = points[i].dist(&points[j]);
                data[i * n + j] = d;
                data[j * n + i] = d;
            }
        }
        Self { n, data }
    }

    /// Builds a matrix from explicit rows, checking every invariant.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n = rows.len();
        let mut data = Vec::with_capacity(n * n);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != n {
                return Err(Error::invalid_input(format!(
                    "row {i} has {} entries, expected {n}",
                    row.len()
                )));
            }
            data.extend(row);
        }

        let matrix = Self { n, data };
        for i in 0..n {
            if matrix.get(i, i) != 0.0 {
                return Err(Error::invalid_input(format!(
                    "diagonal entry ({i},{i}) is {}, expected 0",
                    matrix.get(i, i)
                )));
            }
            for j in 0..n {
                let d = matrix.get(i, j);
                if !d.is_finite() || d < 0.0 {
                    return Err(Error::invalid_input(format!(
                        "entry ({i},{j}) = {d} is not a finite non-negative distance"
                    )));
                }
                if (d - matrix.get(j, i)).abs() > SYMMETRY_TOLERANCE {
                    return Err(Error::invalid_input(format!(
                        "matrix is not symmetric at ({i},{j})"
                    )));
                }
            }
        }

        Ok(matrix)
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n + j]
    }

    pub fn is_symmetric(&self) -> bool {
        (0..self.n).all(|i| (0..i).all(|j| self.get(i, j) == self.get(j, i)))
    }

    pub fn has_zero_diagonal(&self) -> bool {
        (0..self.n).all(|i| self.get(i, i) == 0.0)
    }

    /// Total length of the closed tour visiting `order` and returning to its start.
    pub fn cycle_length(&self, order: &[usize]) -> f64 {
        if order.len() < 2 {
            return 0.0;
        }
        order
            .iter()
            .zip(order.iter().cycle().skip(1))
            .map(|(&a, &b)| self.get(a, b))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::DistanceMatrix;
    use crate::Point;

    fn pseudo_random_points(n: usize, seed: u64) -> Vec<Point> {
        let mut state = seed;
        let mut next = || {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (state >> 33) as f64 / (1u64 << 31) as f64 * 1000.0
        };
        (0..n).map(|_| Point::new(next(), next())).collect()
    }

    #[test]
    fn from_points_is_symmetric_with_zero_diagonal() {
        let matrix = DistanceMatrix::from_points(&pseudo_random_points(12, 7));
        assert_eq!(matrix.n(), 12);
        assert!(matrix.is_symmetric());
        assert!(matrix.has_zero_diagonal());
    }

    #[test]
    fn distances_are_non_negative_and_satisfy_triangle_inequality() {
        let matrix = DistanceMatrix::from_points(&pseudo_random_points(10, 42));
        let n = matrix.n();
        for i in 0..n {
            for j in 0..n {
                assert!(matrix.get(i, j) >= 0.0);
                for k in 0..n {
                    assert!(matrix.get(i, j) <= matrix.get(i, k) + matrix.get(k, j) + 1e-9);
                }
            }
        }
    }

    #[test]
    fn from_rows_accepts_valid_matrix() {
        let rows = vec![
            vec![0.0, 3.0, 4.0],
            vec![3.0, 0.0, 5.0],
            vec![4.0, 5.0, 0.0],
        ];
        let matrix = DistanceMatrix::from_rows(rows).expect("valid matrix");
        assert_eq!(matrix.n(), 3);
        assert_eq!(matrix.get(1, 2), 5.0);
        assert_eq!(matrix.get(2, 0), 4.0);
    }

    #[test]
    fn from_rows_rejects_broken_invariants() {
        let ragged = DistanceMatrix::from_rows(vec![vec![0.0, 1.0], vec![1.0]]);
        assert!(ragged.expect_err("ragged").to_string().contains("row 1 has 1 entries"));

        let diagonal = DistanceMatrix::from_rows(vec![vec![1.0, 1.0], vec![1.0, 0.0]]);
        assert!(diagonal.expect_err("diagonal").to_string().contains("diagonal entry (0,0)"));

        let negative = DistanceMatrix::from_rows(vec![vec![0.0, -1.0], vec![-1.0, 0.0]]);
        assert!(negative.expect_err("negative").to_string().contains("finite non-negative"));

        let asymmetric = DistanceMatrix::from_rows(vec![vec![0.0, 1.0], vec![2.0, 0.0]]);
        assert!(asymmetric.expect_err("asymmetric").to_string().contains("not symmetric"));
    }

    #[test]
    fn cycle_length_closes_the_tour() {
        let matrix = DistanceMatrix::from_points(&[
            Point::new(0.0, 0.0),
            Point::new(0.0, 3.0),
            Point::new(4.0, 0.0),
        ]);
        assert_eq!(matrix.cycle_length(&[0, 1, 2]), 12.0);
        assert_eq!(matrix.cycle_length(&[2]), 0.0);
    }
}
