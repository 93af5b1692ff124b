//! Exact Traveling Salesman solver for small coordinate-list instances.
//!
//! [`parse`] turns an instance file into a [`DistanceMatrix`]; [`solve`]
//! builds the Miller-Tucker-Zemlin model and proves an optimal tour with the
//! branch-and-bound backend of the `milp` crate. [`batch`] runs both over a
//! directory and collects the best cost per instance.

pub mod batch;
pub mod io;
pub mod logging;
pub mod solver;

mod error;
mod matrix;
mod node;
mod subtour;
mod tour;

pub(crate) use io::options;

pub use batch::{BatchReport, BatchRunner, Failure, collect_instance_files, run_batch};
pub use error::{Error, Result};
pub use io::{
    instance::{Instance, parse},
    options::{LogFormat, LogLevel, SolverOptions},
    results::{ResultTable, normalize_name, round_cost},
};
pub use matrix::DistanceMatrix;
pub use node::Point;
pub use solver::{TspSolution, TspSolver, solve};
pub use tour::{Tour, TourMetrics};
