//! `milp` provides a small typed API for mixed-integer linear programs and an
//! exact branch-and-bound backend on top of the `minilp` simplex solver.
//!
//! Consumers build a [`Model`](model::Model) (variables, linear rows and an
//! objective) and hand it to any [`MilpBackend`](backend::MilpBackend).
//!
//! # Quickstart
//!
//! ```
//! use milp::{
//!     backend::MilpBackend,
//!     branch_bound::BranchAndBound,
//!     model::{Comparison, LinearExpr, Model},
//! };
//!
//! fn main() -> milp::MilpResult<()> {
//!     let mut model = Model::new("pick-one");
//!     let a = model.add_binary("a");
//!     let b = model.add_binary("b");
//!     model.add_constraint(
//!         "one",
//!         LinearExpr::new().with_term(a, 1.0).with_term(b, 1.0),
//!         Comparison::Eq,
//!         1.0,
//!     );
//!     model.minimize(LinearExpr::new().with_term(a, 3.0).with_term(b, 2.0));
//!
//!     let solution = BranchAndBound::default().solve(&model)?;
//!     assert_eq!(solution.value(b), 1.0);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod branch_bound;
pub mod model;
pub mod solution;

mod error;
mod lp_writer;

pub use error::{MilpError, MilpResult};
