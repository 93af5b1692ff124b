use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};

use milp::{backend::MilpBackend, branch_bound::BranchAndBound};
use rayon::prelude::*;

use crate::{Error, Result, ResultTable, SolverOptions, TspSolver, io::instance::parse};

/// One instance that could not be solved.
#[derive(Debug)]
pub struct Failure {
    pub file: PathBuf,
    pub error: Error,
}

/// Outcome of a batch: best costs plus every per-file failure.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: ResultTable,
    pub failures: Vec<Failure>,
}

impl BatchReport {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Writes the CSV. Fails with [`Error::NoResults`] when nothing was solved.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        self.results.write_csv(path)
    }
}

/// Solved instance before it is folded into the report.
#[derive(Debug)]
struct Solved {
    name: String,
    dimension: usize,
    cost: f64,
}

/// Parses and solves every instance named by the options, isolating
/// per-file failures.
pub struct BatchRunner<B = BranchAndBound> {
    solver: TspSolver<B>,
    jobs: usize,
}

impl BatchRunner {
    pub fn new(options: &SolverOptions) -> Self {
        let mut solver = TspSolver::with_backend(BranchAndBound::new(options.solve_limits()));
        if let Some(dir) = options.write_lp_dir() {
            solver = solver.with_lp_dump_dir(dir);
        }
        Self::with_solver(solver, options.jobs)
    }
}

impl<B: MilpBackend + Sync> BatchRunner<B> {
    pub fn with_solver(solver: TspSolver<B>, jobs: usize) -> Self {
        Self {
            solver,
            jobs: jobs.max(1),
        }
    }

    pub fn run(&self, files: &[PathBuf]) -> Result<BatchReport> {
        let started = Instant::now();
        log::info!("batch.start: files={} jobs={}", files.len(), self.jobs);

        let outcomes: Vec<Result<Solved>> = if self.jobs > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.jobs)
                .thread_name(|idx| format!("solve-{idx}"))
                .build()
                .map_err(|e| Error::other(format!("rayon pool: {e}")))?;
            pool.install(|| files.par_iter().map(|file| self.solve_file(file)).collect())
        } else {
            files.iter().map(|file| self.solve_file(file)).collect()
        };

        let mut report = BatchReport::default();
        for (file, outcome) in files.iter().zip(outcomes) {
            match outcome {
                Ok(solved) => {
                    log::info!(
                        "batch.solved: file={} name={} n={} cost={:.3}",
                        file.display(),
                        solved.name,
                        solved.dimension,
                        solved.cost
                    );
                    report.results.insert(&solved.name, solved.cost);
                }
                Err(error) => {
                    log::warn!("batch.failed: file={} error={error}", file.display());
                    report.failures.push(Failure {
                        file: file.clone(),
                        error,
                    });
                }
            }
        }

        log::info!(
            "batch.done: solved={} failed={} elapsed={:.3}s",
            report.results.len(),
            report.failures.len(),
            started.elapsed().as_secs_f64()
        );
        Ok(report)
    }

    fn solve_file(&self, file: &Path) -> Result<Solved> {
        let started = Instant::now();
        let (matrix, name, dimension) = parse(file)?;
        let solution = self.solver.solve_named(matrix, &name)?;
        log::debug!(
            "batch.instance: name={name} nodes={} elapsed={:.3}s",
            solution.nodes,
            started.elapsed().as_secs_f64()
        );
        Ok(Solved {
            name,
            dimension,
            cost: solution.cost,
        })
    }
}

/// Instance files under `input`: the file itself, or every file in the
/// directory whose extension matches (case-insensitive), sorted by path.
pub fn collect_instance_files(input: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        return Err(Error::invalid_input(format!(
            "input path {} is neither a file nor a directory",
            input.display()
        )));
    }

    let extension = extension.trim().trim_start_matches('.');
    let mut files = Vec::new();
    for entry in fs::read_dir(input)? {
        let path = entry?.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Collects, parses and solves every instance of a batch.
pub fn run_batch(options: &SolverOptions) -> Result<BatchReport> {
    let files = collect_instance_files(options.input_path(), &options.extension)?;
    if files.is_empty() {
        log::warn!(
            "batch.empty: input={} extension={}",
            options.input_path().display(),
            options.extension
        );
    }
    BatchRunner::new(options).run(&files)
}
