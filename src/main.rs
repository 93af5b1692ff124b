use std::time::Instant;

use log::info;

use tsp_exact_core::{Error, Result, SolverOptions, logging, run_batch};

fn main() -> Result<()> {
    let now = Instant::now();
    let options = SolverOptions::from_args()?;
    logging::init_logger(&options)?;

    let output = options.output_path();
    info!(
        "options: input={} output={} jobs={} limits={:?}",
        options.input_path().display(),
        output.display(),
        options.jobs,
        options.solve_limits()
    );

    let report = run_batch(&options)?;
    if report.is_empty() {
        return Err(Error::NoResults);
    }

    for (name, cost) in report.results.iter() {
        println!("{name}: {cost:.3}");
    }
    report.persist(&output)?;

    info!(
        "output: solved={} failed={} time={:.2}s",
        report.results.len(),
        report.failures.len(),
        now.elapsed().as_secs_f32()
    );

    Ok(())
}
