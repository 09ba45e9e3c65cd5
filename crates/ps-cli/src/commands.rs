use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use ps_profile::{ProfileLikelihood, ScanLog};
use ps_scan::{owner_of, BatchPlan, Grid, JobReport, JobSpec, ScanJob, ScanOverrides};
use tracing::info;

use crate::settings::RunConfig;

pub struct ScanArgs {
    pub config: PathBuf,
    pub overrides: ScanOverrides,
    pub counter: u64,
    pub jobs: u64,
    pub reserve_unconditional: bool,
    pub output: PathBuf,
    pub threads: usize,
}

/// Run one batch job and write `job_<counter>.log` plus a JSON report.
pub fn scan(args: &ScanArgs) -> anyhow::Result<JobReport> {
    let config = RunConfig::load(&args.config, &args.overrides)?;
    let grid = config.scan.grid()?;
    let spec = JobSpec::from_counter(args.jobs, args.counter, args.reserve_unconditional)?;
    let job = ScanJob::new(grid, spec);

    fs::create_dir_all(&args.output)
        .with_context(|| format!("creating output directory {}", args.output.display()))?;
    let log_path = args.output.join(format!("job_{}.log", args.counter));
    let mut sink = BufWriter::new(
        File::create(&log_path).with_context(|| format!("creating {}", log_path.display()))?,
    );

    let report = if args.threads > 1 {
        let model = config.build_model()?;
        job.run_parallel(&model, &mut sink, args.threads)?
    } else {
        let mut model = config.build_model()?;
        job.run(&mut model, &mut sink)?
    };

    let report_path = args.output.join(format!("job_{}.json", args.counter));
    fs::write(&report_path, serde_json::to_string_pretty(&report)?)?;
    info!(
        "Wrote {} and {}",
        log_path.display(),
        report_path.display()
    );
    Ok(report)
}

/// Describe every job of the batch.
pub fn plan(
    config: &Path,
    overrides: &ScanOverrides,
    jobs: u64,
    reserve_unconditional: bool,
) -> anyhow::Result<BatchPlan> {
    let config = RunConfig::load(config, overrides)?;
    let grid = config.scan.grid()?;
    let plan = BatchPlan::new(grid.total_points(), jobs, reserve_unconditional)?;
    info!(
        "{} grid points over {} processes, at most {} points per job",
        plan.total_points,
        plan.process_count(),
        plan.max_shard_len()
    );
    Ok(plan)
}

/// Tables showing which index and which job every cell of a 2-D grid gets.
pub fn enumerate(config: &Path, overrides: &ScanOverrides, jobs: u64) -> anyhow::Result<String> {
    let config = RunConfig::load(config, overrides)?;
    let grid = config.scan.grid()?;
    render_enumeration(&grid, jobs)
}

pub fn render_enumeration(grid: &Grid, jobs: u64) -> anyhow::Result<String> {
    if grid.len() != 2 {
        bail!(
            "bin enumeration needs exactly two POIs, the grid has {}",
            grid.len()
        );
    }
    let total = grid.total_points();
    let dims = grid.dimensions();
    let (nx, ny) = (dims[0].bins, dims[1].bins);

    let mut numbers = vec![vec![0u64; nx as usize]; ny as usize];
    let mut owners = numbers.clone();
    for index in 0..total {
        let bins = grid.index_to_bins(index)?;
        let (x, y) = (bins[0] as usize, bins[1] as usize);
        numbers[y][x] = index + 1;
        owners[y][x] = owner_of(total, jobs, index)? + 1;
    }

    let width = total.to_string().len().max(jobs.to_string().len());
    let mut out = String::new();
    for (title, table) in [("bin enumeration", &numbers), ("jobs", &owners)] {
        writeln!(out, "{title} ({} across, {} up)", dims[0].name, dims[1].name)?;
        // Highest y bin first, as on a plot.
        for row in table.iter().rev() {
            let cells: Vec<String> = row.iter().map(|v| format!("{v:>width$}")).collect();
            writeln!(out, "{}", cells.join(" "))?;
        }
        writeln!(out)?;
    }
    Ok(out)
}

/// Merge job logs into a profile likelihood written as JSON.
pub fn aggregate(
    inputs: &[PathBuf],
    output: &Path,
    subtract_min_nll: bool,
) -> anyhow::Result<ProfileLikelihood> {
    if inputs.is_empty() {
        bail!("no input logs given");
    }
    let log = ScanLog::from_files(inputs)?;
    let profile = ProfileLikelihood::build(&log, subtract_min_nll)?;
    if let Some(best) = log.best_fit() {
        info!("Best fit: {}", best);
    }
    if let Some(min) = profile.minimum() {
        let centres: Vec<String> = min.centres.iter().map(|c| c.to_string()).collect();
        info!("Profile minimum at {}: nll={}", centres.join(", "), min.nll);
    }
    profile.write_json(output)?;
    Ok(profile)
}
