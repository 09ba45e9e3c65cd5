//! Execution of one batch job: evaluate every grid point in the job's shard
//! and write the scan records.

use std::io::Write;

use chrono::{DateTime, Utc};
use ps_types::{
    config_error, FitSummary, NamedValue, PoiHeader, ProfileModel, ScanRecord, ScanResult,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::grid::{Grid, GridPoint};
use crate::shard::{job_shard, JobSpec, Shard};

/// Summary of a finished job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub id: Uuid,
    pub spec: JobSpec,
    pub shard: Shard,
    pub total_points: u64,
    pub points_evaluated: u64,
    /// Fits that returned a non-zero status.
    pub failed_fits: u64,
    pub unconditional: Option<FitSummary>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobReport {
    fn new(spec: JobSpec, shard: Shard, total_points: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            spec,
            shard,
            total_points,
            points_evaluated: 0,
            failed_fits: 0,
            unconditional: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    fn mark_completed(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}

/// One job of a batch scan.
#[derive(Debug, Clone)]
pub struct ScanJob {
    grid: Grid,
    spec: JobSpec,
}

impl ScanJob {
    pub fn new(grid: Grid, spec: JobSpec) -> Self {
        Self { grid, spec }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn spec(&self) -> &JobSpec {
        &self.spec
    }

    pub fn shard(&self) -> Shard {
        self.spec.shard(self.grid.total_points())
    }

    /// Evaluate the shard sequentially, writing records to `sink`.
    pub fn run<M, W>(&self, model: &mut M, sink: &mut W) -> ScanResult<JobReport>
    where
        M: ProfileModel,
        W: Write,
    {
        let mut report = self.start(sink)?;

        for index in report.shard.indices() {
            let (point, summary) = evaluate_point(&self.grid, model, index)?;
            self.write_point(sink, &point, &summary, &mut report)?;
        }

        self.finish(model, sink, report)
    }

    /// Evaluate the shard on `threads` workers. Each worker fits a contiguous
    /// slice of the shard with its own clone of `model`; records are written
    /// in index order.
    pub fn run_parallel<M, W>(&self, model: &M, sink: &mut W, threads: usize) -> ScanResult<JobReport>
    where
        M: ProfileModel + Clone + Send + Sync,
        W: Write,
    {
        let mut report = self.start(sink)?;
        let shard = report.shard;
        let workers = (threads.max(1) as u64).min(shard.len().max(1));

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers as usize)
            .build()
            .map_err(|e| config_error!("failed to start worker pool: {}", e))?;

        let slices = (0..workers)
            .map(|w| {
                job_shard(shard.len(), workers, w, false).map(|s| Shard {
                    first: shard.first + s.first,
                    last: shard.first + s.last,
                })
            })
            .collect::<ScanResult<Vec<_>>>()?;

        let results = pool.install(|| {
            slices
                .par_iter()
                .map(|slice| {
                    let mut worker_model = model.clone();
                    slice
                        .indices()
                        .map(|index| evaluate_point(&self.grid, &mut worker_model, index))
                        .collect::<ScanResult<Vec<_>>>()
                })
                .collect::<ScanResult<Vec<_>>>()
        })?;

        for (point, summary) in results.iter().flatten() {
            self.write_point(sink, point, summary, &mut report)?;
        }

        let mut model = model.clone();
        self.finish(&mut model, sink, report)
    }

    fn start<W: Write>(&self, sink: &mut W) -> ScanResult<JobReport> {
        let total = self.grid.total_points();
        let shard = self.shard();
        info!("Total grid points: {}", total);
        info!(
            "Job {} of {} ({:?}): indices [{}, {})",
            self.spec.counter(),
            self.spec.jobs,
            self.spec.selector,
            shard.first,
            shard.last
        );

        for dim in self.grid.dimensions() {
            writeln!(sink, "{}", PoiHeader::from(dim))?;
        }
        Ok(JobReport::new(self.spec, shard, total))
    }

    fn write_point<W: Write>(
        &self,
        sink: &mut W,
        point: &GridPoint,
        summary: &FitSummary,
        report: &mut JobReport,
    ) -> ScanResult<()> {
        if !summary.converged() {
            warn!(
                "Fit at grid index {} finished with status {}",
                point.index, summary.status
            );
            report.failed_fits += 1;
        }
        let record = ScanRecord::conditional(summary.nll, record_parameters(&point.values, summary));
        writeln!(sink, "{record}")?;
        report.points_evaluated += 1;
        Ok(())
    }

    fn finish<M, W>(&self, model: &mut M, sink: &mut W, mut report: JobReport) -> ScanResult<JobReport>
    where
        M: ProfileModel,
        W: Write,
    {
        if self.spec.runs_unconditional_fit() {
            info!("Running unconditional fit");
            let summary = model.unconditional_fit()?;
            if !summary.converged() {
                warn!("Unconditional fit finished with status {}", summary.status);
                report.failed_fits += 1;
            }
            let record = ScanRecord::unconditional(summary.nll, summary.parameters.clone());
            writeln!(sink, "{record}")?;
            report.unconditional = Some(summary);
        }
        sink.flush()?;
        report.mark_completed();
        info!(
            "Job finished: {} points, {} failed fits",
            report.points_evaluated, report.failed_fits
        );
        Ok(report)
    }
}

fn evaluate_point<M: ProfileModel>(
    grid: &Grid,
    model: &mut M,
    index: u64,
) -> ScanResult<(GridPoint, FitSummary)> {
    let point = grid.point(index)?;
    let summary = model.apply_and_evaluate(&point.values)?;
    debug!("Grid index {}: nll={}", index, summary.nll);
    Ok((point, summary))
}

/// POI values in grid order, then the remaining fitted parameters.
fn record_parameters(point: &[NamedValue], summary: &FitSummary) -> Vec<NamedValue> {
    let mut parameters = point.to_vec();
    parameters.extend(
        summary
            .parameters
            .iter()
            .filter(|p| !point.iter().any(|poi| poi.name == p.name))
            .cloned(),
    );
    parameters
}
