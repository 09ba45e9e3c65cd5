//! Batch plans: the full set of job descriptors for an external scheduler.

use chrono::{DateTime, Utc};
use ps_types::{invalid_argument, ScanResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shard::{JobSpec, Shard, ShardSelector};

/// Plans list every job, so the job count is bounded.
pub const MAX_PLANNED_JOBS: u64 = 1 << 20;

/// Describes a single job to be submitted to the batch system.
///
/// The scheduler starts one `profilescan scan` process per descriptor,
/// appending `args` to the shared command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub job_id: Uuid,
    pub spec: JobSpec,
    pub shard: Shard,
    /// Command-line flags identifying this job.
    pub args: Vec<String>,
}

impl JobDescriptor {
    fn new(spec: JobSpec, total_points: u64) -> Self {
        let mut args = vec![
            "--counter".to_string(),
            spec.counter().to_string(),
            "--jobs".to_string(),
            spec.jobs.to_string(),
        ];
        if spec.reserve_unconditional {
            args.push("--reserve-unconditional".to_string());
        }
        Self {
            job_id: Uuid::new_v4(),
            spec,
            shard: spec.shard(total_points),
            args,
        }
    }
}

/// All jobs of one batch scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPlan {
    pub plan_id: Uuid,
    pub total_points: u64,
    pub job_count: u64,
    pub reserve_unconditional: bool,
    pub entries: Vec<JobDescriptor>,
    pub created_at: DateTime<Utc>,
}

impl BatchPlan {
    /// Plan `jobs` grid jobs, plus the unconditional job when reserved.
    pub fn new(total_points: u64, jobs: u64, reserve_unconditional: bool) -> ScanResult<Self> {
        if jobs < 1 {
            return Err(invalid_argument!("job count must be at least 1, got {}", jobs));
        }
        if jobs > MAX_PLANNED_JOBS {
            return Err(invalid_argument!(
                "job count {} exceeds the plan limit of {}",
                jobs,
                MAX_PLANNED_JOBS
            ));
        }
        let mut entries = Vec::new();
        for counter in 0..jobs {
            let spec = JobSpec::grid(jobs, counter, reserve_unconditional)?;
            entries.push(JobDescriptor::new(spec, total_points));
        }
        if reserve_unconditional {
            entries.push(JobDescriptor::new(JobSpec::unconditional(jobs)?, total_points));
        }

        Ok(Self {
            plan_id: Uuid::new_v4(),
            total_points,
            job_count: jobs,
            reserve_unconditional,
            entries,
            created_at: Utc::now(),
        })
    }

    /// Number of processes the scheduler has to start.
    pub fn process_count(&self) -> usize {
        self.entries.len()
    }

    /// Largest number of grid points any one job evaluates.
    pub fn max_shard_len(&self) -> u64 {
        self.entries.iter().map(|e| e.shard.len()).max().unwrap_or(0)
    }

    pub fn unconditional_entry(&self) -> Option<&JobDescriptor> {
        self.entries
            .iter()
            .find(|e| matches!(e.spec.selector, ShardSelector::Unconditional))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ps_types::ScanError;

    #[test]
    fn plan_covers_every_point_once() {
        let plan = BatchPlan::new(10, 3, false).unwrap();
        assert_eq!(plan.process_count(), 3);
        assert_eq!(plan.max_shard_len(), 4);
        let covered: u64 = plan.entries.iter().map(|e| e.shard.len()).sum();
        assert_eq!(covered, 10);
        assert!(plan.unconditional_entry().is_none());
    }

    #[test]
    fn reserved_plan_adds_unconditional_job() {
        let plan = BatchPlan::new(10, 3, true).unwrap();
        assert_eq!(plan.process_count(), 4);

        let last = plan.unconditional_entry().unwrap();
        assert!(last.shard.is_empty());
        assert_eq!(last.args, vec!["--counter", "3", "--jobs", "3", "--reserve-unconditional"]);
    }

    #[test]
    fn zero_jobs_is_rejected() {
        assert!(BatchPlan::new(10, 0, false).is_err());
        assert!(BatchPlan::new(10, 0, true).is_err());
    }

    #[test]
    fn oversized_job_counts_are_rejected() {
        for jobs in [u64::MAX, MAX_PLANNED_JOBS + 1] {
            for reserve in [false, true] {
                assert!(matches!(
                    BatchPlan::new(10, jobs, reserve),
                    Err(ScanError::InvalidArgument(_))
                ));
            }
        }
        let plan = BatchPlan::new(3, 64, true).unwrap();
        assert_eq!(plan.process_count(), 65);
        assert_eq!(plan.max_shard_len(), 1);
    }

    #[test]
    fn plan_serialization() {
        let plan = BatchPlan::new(6, 2, true).unwrap();
        let json = serde_json::to_string(&plan).unwrap();
        let back: BatchPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(plan, back);
    }
}
