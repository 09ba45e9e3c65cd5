//! Partitioning of the grid index range into batch job shards.

use std::ops::Range;

use ps_types::{invalid_argument, ScanResult};
use serde::{Deserialize, Serialize};

/// Half-open range `[first, last)` of grid indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shard {
    pub first: u64,
    pub last: u64,
}

impl Shard {
    pub const EMPTY: Shard = Shard { first: 0, last: 0 };

    pub fn len(&self) -> u64 {
        self.last - self.first
    }

    pub fn is_empty(&self) -> bool {
        self.first == self.last
    }

    pub fn indices(&self) -> Range<u64> {
        self.first..self.last
    }
}

/// Which part of a batch scan a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShardSelector {
    /// Grid job `counter` of `jobs`, counting from zero.
    Grid { counter: u64 },
    /// The extra job that only runs the unconditional fit.
    Unconditional,
}

/// Identity of one job within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Number of grid jobs; the unconditional job is not counted.
    pub jobs: u64,
    pub selector: ShardSelector,
    /// Whether a separate job performs the unconditional fit.
    pub reserve_unconditional: bool,
}

impl JobSpec {
    pub fn grid(jobs: u64, counter: u64, reserve_unconditional: bool) -> ScanResult<Self> {
        check_jobs(jobs)?;
        if counter >= jobs {
            return Err(invalid_argument!(
                "job counter {} out of range [0, {})",
                counter,
                jobs
            ));
        }
        Ok(Self {
            jobs,
            selector: ShardSelector::Grid { counter },
            reserve_unconditional,
        })
    }

    pub fn unconditional(jobs: u64) -> ScanResult<Self> {
        check_jobs(jobs)?;
        Ok(Self {
            jobs,
            selector: ShardSelector::Unconditional,
            reserve_unconditional: true,
        })
    }

    /// Translate the batch-system counter, where `counter == jobs` names the
    /// reserved unconditional job.
    pub fn from_counter(jobs: u64, counter: u64, reserve_unconditional: bool) -> ScanResult<Self> {
        if reserve_unconditional && counter == jobs {
            Self::unconditional(jobs)
        } else {
            Self::grid(jobs, counter, reserve_unconditional)
        }
    }

    /// Counter as understood by the batch system.
    pub fn counter(&self) -> u64 {
        match self.selector {
            ShardSelector::Grid { counter } => counter,
            ShardSelector::Unconditional => self.jobs,
        }
    }

    /// Whether this job writes the unconditional fit record.
    pub fn runs_unconditional_fit(&self) -> bool {
        match self.selector {
            ShardSelector::Unconditional => true,
            ShardSelector::Grid { counter } => !self.reserve_unconditional && counter == 0,
        }
    }

    pub fn shard(&self, total_points: u64) -> Shard {
        match self.selector {
            ShardSelector::Unconditional => Shard::EMPTY,
            ShardSelector::Grid { counter } => grid_shard(total_points, self.jobs, counter),
        }
    }
}

/// Shard of job `counter` out of `jobs` over `[0, total_points)`.
///
/// With `reserve_last_for_unconditional`, `counter == jobs` selects the
/// reserved job and yields the empty shard.
pub fn job_shard(
    total_points: u64,
    jobs: u64,
    counter: u64,
    reserve_last_for_unconditional: bool,
) -> ScanResult<Shard> {
    Ok(JobSpec::from_counter(jobs, counter, reserve_last_for_unconditional)?.shard(total_points))
}

/// The grid job that processes `index`.
pub fn owner_of(total_points: u64, jobs: u64, index: u64) -> ScanResult<u64> {
    check_jobs(jobs)?;
    if index >= total_points {
        return Err(invalid_argument!(
            "grid index {} out of range [0, {})",
            index,
            total_points
        ));
    }
    // Largest c with ceil(c*P/J) <= index, i.e. c*P <= index*J.
    let owner = (index as u128 * jobs as u128) / total_points as u128;
    Ok(owner as u64)
}

fn grid_shard(total_points: u64, jobs: u64, counter: u64) -> Shard {
    Shard {
        first: ceil_fraction(counter, total_points, jobs),
        last: ceil_fraction(counter + 1, total_points, jobs),
    }
}

/// `ceil(c * p / j)` without intermediate overflow; the result is at most `p`
/// whenever `c <= j`.
fn ceil_fraction(c: u64, p: u64, j: u64) -> u64 {
    let num = c as u128 * p as u128;
    let j = j as u128;
    ((num + j - 1) / j) as u64
}

fn check_jobs(jobs: u64) -> ScanResult<()> {
    if jobs < 1 {
        return Err(invalid_argument!("job count must be at least 1, got {}", jobs));
    }
    Ok(())
}
