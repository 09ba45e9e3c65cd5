//! Reading job logs.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ps_types::{LogLine, PoiHeader, RecordKind, ScanRecord, ScanResult};
use tracing::{info, warn};

/// Everything collected from a set of job logs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanLog {
    /// POI headers, first-seen per name, in order of appearance.
    pub pois: Vec<PoiHeader>,
    /// Conditional (grid point) records.
    pub records: Vec<ScanRecord>,
    /// Unconditional fit records.
    pub best_fits: Vec<ScanRecord>,
    /// Record lines that could not be parsed.
    pub malformed_lines: usize,
    /// Records dropped for a NaN or infinite NLL.
    pub non_finite: usize,
}

impl ScanLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and merge several log files.
    pub fn from_files<P: AsRef<Path>>(paths: &[P]) -> ScanResult<Self> {
        let mut log = Self::new();
        for path in paths {
            let path = path.as_ref();
            info!("Opening {}", path.display());
            let file = File::open(path)?;
            log.read_from(BufReader::new(file))?;
        }
        info!(
            "Read {} POIs, {} records, {} unconditional fits",
            log.pois.len(),
            log.records.len(),
            log.best_fits.len()
        );
        Ok(log)
    }

    pub fn read_from<R: BufRead>(&mut self, reader: R) -> ScanResult<()> {
        for line in reader.lines() {
            self.ingest_line(&line?);
        }
        Ok(())
    }

    /// Classify one line and store it if it is a record.
    pub fn ingest_line(&mut self, line: &str) {
        match LogLine::parse(line) {
            Ok(Some(LogLine::Poi(header))) => {
                if !self.pois.iter().any(|p| p.name == header.name) {
                    self.pois.push(header);
                }
            }
            Ok(Some(LogLine::Record(record))) => {
                if !record.nll.is_finite() {
                    warn!("Dropping record with non-finite nll: {}", line);
                    self.non_finite += 1;
                    return;
                }
                match record.kind {
                    RecordKind::Conditional => self.records.push(record),
                    RecordKind::Unconditional => self.best_fits.push(record),
                }
            }
            Ok(None) => {}
            Err(e) => {
                // Typically the last line of a job that died mid-write.
                warn!("Skipping malformed line: {}", e);
                self.malformed_lines += 1;
            }
        }
    }

    /// Unconditional record with the lowest NLL.
    pub fn best_fit(&self) -> Option<&ScanRecord> {
        self.best_fits
            .iter()
            .min_by(|a, b| a.nll.total_cmp(&b.nll))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const JOB_0: &str = "\
* POI mu=[4,0,4]
Total grid points: 4
nll=3.5, mu=0.5, theta=0.1
nll=1.5, mu=1.5, theta=0.05
";

    const JOB_1: &str = "\
* POI mu=[8,0,8]
nll=0.5, mu=2.5, theta=0
nll=NaN, mu=3.5, theta=0
nll=2.5, mu=
ucmles -- nll=0.25, mu=2.2, theta=0
";

    #[test]
    fn merges_logs_and_keeps_first_poi_header() {
        let mut log = ScanLog::new();
        log.read_from(JOB_0.as_bytes()).unwrap();
        log.read_from(JOB_1.as_bytes()).unwrap();

        assert_eq!(log.pois.len(), 1);
        assert_eq!(log.pois[0].bins, 4);
        assert_eq!(log.records.len(), 3);
        assert_eq!(log.best_fits.len(), 1);
        assert_eq!(log.non_finite, 1);
        assert_eq!(log.malformed_lines, 1);
    }

    #[test]
    fn best_fit_is_lowest_unconditional_nll() {
        let mut log = ScanLog::new();
        log.ingest_line("ucmles -- nll=2, mu=1");
        log.ingest_line("ucmles -- nll=-1, mu=3");
        assert_eq!(log.best_fit().unwrap().value_of("mu"), Some(3.0));
        assert!(ScanLog::new().best_fit().is_none());
    }

    #[test]
    fn reads_files_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<_> = [JOB_0, JOB_1]
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let path = dir.path().join(format!("job_{i}.log"));
                let mut file = File::create(&path).unwrap();
                file.write_all(text.as_bytes()).unwrap();
                path
            })
            .collect();

        let log = ScanLog::from_files(&paths).unwrap();
        assert_eq!(log.records.len(), 3);

        let missing = dir.path().join("missing.log");
        assert!(ScanLog::from_files(&[missing]).is_err());
    }
}
