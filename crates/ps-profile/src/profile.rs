//! Profiled NLL over the scan grid.

use std::collections::BTreeMap;
use std::path::Path;

use ps_scan::Grid;
use ps_types::{invalid_argument, NamedValue, PoiHeader, ScanRecord, ScanResult};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::scan_log::ScanLog;

/// Minimum NLL found in one grid cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileCell {
    pub index: u64,
    pub bins: Vec<u32>,
    /// Cell centres per POI.
    pub centres: Vec<NamedValue>,
    pub nll: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub x: f64,
    pub y: f64,
}

/// Curves for a one-dimensional scan, over filled cells only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileCurves {
    pub nll: Vec<CurvePoint>,
    pub two_nll: Vec<CurvePoint>,
    /// `exp(-nll)`.
    pub likelihood: Vec<CurvePoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileLikelihood {
    pub pois: Vec<PoiHeader>,
    pub min_nll: f64,
    pub max_nll: f64,
    /// Whether `min_nll` was subtracted from every cell.
    pub subtract_min_nll: bool,
    pub best_fits: Vec<ScanRecord>,
    /// Filled cells in index order.
    pub cells: Vec<ProfileCell>,
    pub curves: Option<ProfileCurves>,
    /// Records whose POI values fell outside the grid.
    pub records_outside: usize,
}

impl ProfileLikelihood {
    pub fn build(log: &ScanLog, subtract_min_nll: bool) -> ScanResult<Self> {
        if log.pois.is_empty() {
            return Err(invalid_argument!("no POI headers found in scan logs"));
        }
        if log.records.is_empty() {
            return Err(invalid_argument!("no nll records found in scan logs"));
        }

        let grid = Grid::new(log.pois.iter().map(PoiHeader::to_dimension).collect())?;

        let (min_nll, max_nll) = log
            .records
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
                (lo.min(r.nll), hi.max(r.nll))
            });
        info!("(minNLL, maxNLL) = ({}, {})", min_nll, max_nll);
        let offset = if subtract_min_nll { min_nll } else { 0.0 };

        let mut minima: BTreeMap<u64, f64> = BTreeMap::new();
        let mut records_outside = 0;
        for record in &log.records {
            let values: Option<Vec<f64>> =
                log.pois.iter().map(|p| record.value_of(&p.name)).collect();
            let Some(index) = values.and_then(|v| grid.locate(&v)) else {
                records_outside += 1;
                continue;
            };
            let nll = record.nll - offset;
            minima
                .entry(index)
                .and_modify(|best| *best = best.min(nll))
                .or_insert(nll);
        }
        if records_outside > 0 {
            warn!("{} records lie outside the scan grid", records_outside);
        }

        let cells = minima
            .into_iter()
            .map(|(index, nll)| {
                let point = grid.point(index)?;
                Ok(ProfileCell {
                    index,
                    bins: point.bins,
                    centres: point.values,
                    nll,
                })
            })
            .collect::<ScanResult<Vec<_>>>()?;

        let curves = (grid.len() == 1).then(|| curves_1d(&cells));

        Ok(Self {
            pois: log.pois.clone(),
            min_nll,
            max_nll,
            subtract_min_nll,
            best_fits: log.best_fits.clone(),
            cells,
            curves,
            records_outside,
        })
    }

    /// Cell with the lowest profiled NLL.
    pub fn minimum(&self) -> Option<&ProfileCell> {
        self.cells.iter().min_by(|a, b| a.nll.total_cmp(&b.nll))
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> ScanResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        info!("Wrote profile likelihood to {}", path.as_ref().display());
        Ok(())
    }
}

fn curves_1d(cells: &[ProfileCell]) -> ProfileCurves {
    let point = |cell: &ProfileCell, y: f64| CurvePoint {
        x: cell.centres[0].value,
        y,
    };
    ProfileCurves {
        nll: cells.iter().map(|c| point(c, c.nll)).collect(),
        two_nll: cells.iter().map(|c| point(c, 2.0 * c.nll)).collect(),
        likelihood: cells.iter().map(|c| point(c, (-c.nll).exp())).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ps_types::ScanError;

    fn log_from(lines: &[&str]) -> ScanLog {
        let mut log = ScanLog::new();
        for line in lines {
            log.ingest_line(line);
        }
        log
    }

    #[test]
    fn keeps_minimum_per_cell() {
        let log = log_from(&[
            "* POI mu=[4,0,4]",
            "nll=3, mu=0.5",
            "nll=2, mu=1.5",
            "nll=1.5, mu=1.6",
            "nll=4, mu=3.5",
            "nll=9, mu=7",
            "ucmles -- nll=1.2, mu=1.7",
        ]);
        let profile = ProfileLikelihood::build(&log, false).unwrap();

        assert_eq!(profile.min_nll, 1.5);
        assert_eq!(profile.max_nll, 9.0);
        assert_eq!(profile.records_outside, 1);
        assert_eq!(profile.best_fits.len(), 1);

        let cells: Vec<(u64, f64)> = profile.cells.iter().map(|c| (c.index, c.nll)).collect();
        assert_eq!(cells, vec![(0, 3.0), (1, 1.5), (3, 4.0)]);
        assert_eq!(profile.minimum().unwrap().index, 1);

        let curves = profile.curves.as_ref().unwrap();
        assert_eq!(curves.nll[1], CurvePoint { x: 1.5, y: 1.5 });
        assert_eq!(curves.two_nll[1].y, 3.0);
        assert!((curves.likelihood[1].y - (-1.5f64).exp()).abs() < 1e-15);
    }

    #[test]
    fn subtracts_global_minimum() {
        let log = log_from(&["* POI mu=[2,0,2]", "nll=5, mu=0.5", "nll=7, mu=1.5"]);
        let profile = ProfileLikelihood::build(&log, true).unwrap();
        let nlls: Vec<f64> = profile.cells.iter().map(|c| c.nll).collect();
        assert_eq!(nlls, vec![0.0, 2.0]);
        assert!(profile.subtract_min_nll);
    }

    #[test]
    fn two_dimensional_profile_has_no_curves() {
        let log = log_from(&[
            "* POI mu=[2,0,2]",
            "* POI mH=[3,120,123]",
            "nll=1, mu=0.5, mH=122.5, theta=0",
            "nll=2, mu=1.5, mH=120.5, theta=0",
        ]);
        let profile = ProfileLikelihood::build(&log, false).unwrap();
        assert!(profile.curves.is_none());

        let cells: Vec<(u64, Vec<u32>)> =
            profile.cells.iter().map(|c| (c.index, c.bins.clone())).collect();
        assert_eq!(cells, vec![(1, vec![1, 0]), (4, vec![0, 2])]);
    }

    #[test]
    fn records_missing_a_poi_are_outside() {
        let log = log_from(&["* POI mu=[2,0,2]", "nll=1, theta=0", "nll=2, mu=0.5"]);
        let profile = ProfileLikelihood::build(&log, false).unwrap();
        assert_eq!(profile.records_outside, 1);
        assert_eq!(profile.cells.len(), 1);
    }

    #[test]
    fn empty_logs_are_rejected() {
        assert!(ProfileLikelihood::build(&ScanLog::new(), false).is_err());
        let headers_only = log_from(&["* POI mu=[2,0,2]"]);
        assert!(ProfileLikelihood::build(&headers_only, false).is_err());
    }

    #[test]
    fn collapsed_poi_range_is_an_error() {
        let log = log_from(&["* POI mu=[3,2,2]", "nll=1, mu=2", "nll=2, mu=2"]);
        assert!(matches!(
            ProfileLikelihood::build(&log, false),
            Err(ScanError::InvalidArgument(_))
        ));
    }

    #[test]
    fn writes_json() {
        let log = log_from(&["* POI mu=[2,0,2]", "nll=5, mu=0.5"]);
        let profile = ProfileLikelihood::build(&log, false).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("PL_data.json");
        profile.write_json(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let back: ProfileLikelihood = serde_json::from_str(&text).unwrap();
        assert_eq!(back.pois, profile.pois);
        assert_eq!(back.cells, profile.cells);
        assert_eq!(back.curves.unwrap().nll.len(), 1);
    }
}
