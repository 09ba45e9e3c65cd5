//! Mixed-radix enumeration of an N-dimensional parameter grid.

use ps_types::{invalid_argument, Dimension, NamedValue, ScanError, ScanResult};
use serde::{Deserialize, Serialize};

/// Total number of grid points: the product of all bin counts.
pub fn total_points(dims: &[Dimension]) -> ScanResult<u64> {
    if dims.is_empty() {
        return Err(invalid_argument!("a grid needs at least one dimension"));
    }
    let mut total: u64 = 1;
    for dim in dims {
        dim.validate()?;
        total = total.checked_mul(dim.bins as u64).ok_or_else(|| {
            ScanError::ArithmeticOverflow(format!(
                "grid point count exceeds {} at dimension {}",
                u64::MAX,
                dim.name
            ))
        })?;
    }
    Ok(total)
}

/// An immutable grid of scanned dimensions.
///
/// Dimension 0 is the least significant digit: consecutive indices step
/// through its bins first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    dims: Vec<Dimension>,
    total: u64,
    /// `weights[d]` is the product of the bin counts of dimensions `0..d`.
    weights: Vec<u64>,
}

/// One enumerated grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub index: u64,
    pub bins: Vec<u32>,
    /// Bin centres paired with dimension names, in dimension order.
    pub values: Vec<NamedValue>,
}

impl Grid {
    pub fn new(dims: Vec<Dimension>) -> ScanResult<Self> {
        let total = total_points(&dims)?;
        let mut weights = Vec::with_capacity(dims.len());
        let mut lower_dim: u64 = 1;
        for dim in &dims {
            weights.push(lower_dim);
            // Cannot overflow: the full product fit in `total`.
            lower_dim *= dim.bins as u64;
        }
        Ok(Self {
            dims,
            total,
            weights,
        })
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dims
    }

    pub fn total_points(&self) -> u64 {
        self.total
    }

    pub fn len(&self) -> usize {
        self.dims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    /// Decompose a flat index into one bin index per dimension.
    pub fn index_to_bins(&self, index: u64) -> ScanResult<Vec<u32>> {
        self.check_index(index)?;
        let mut bins = vec![0u32; self.dims.len()];
        let mut rest = index;
        for d in (0..self.dims.len()).rev() {
            if d >= 1 {
                let lower_dim = self.weights[d];
                let bin = rest / lower_dim;
                bins[d] = bin as u32;
                rest -= bin * lower_dim;
            } else {
                bins[d] = rest as u32;
            }
        }
        Ok(bins)
    }

    /// Recompose a flat index from per-dimension bin indices.
    pub fn bins_to_index(&self, bins: &[u32]) -> ScanResult<u64> {
        if bins.len() != self.dims.len() {
            return Err(invalid_argument!(
                "expected {} bin indices, got {}",
                self.dims.len(),
                bins.len()
            ));
        }
        let mut index = 0u64;
        for ((dim, &bin), &weight) in self.dims.iter().zip(bins).zip(&self.weights) {
            if bin >= dim.bins {
                return Err(invalid_argument!(
                    "bin {} out of range for dimension {} with {} bins",
                    bin,
                    dim.name,
                    dim.bins
                ));
            }
            index += bin as u64 * weight;
        }
        Ok(index)
    }

    /// Bin-centre values for a flat index.
    pub fn point(&self, index: u64) -> ScanResult<GridPoint> {
        let bins = self.index_to_bins(index)?;
        let values = self
            .dims
            .iter()
            .zip(&bins)
            .map(|(dim, &bin)| Ok(NamedValue::new(dim.name.clone(), dim.bin_center(bin)?)))
            .collect::<ScanResult<Vec<_>>>()?;
        Ok(GridPoint {
            index,
            bins,
            values,
        })
    }

    /// Flat index of the cell containing `values`, or `None` when any value
    /// lies outside its dimension.
    pub fn locate(&self, values: &[f64]) -> Option<u64> {
        if values.len() != self.dims.len() {
            return None;
        }
        let bins = self
            .dims
            .iter()
            .zip(values)
            .map(|(dim, &x)| dim.find_bin(x))
            .collect::<Option<Vec<_>>>()?;
        self.bins_to_index(&bins).ok()
    }

    fn check_index(&self, index: u64) -> ScanResult<()> {
        if index >= self.total {
            return Err(invalid_argument!(
                "grid index {} out of range [0, {})",
                index,
                self.total
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn dim(name: &str, bins: u32) -> Dimension {
        Dimension::new(name, 0.0, 10.0, bins).unwrap()
    }

    #[test]
    fn two_dimensional_enumeration_order() {
        let grid = Grid::new(vec![dim("a", 2), dim("b", 3)]).unwrap();
        assert_eq!(grid.total_points(), 6);

        let expected = [[0, 0], [1, 0], [0, 1], [1, 1], [0, 2], [1, 2]];
        for (i, bins) in expected.iter().enumerate() {
            assert_eq!(grid.index_to_bins(i as u64).unwrap(), bins.to_vec(), "index {i}");
        }
    }

    #[test]
    fn enumeration_is_a_bijection() {
        let grid = Grid::new(vec![dim("a", 3), dim("b", 1), dim("c", 4), dim("d", 2)]).unwrap();
        let total = grid.total_points();
        assert_eq!(total, 24);

        let mut seen = HashSet::new();
        for i in 0..total {
            let bins = grid.index_to_bins(i).unwrap();
            assert_eq!(grid.bins_to_index(&bins).unwrap(), i);
            assert!(seen.insert(bins));
        }
        assert_eq!(seen.len() as u64, total);
    }

    #[test]
    fn single_dimension_is_identity() {
        let grid = Grid::new(vec![dim("mu", 7)]).unwrap();
        for i in 0..7 {
            assert_eq!(grid.index_to_bins(i).unwrap(), vec![i as u32]);
        }
    }

    #[test]
    fn point_carries_bin_centres() {
        let grid = Grid::new(vec![
            Dimension::new("mu", 0.0, 10.0, 5).unwrap(),
            Dimension::new("mH", 120.0, 130.0, 2).unwrap(),
        ])
        .unwrap();
        let point = grid.point(7).unwrap();
        assert_eq!(point.bins, vec![2, 1]);
        assert_eq!(point.values[0], NamedValue::new("mu", 5.0));
        assert_eq!(point.values[1], NamedValue::new("mH", 127.5));
    }

    #[test]
    fn out_of_range_index_is_invalid() {
        let grid = Grid::new(vec![dim("a", 2), dim("b", 3)]).unwrap();
        assert!(matches!(grid.index_to_bins(6), Err(ScanError::InvalidArgument(_))));
        assert!(grid.point(100).is_err());
    }

    #[test]
    fn bins_to_index_validates_input() {
        let grid = Grid::new(vec![dim("a", 2), dim("b", 3)]).unwrap();
        assert!(grid.bins_to_index(&[0]).is_err());
        assert!(grid.bins_to_index(&[2, 0]).is_err());
        assert_eq!(grid.bins_to_index(&[1, 2]).unwrap(), 5);
    }

    #[test]
    fn locate_finds_containing_cell() {
        let grid = Grid::new(vec![dim("a", 5), dim("b", 2)]).unwrap();
        assert_eq!(grid.locate(&[5.0, 7.5]), Some(7));
        assert_eq!(grid.locate(&[11.0, 7.5]), None);
        assert_eq!(grid.locate(&[5.0]), None);
    }

    #[test]
    fn total_points_detects_overflow() {
        let dims: Vec<Dimension> = (0..3).map(|i| dim(&format!("p{i}"), u32::MAX)).collect();
        assert!(matches!(total_points(&dims), Err(ScanError::ArithmeticOverflow(_))));
        assert!(matches!(Grid::new(dims), Err(ScanError::ArithmeticOverflow(_))));
    }

    #[test]
    fn total_points_rejects_bad_dimensions() {
        assert!(matches!(total_points(&[]), Err(ScanError::InvalidArgument(_))));
        let bad = Dimension {
            name: "mu".into(),
            lower: 0.0,
            upper: 1.0,
            bins: 0,
        };
        assert!(matches!(total_points(&[bad]), Err(ScanError::InvalidArgument(_))));
    }
}
