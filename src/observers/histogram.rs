use crate::error::{Error, Result};
use ordered_float::NotNan;
use std::ops::AddAssign;

/// Histogram summing weighted values per bin, with the sum of squares alongside.
///
/// `edges` are the lower limits of the bins. Slot 0 collects everything below the first
/// edge (underflow) and the last slot everything at or above the last edge (overflow),
/// so there are `edges.len() + 1` slots.
#[derive(Debug, Clone, PartialEq)]
pub struct SumHistogram {
    edges: Vec<NotNan<f64>>,
    sums: Vec<f64>,
    squares: Vec<f64>,
}

impl SumHistogram {
    /// Create from lower bin edges (sorted on construction).
    pub fn new(edges: &[f64]) -> Result<Self> {
        if edges.is_empty() {
            return Err(Error::InvalidParam("histogram needs at least one bin edge".into()));
        }
        let mut sorted = edges
            .iter()
            .map(|&e| {
                NotNan::new(e).map_err(|_| Error::InvalidParam("bin edge cannot be NaN".into()))
            })
            .collect::<Result<Vec<_>>>()?;
        sorted.sort();
        let slots = sorted.len() + 1;
        Ok(Self {
            edges: sorted,
            sums: vec![0.0; slots],
            squares: vec![0.0; slots],
        })
    }

    /// `nbins` equal-width bins starting at `min` with width `(max - min) / nbins`.
    pub fn uniform(min: f64, max: f64, nbins: usize) -> Result<Self> {
        if nbins == 0 {
            return Err(Error::InvalidParam("nbins must be > 0".into()));
        }
        if !min.is_finite() || !max.is_finite() || max <= min {
            return Err(Error::InvalidParam(format!(
                "histogram range [{min}, {max}) must be finite and non-empty"
            )));
        }
        let step = (max - min) / nbins as f64;
        let edges: Vec<f64> = (0..nbins).map(|i| min + step * i as f64).collect();
        Self::new(&edges)
    }

    /// Slot receiving `x` (0 = underflow).
    #[inline]
    pub fn slot(&self, x: f64) -> usize {
        self.edges.partition_point(|e| e.into_inner() <= x)
    }

    /// Add `value` to the bin containing `x`. NaN positions are ignored.
    pub fn add(&mut self, x: f64, value: f64) {
        if x.is_nan() {
            return;
        }
        let b = self.slot(x);
        self.sums[b] += value;
        self.squares[b] += value * value;
    }

    pub fn clear(&mut self) {
        self.sums.iter_mut().for_each(|v| *v = 0.0);
        self.squares.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Lower bin edges, without the implicit `-inf` of the underflow slot.
    pub fn edges(&self) -> Vec<f64> {
        self.edges.iter().map(|e| e.into_inner()).collect()
    }

    pub fn sums(&self) -> &[f64] {
        &self.sums
    }

    pub fn squares(&self) -> &[f64] {
        &self.squares
    }

    pub fn total(&self) -> f64 {
        self.sums.iter().sum()
    }

    /// Merge another histogram with identical edges.
    pub fn merge(&mut self, other: &SumHistogram) -> Result<()> {
        if self.edges != other.edges {
            return Err(Error::InvalidParam("histograms have different bins".into()));
        }
        *self += other;
        Ok(())
    }
}

impl AddAssign<&SumHistogram> for SumHistogram {
    /// Element-wise sum. Callers must ensure identical edges; see [`SumHistogram::merge`].
    fn add_assign(&mut self, other: &SumHistogram) {
        debug_assert!(self.edges == other.edges, "adding histograms with different bins");
        for (a, b) in self.sums.iter_mut().zip(&other.sums) {
            *a += b;
        }
        for (a, b) in self.squares.iter_mut().zip(&other.squares) {
            *a += b;
        }
    }
}
