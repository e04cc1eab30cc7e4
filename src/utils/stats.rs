//! Streaming accumulation helpers
//!
//! Provides compensated (Neumaier) summation for reductions that walk entire
//! volumes. Plain `f64` accumulation drifts once hundreds of millions of
//! small terms are added to a large running total; the compensated form keeps
//! the error bounded independent of the number of terms.
//!
//! Reference:
//! Neumaier, A. (1974). "Rundungsfehleranalyse einiger Verfahren zur
//! Summation endlicher Summen." ZAMM 54(1), 39-51.
//! https://doi.org/10.1002/zamm.19740540106

/// Compensated running sum (Neumaier variant of Kahan summation)
///
/// Partial sums from independent workers can be combined with [`merge`],
/// so the accumulator works in a map-then-reduce pass: each chunk owns a
/// private `CompensatedSum`, and the reduce step merges them.
///
/// [`merge`]: CompensatedSum::merge
#[derive(Clone, Copy, Debug, Default)]
pub struct CompensatedSum {
    sum: f64,
    correction: f64,
}

impl CompensatedSum {
    /// Add a single term
    #[inline]
    pub fn add(&mut self, value: f64) {
        let t = self.sum + value;
        if self.sum.abs() >= value.abs() {
            self.correction += (self.sum - t) + value;
        } else {
            self.correction += (value - t) + self.sum;
        }
        self.sum = t;
    }

    /// Fold another partial sum into this one
    ///
    /// Merging is associative up to floating-point rounding, so the order in
    /// which chunk partials are combined does not change the result beyond
    /// the usual tolerance.
    #[inline]
    pub fn merge(&mut self, other: CompensatedSum) {
        self.add(other.sum);
        self.correction += other.correction;
    }

    /// Final value of the sum
    #[inline]
    pub fn value(&self) -> f64 {
        self.sum + self.correction
    }
}
