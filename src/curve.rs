// 2.0: yield curves. each offer carries one. maps "ticks until due date" to the
// total rate for the term, so FV = amount * (1 + rate).

use crate::types::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YieldCurve {
    // relative ticks, strictly ascending
    time_buckets: Vec<i64>,
    rates: Vec<Decimal>,
}

impl YieldCurve {
    pub fn new(time_buckets: Vec<i64>, rates: Vec<Decimal>) -> Result<Self, CurveError> {
        if time_buckets.is_empty() {
            return Err(CurveError::Empty);
        }
        if time_buckets.len() != rates.len() {
            return Err(CurveError::LengthMismatch {
                buckets: time_buckets.len(),
                rates: rates.len(),
            });
        }
        if time_buckets.windows(2).any(|w| w[0] >= w[1]) {
            return Err(CurveError::Unsorted);
        }
        Ok(Self { time_buckets, rates })
    }

    pub fn flat(rate: Decimal, time_buckets: impl IntoIterator<Item = i64>) -> Self {
        let time_buckets: Vec<i64> = time_buckets.into_iter().collect();
        let rates = vec![rate; time_buckets.len()];
        Self { time_buckets, rates }
    }

    pub fn time_buckets(&self) -> &[i64] {
        &self.time_buckets
    }

    pub fn rates(&self) -> &[Decimal] {
        &self.rates
    }

    /// Rate for a loan maturing at `due_date` when originated at `now`.
    ///
    /// Returns `None` when the due date is not in the future or the remaining
    /// time falls outside the curve's bucket range.
    pub fn rate_at(&self, now: Timestamp, due_date: Timestamp) -> Option<Decimal> {
        let delta = now.ticks_until(&due_date);
        if delta <= 0 {
            return None;
        }
        let first = *self.time_buckets.first()?;
        let last = *self.time_buckets.last()?;
        if delta < first || delta > last {
            return None;
        }

        // index of the last bucket <= delta
        let lo = self.time_buckets.partition_point(|&t| t <= delta) - 1;
        let (x0, y0) = (self.time_buckets[lo], self.rates[lo]);
        if x0 == delta {
            return Some(y0);
        }
        let (x1, y1) = (self.time_buckets[lo + 1], self.rates[lo + 1]);
        let weight = Decimal::from(delta - x0) / Decimal::from(x1 - x0);
        Some(y0 + (y1 - y0) * weight)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CurveError {
    #[error("Yield curve needs at least one bucket")]
    Empty,

    #[error("Yield curve has {buckets} buckets but {rates} rates")]
    LengthMismatch { buckets: usize, rates: usize },

    #[error("Yield curve buckets must be strictly ascending")]
    Unsorted,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn flat_curve_inside_range() {
        let curve = YieldCurve::flat(dec!(0.03), 0..12);
        assert_eq!(curve.rate_at(Timestamp(0), Timestamp(6)), Some(dec!(0.03)));
        assert_eq!(curve.rate_at(Timestamp(0), Timestamp(11)), Some(dec!(0.03)));
    }

    #[test]
    fn outside_range_not_found() {
        let curve = YieldCurve::new(vec![3, 8], vec![dec!(0.03), dec!(0.03)]).unwrap();
        assert_eq!(curve.rate_at(Timestamp(0), Timestamp(2)), None);
        assert_eq!(curve.rate_at(Timestamp(0), Timestamp(9)), None);
        assert_eq!(curve.rate_at(Timestamp(0), Timestamp(5)), Some(dec!(0.03)));
    }

    #[test]
    fn past_due_date_not_found() {
        let curve = YieldCurve::flat(dec!(0.03), 0..12);
        assert_eq!(curve.rate_at(Timestamp(4), Timestamp(4)), None);
        assert_eq!(curve.rate_at(Timestamp(4), Timestamp(3)), None);
    }

    #[test]
    fn linear_interpolation_uses_relative_time() {
        let curve = YieldCurve::new(vec![2, 6], vec![dec!(0.02), dec!(0.06)]).unwrap();
        // now=10, due=14 → 4 ticks → halfway
        assert_eq!(curve.rate_at(Timestamp(10), Timestamp(14)), Some(dec!(0.04)));
        assert_eq!(curve.rate_at(Timestamp(10), Timestamp(12)), Some(dec!(0.02)));
        assert_eq!(curve.rate_at(Timestamp(10), Timestamp(16)), Some(dec!(0.06)));
    }

    #[test]
    fn invalid_curves_rejected() {
        assert_eq!(YieldCurve::new(vec![], vec![]), Err(CurveError::Empty));
        assert!(matches!(
            YieldCurve::new(vec![1, 2], vec![dec!(0.1)]),
            Err(CurveError::LengthMismatch { .. })
        ));
        assert_eq!(
            YieldCurve::new(vec![3, 3], vec![dec!(0.1), dec!(0.2)]),
            Err(CurveError::Unsorted)
        );
    }
}
