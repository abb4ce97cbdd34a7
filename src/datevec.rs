//! Dense time series over a contiguous range of calendar days
//!
//! Dates in this pipeline are proleptic Gregorian ordinals (the 1-based day
//! number starting at January 1 of year 1, e.g. 2012-10-21 is day 734797)
//! represented as plain integers. Parsing an integer is orders of magnitude
//! faster than parsing a date string, and we do it once per input row.

use crate::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Proleptic Gregorian ordinal of a calendar day
pub type Day = i32;

/// Render a day ordinal as an ISO date for diagnostics
pub fn day_to_iso(day: Day) -> String {
    NaiveDate::from_num_days_from_ce_opt(day)
        .map(|date| date.to_string())
        .unwrap_or_else(|| format!("day #{day}"))
}

/// Dense array of per-day values over a contiguous day range
///
/// `values[i]` holds the value for day `first_day + i`. Storing a dense
/// array rather than a day->value map trades memory for O(1) aligned
/// elementwise arithmetic, which the correlation sweep relies on heavily.
/// Series use an `f32` payload (space efficiency over precision, the corpus
/// can hold millions of n-grams), sufficiency masks a `bool` payload.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DateVector<T> {
    /// Day ordinal that `values[0]` refers to
    first_day: Day,

    /// One value per day, starting at `first_day`
    values: Box<[T]>,
}
//
impl<T> DateVector<T> {
    /// Wrap an existing per-day value sequence
    ///
    /// Fails on an empty sequence: a vector with no days has no meaningful
    /// bounds and nothing downstream can align against it.
    pub fn from_values(first_day: Day, values: impl Into<Box<[T]>>) -> Result<Self> {
        let values = values.into();
        anyhow::ensure!(
            !values.is_empty(),
            "date vector starting {} must cover at least one day",
            day_to_iso(first_day)
        );
        Ok(Self { first_day, values })
    }

    /// First day covered by this vector
    pub fn first_day(&self) -> Day {
        self.first_day
    }

    /// Last day covered by this vector (inclusive)
    pub fn last_day(&self) -> Day {
        self.first_day + self.values.len() as Day - 1
    }

    /// Number of days covered
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Day ordinal corresponding to array index `i`
    pub fn date(&self, i: usize) -> Day {
        debug_assert!(i < self.values.len(), "index beyond the covered range");
        self.first_day + i as Day
    }

    /// Truth that two vectors cover exactly the same day range
    pub fn bounds_eq<U>(&self, other: &DateVector<U>) -> bool {
        self.first_day == other.first_day && self.values.len() == other.values.len()
    }

    /// Value recorded for an absolute day ordinal, if covered
    pub fn get(&self, day: Day) -> Option<&T> {
        let idx = usize::try_from(day - self.first_day).ok()?;
        self.values.get(idx)
    }

    /// Record a value for an absolute day ordinal
    ///
    /// Out-of-range days are a contract violation, and we fail fast on them.
    pub fn set(&mut self, day: Day, value: T) {
        let idx = usize::try_from(day - self.first_day)
            .ok()
            .filter(|&idx| idx < self.values.len());
        let Some(idx) = idx else {
            panic!(
                "day {} is outside the covered range {}..={}",
                day_to_iso(day),
                day_to_iso(self.first_day),
                day_to_iso(self.last_day()),
            );
        };
        self.values[idx] = value;
    }

    /// Per-day values in day order
    pub fn values(&self) -> &[T] {
        &self.values
    }
}
//
impl<T: Copy + Default> DateVector<T> {
    /// All-default vector over `[first_day, last_day]`
    pub fn zeros(first_day: Day, last_day: Day) -> Result<Self> {
        anyhow::ensure!(
            first_day <= last_day,
            "invalid day range: {} comes after {}",
            day_to_iso(first_day),
            day_to_iso(last_day),
        );
        let len = (last_day - first_day + 1) as usize;
        Ok(Self {
            first_day,
            values: vec![T::default(); len].into(),
        })
    }

    /// Extend the covered range to the union of `self`'s and `other`'s
    ///
    /// Original values keep their days, newly covered days at either end are
    /// default-filled. Idempotent when `other`'s range is already contained
    /// in `self`'s (the result is then a plain copy of `self`).
    pub fn grow_to<U>(&self, other: &DateVector<U>) -> Self {
        let first_day = self.first_day.min(other.first_day);
        let last_day = self.last_day().max(other.last_day());
        let mut values = vec![T::default(); (last_day - first_day + 1) as usize];
        let offset = (self.first_day - first_day) as usize;
        values[offset..offset + self.values.len()].copy_from_slice(&self.values);
        Self {
            first_day,
            values: values.into(),
        }
    }
}
//
impl<T: Copy> DateVector<T> {
    /// Restrict coverage to the day range of `other`
    ///
    /// Inverse of [`DateVector::grow_to`]: `other`'s range must be contained
    /// in `self`'s, and the values it covers are kept unchanged.
    pub fn shrink_to<U>(&self, other: &DateVector<U>) -> Result<Self> {
        anyhow::ensure!(
            self.first_day <= other.first_day && other.last_day() <= self.last_day(),
            "cannot shrink {}..={} to the larger range {}..={}",
            day_to_iso(self.first_day),
            day_to_iso(self.last_day()),
            day_to_iso(other.first_day),
            day_to_iso(other.last_day()),
        );
        let offset = (other.first_day - self.first_day) as usize;
        Ok(Self {
            first_day: other.first_day,
            values: self.values[offset..offset + other.len()].to_vec().into(),
        })
    }
}
//
impl DateVector<f32> {
    /// Rescale against a reference series covering the exact same day range
    ///
    /// Computes `self / reference * parts_per` elementwise, e.g. a
    /// parts-per-million rate for `parts_per = 1e6`. The caller is expected
    /// to `grow_to` the reference's range first; a bounds mismatch means
    /// that didn't happen and is rejected.
    pub fn normalize(&self, reference: &Self, parts_per: f32) -> Result<Self> {
        anyhow::ensure!(
            self.bounds_eq(reference),
            "cannot normalize {}..={} against reference covering {}..={}",
            day_to_iso(self.first_day),
            day_to_iso(self.last_day()),
            day_to_iso(reference.first_day),
            day_to_iso(reference.last_day()),
        );
        let values = (self.values.iter())
            .zip(reference.values.iter())
            .map(|(&value, &total)| value / total * parts_per)
            .collect::<Box<[f32]>>();
        Ok(Self {
            first_day: self.first_day,
            values,
        })
    }

    /// Smallest per-day value
    pub fn min(&self) -> f32 {
        self.values.iter().copied().fold(f32::INFINITY, f32::min)
    }

    /// Largest per-day value
    pub fn max(&self) -> f32 {
        (self.values.iter().copied()).fold(f32::NEG_INFINITY, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeros_covers_inclusive_range() {
        let v = DateVector::<f32>::zeros(734797, 734799).unwrap();
        assert_eq!(v.first_day(), 734797);
        assert_eq!(v.last_day(), 734799);
        assert_eq!(v.len(), 3);
        assert_eq!(v.date(2), 734799);
        assert!(v.values().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn zeros_accepts_single_day_rejects_reversed_range() {
        assert_eq!(DateVector::<f32>::zeros(100, 100).unwrap().len(), 1);
        assert!(DateVector::<f32>::zeros(101, 100).is_err());
    }

    #[test]
    fn set_and_get_use_absolute_days() {
        let mut v = DateVector::<f32>::zeros(734797, 734799).unwrap();
        v.set(734799, 2.0);
        assert_eq!(v.get(734799), Some(&2.0));
        assert_eq!(v.get(734796), None);
        assert_eq!(v.get(734800), None);
    }

    #[test]
    #[should_panic(expected = "outside the covered range")]
    fn set_out_of_range_fails_fast() {
        let mut v = DateVector::<f32>::zeros(100, 102).unwrap();
        v.set(99, 1.0);
    }

    #[test]
    fn grow_to_preserves_values_and_zero_fills() {
        let v = DateVector::from_values(10, vec![1.0f32, 2.0]).unwrap();
        let wider = DateVector::<f32>::zeros(8, 13).unwrap();
        let grown = v.grow_to(&wider);
        assert_eq!(grown.first_day(), 8);
        assert_eq!(grown.last_day(), 13);
        assert_eq!(grown.values(), &[0.0, 0.0, 1.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn grow_to_is_idempotent() {
        let v = DateVector::from_values(10, vec![1.0f32, 2.0]).unwrap();
        let wider = DateVector::<f32>::zeros(5, 15).unwrap();
        let once = v.grow_to(&wider);
        let twice = once.grow_to(&wider);
        assert_eq!(once, twice);
    }

    #[test]
    fn grow_to_contained_range_is_a_copy() {
        let v = DateVector::from_values(10, vec![1.0f32, 2.0, 3.0]).unwrap();
        let inner = DateVector::<f32>::zeros(11, 11).unwrap();
        assert_eq!(v.grow_to(&inner), v);
    }

    #[test]
    fn shrink_to_keeps_the_covered_values() {
        let v = DateVector::from_values(8, vec![0.0f32, 0.0, 1.0, 2.0, 0.0, 0.0]).unwrap();
        let window = DateVector::<f32>::zeros(10, 11).unwrap();
        let shrunk = v.shrink_to(&window).unwrap();
        assert_eq!(shrunk.first_day(), 10);
        assert_eq!(shrunk.values(), &[1.0, 2.0]);
    }

    #[test]
    fn shrink_to_inverts_grow_to() {
        let v = DateVector::from_values(10, vec![1.0f32, 2.0]).unwrap();
        let wider = DateVector::<f32>::zeros(5, 15).unwrap();
        assert_eq!(v.grow_to(&wider).shrink_to(&v).unwrap(), v);
    }

    #[test]
    fn shrink_to_rejects_uncovered_ranges() {
        let v = DateVector::from_values(10, vec![1.0f32, 2.0]).unwrap();
        let wider = DateVector::<f32>::zeros(5, 15).unwrap();
        assert!(v.shrink_to(&wider).is_err());
    }

    #[test]
    fn normalize_requires_equal_bounds() {
        let v = DateVector::from_values(10, vec![1.0f32, 2.0]).unwrap();
        let reference = DateVector::from_values(10, vec![10.0f32, 10.0, 10.0]).unwrap();
        assert!(v.normalize(&reference, 1e6).is_err());
    }

    #[test]
    fn normalize_roundtrips_within_tolerance() {
        let v = DateVector::from_values(10, vec![3.0f32, 7.0, 0.5]).unwrap();
        let reference = DateVector::from_values(10, vec![200.0f32, 1000.0, 40.0]).unwrap();
        let rate = v.normalize(&reference, 1e6).unwrap();
        for ((&orig, &ppm), &total) in (v.values().iter())
            .zip(rate.values())
            .zip(reference.values())
        {
            let recovered = ppm * total / 1e6;
            assert!((recovered - orig).abs() <= orig.abs() * 1e-5);
        }
    }

    #[test]
    fn min_max_scan_all_days() {
        let v = DateVector::from_values(10, vec![3.0f32, -2.0, 7.0]).unwrap();
        assert_eq!(v.min(), -2.0);
        assert_eq!(v.max(), 7.0);
    }

    #[test]
    fn day_ordinals_match_the_proleptic_calendar() {
        // 2012-10-21 is day 734797
        assert_eq!(day_to_iso(734797), "2012-10-21");
        assert_eq!(day_to_iso(1), "0001-01-01");
    }
}
