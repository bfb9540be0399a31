//! Sampled property storage and the per-time values read from it.

use crate::core::TimeSampling;
use crate::geom::ObjectVisibility;
use crate::util::{BBox3d, Chrono};

/// Visibility read at one time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VisibilitySample {
    pub value: ObjectVisibility,
    /// Whether the property has a single sample for all time.
    pub is_constant: bool,
}

/// Bounds read at one time, in the node's local space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundsSample {
    pub bbox: BBox3d,
    /// Whether the property has a single sample for all time.
    pub is_constant: bool,
}

/// Values of one property over time.
#[derive(Clone, Debug, PartialEq)]
pub struct Sampled<T> {
    /// When each value was recorded.
    pub time_sampling: TimeSampling,
    /// One value per sample, in time order.
    pub values: Vec<T>,
}

impl<T> Sampled<T> {
    /// A single value valid for all time.
    pub fn constant(value: T) -> Self {
        Self {
            time_sampling: TimeSampling::IDENTITY,
            values: vec![value],
        }
    }

    /// Values recorded at explicit, increasing times.
    pub fn at_times(times: Vec<Chrono>, values: Vec<T>) -> Self {
        if values.len() <= 1 {
            return Self { time_sampling: TimeSampling::IDENTITY, values };
        }
        Self {
            time_sampling: TimeSampling::acyclic(times),
            values,
        }
    }

    /// Number of samples.
    #[inline]
    pub fn num_samples(&self) -> usize {
        self.values.len()
    }

    /// Constant properties have at most one sample.
    #[inline]
    pub fn is_constant(&self) -> bool {
        self.values.len() <= 1
    }

    /// Value at or before `time`, clamped to the sampled range.
    pub fn value_at(&self, time: Chrono) -> Option<&T> {
        let (index, _) = self.time_sampling.floor_index(time, self.values.len());
        self.values.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant() {
        let s = Sampled::constant(5);
        assert!(s.is_constant());
        assert_eq!(s.value_at(-100.0), Some(&5));
        assert_eq!(s.value_at(100.0), Some(&5));
    }

    #[test]
    fn test_at_times() {
        let s = Sampled::at_times(vec![0.0, 1.0, 2.0], vec!['a', 'b', 'c']);
        assert!(!s.is_constant());
        assert_eq!(s.value_at(-1.0), Some(&'a'));
        assert_eq!(s.value_at(1.5), Some(&'b'));
        assert_eq!(s.value_at(2.0), Some(&'c'));
        assert_eq!(s.value_at(8.0), Some(&'c'));
    }

    #[test]
    fn test_single_timed_sample_is_constant() {
        let s = Sampled::at_times(vec![3.0], vec![1]);
        assert!(s.is_constant());
        assert!(s.time_sampling.is_identity());
    }

    #[test]
    fn test_empty() {
        let s: Sampled<i32> = Sampled::at_times(Vec::new(), Vec::new());
        assert_eq!(s.value_at(0.0), None);
    }
}
