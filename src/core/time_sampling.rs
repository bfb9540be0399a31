//! Time sampling for animated node properties.
//!
//! Every sampled property carries a [`TimeSampling`] describing when each of
//! its samples was recorded. Lookups snap a query time to the sample at or
//! before it.

use crate::util::Chrono;

/// Type of time sampling.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum TimeSamplingType {
    /// Single static sample at time 0.
    #[default]
    Identity,

    /// Uniform sampling: `start_time + index * time_per_cycle`.
    Uniform {
        time_per_cycle: Chrono,
        start_time: Chrono,
    },

    /// Acyclic sampling: explicit, increasing time for each sample.
    Acyclic {
        times: Vec<Chrono>,
    },
}

/// Time sampling information for a property.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeSampling {
    /// The type of sampling.
    pub sampling_type: TimeSamplingType,
}

impl TimeSampling {
    /// Identity time sampling (single sample at time 0).
    pub const IDENTITY: Self = Self {
        sampling_type: TimeSamplingType::Identity,
    };

    /// Create uniform time sampling.
    pub fn uniform(time_per_cycle: Chrono, start_time: Chrono) -> Self {
        Self {
            sampling_type: TimeSamplingType::Uniform {
                time_per_cycle,
                start_time,
            },
        }
    }

    /// Create acyclic time sampling from explicit times.
    pub fn acyclic(times: Vec<Chrono>) -> Self {
        Self {
            sampling_type: TimeSamplingType::Acyclic { times },
        }
    }

    /// Check if this is identity (static) sampling.
    #[inline]
    pub fn is_identity(&self) -> bool {
        matches!(self.sampling_type, TimeSamplingType::Identity)
    }

    /// Get the time for a specific sample index.
    pub fn sample_time(&self, index: usize) -> Chrono {
        match &self.sampling_type {
            TimeSamplingType::Identity => 0.0,
            TimeSamplingType::Uniform { time_per_cycle, start_time } => {
                *start_time + (index as Chrono) * *time_per_cycle
            }
            TimeSamplingType::Acyclic { times } => {
                times.get(index).copied().unwrap_or(0.0)
            }
        }
    }

    /// Find the floor index (largest index with time <= given time).
    ///
    /// Times before the first sample clamp to index 0, times after the last
    /// clamp to `num_samples - 1`.
    pub fn floor_index(&self, time: Chrono, num_samples: usize) -> (usize, Chrono) {
        if num_samples == 0 {
            return (0, 0.0);
        }

        match &self.sampling_type {
            TimeSamplingType::Identity => (0, 0.0),
            TimeSamplingType::Uniform { time_per_cycle, start_time } => {
                if time <= *start_time || *time_per_cycle <= 0.0 {
                    return (0, *start_time);
                }
                let idx = ((time - start_time) / time_per_cycle).floor() as usize;
                let idx = idx.min(num_samples - 1);
                (idx, self.sample_time(idx))
            }
            TimeSamplingType::Acyclic { .. } => {
                // Binary search for floor
                let mut lo = 0;
                let mut hi = num_samples;
                while lo < hi {
                    let mid = lo + (hi - lo) / 2;
                    if self.sample_time(mid) <= time {
                        lo = mid + 1;
                    } else {
                        hi = mid;
                    }
                }
                let idx = lo.saturating_sub(1);
                (idx, self.sample_time(idx))
            }
        }
    }

    /// Time of the first sample.
    #[inline]
    pub fn start_time(&self) -> Chrono {
        self.sample_time(0)
    }

    /// Time of the last of `num_samples` samples.
    #[inline]
    pub fn end_time(&self, num_samples: usize) -> Chrono {
        self.sample_time(num_samples.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_sampling() {
        let ts = TimeSampling::uniform(1.0 / 24.0, 0.0); // 24 fps

        assert_eq!(ts.sample_time(0), 0.0);
        assert!((ts.sample_time(24) - 1.0).abs() < 1e-10);
        assert!((ts.end_time(49) - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_acyclic_floor() {
        let ts = TimeSampling::acyclic(vec![0.0, 0.5, 1.0, 2.0]);

        assert_eq!(ts.floor_index(-1.0, 4).0, 0);
        assert_eq!(ts.floor_index(0.7, 4), (1, 0.5));
        assert_eq!(ts.floor_index(1.0, 4), (2, 1.0));
        assert_eq!(ts.floor_index(9.0, 4), (3, 2.0));
    }

    #[test]
    fn test_uniform_floor() {
        let ts = TimeSampling::uniform(1.0, 0.0);

        assert_eq!(ts.floor_index(0.5, 10).0, 0);
        assert_eq!(ts.floor_index(1.5, 10).0, 1);
        assert_eq!(ts.floor_index(50.0, 10).0, 9);
    }

    #[test]
    fn test_identity() {
        assert!(TimeSampling::IDENTITY.is_identity());
        assert_eq!(TimeSampling::IDENTITY.floor_index(7.0, 1), (0, 0.0));
    }
}
