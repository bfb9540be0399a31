//! Core layer - reader traits and fundamental types.
//!
//! This module provides:
//! - [`TimeSampling`] - Time sampling for animated properties
//! - [`Sampled`] - Property values over time
//! - [`CappedCache`] - Bounded, thread-safe cache for time-sampled values
//! - Abstract traits for opening and reading archives

mod time_sampling;
mod sample;
mod traits;
mod cache;

pub use time_sampling::{TimeSampling, TimeSamplingType};
pub use sample::{BoundsSample, Sampled, VisibilitySample};
pub use traits::{ArchiveOpener, ArchiveReader, ObjectReader, ObjectRef};
pub use cache::{CappedCache, CappedMap, SampleKey};
