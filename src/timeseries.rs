//! # Time Series Module
//!
//! Sample and dataset types shared by the parser, the smoother and the
//! navigation state.
//!
//! A `Dataset` is immutable once built. Clones share the same backing slice,
//! so handing a dataset to the session, the smoother or the exporter never
//! copies samples and never exposes a half-updated sequence.

use std::fmt;
use std::sync::Arc;

/// Time of one sample
#[derive(Debug, Clone, PartialEq)]
pub enum Timestamp {
    /// Absolute epoch milliseconds
    EpochMillis(i64),
    /// Zero-padded `HH:MM:SS.mmm` in the reference timezone
    WallClock(String),
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timestamp::EpochMillis(ms) => write!(f, "{}", ms),
            Timestamp::WallClock(label) => f.write_str(label),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub time: Timestamp,
    pub value: f64,
}

impl Sample {
    pub fn new(time: Timestamp, value: f64) -> Self {
        Self { time, value }
    }
}

/// Ordered samples of one fetch cycle, insertion order = time order
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    samples: Arc<[Sample]>,
}

impl Default for Dataset {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Dataset {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self {
            samples: Arc::from(samples),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn get(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    /// Samples in `[start, end)`, clamped to the dataset bounds
    pub fn slice(&self, start: usize, end: usize) -> &[Sample] {
        let end = end.min(self.samples.len());
        let start = start.min(end);
        &self.samples[start..end]
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.value)
    }
}

impl FromIterator<Sample> for Dataset {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

pub trait SampleSliceExt {
    fn min_max_value(&self) -> Option<(f64, f64)>;
    fn time_span(&self) -> Option<(&Timestamp, &Timestamp)>;
}

// Implement the trait for a slice of `Sample`
impl SampleSliceExt for [Sample] {
    fn min_max_value(&self) -> Option<(f64, f64)> {
        self.iter().fold(None, |acc, sample| match acc {
            None => Some((sample.value, sample.value)),
            Some((min, max)) => Some((min.min(sample.value), max.max(sample.value))),
        })
    }

    fn time_span(&self) -> Option<(&Timestamp, &Timestamp)> {
        match (self.first(), self.last()) {
            (Some(first), Some(last)) => Some((&first.time, &last.time)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(values: &[f64]) -> Dataset {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| Sample::new(Timestamp::EpochMillis(i as i64 * 2), v))
            .collect()
    }

    #[test]
    fn test_slice_is_clamped() {
        let ds = dataset(&[1.0, 2.0, 3.0]);
        assert_eq!(ds.slice(1, 10).len(), 2);
        assert!(ds.slice(5, 10).is_empty());
    }

    #[test]
    fn test_clones_share_samples() {
        let ds = dataset(&[1.0, 2.0]);
        let copy = ds.clone();
        assert!(std::ptr::eq(ds.samples().as_ptr(), copy.samples().as_ptr()));
    }

    #[test]
    fn test_min_max_value() {
        let ds = dataset(&[3.0, -1.5, 7.25]);
        assert_eq!(ds.samples().min_max_value(), Some((-1.5, 7.25)));
        assert_eq!(Dataset::default().samples().min_max_value(), None);
    }

    #[test]
    fn test_time_span_and_display() {
        let ds = dataset(&[0.0, 0.0, 0.0]);
        let (first, last) = ds.samples().time_span().unwrap();
        assert_eq!(first.to_string(), "0");
        assert_eq!(last.to_string(), "4");
        assert_eq!(Timestamp::WallClock("07:00:00.002".into()).to_string(), "07:00:00.002");
    }
}
