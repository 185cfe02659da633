//! # Smoothing Module
//!
//! Scalar Kalman-style estimator used to remove measurement noise from a dataset.
//!
//! The model is a random walk: the true value drifts with variance `q` per step
//! and every sample is observed with noise variance `r`. `p0` is the initial
//! uncertainty of the estimate, which starts at the first sample's value.
//!
//! `smooth` is a pure function of its inputs. Filtering an already smoothed
//! dataset is allowed and simply filters it again.

use crate::error::FilterParamsError;
use crate::timeseries::{Dataset, Sample};
use serde::{Deserialize, Serialize};

/// Tuning of the smoother (Q, R, P, K)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterParams {
    /// Process noise
    pub q: f64,
    /// Measurement noise, must be > 0
    pub r: f64,
    /// Initial estimate variance
    pub p0: f64,
    /// Initial gain, informational only
    pub k0: f64,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            q: 1.0,
            r: 1.0,
            p0: 1.0,
            k0: 1.0,
        }
    }
}

impl FilterParams {
    pub fn new(q: f64, r: f64, p0: f64, k0: f64) -> Result<Self, FilterParamsError> {
        let params = Self { q, r, p0, k0 };
        params.validate()?;
        Ok(params)
    }

    /// Reject parameters that would leak NaN or Infinity into the output
    pub fn validate(&self) -> Result<(), FilterParamsError> {
        for (name, value) in [("Q", self.q), ("R", self.r), ("P", self.p0), ("K", self.k0)] {
            if !value.is_finite() {
                return Err(FilterParamsError::NonFinite(name));
            }
        }
        if self.r <= 0.0 {
            return Err(FilterParamsError::NonPositiveMeasurementNoise(self.r));
        }
        if self.q < 0.0 {
            return Err(FilterParamsError::NegativeVariance("Q"));
        }
        if self.p0 < 0.0 {
            return Err(FilterParamsError::NegativeVariance("P"));
        }
        Ok(())
    }
}

/// Running state of one smoothing pass
#[derive(Debug, Clone, Copy)]
struct Estimator {
    x: f64,
    p: f64,
    q: f64,
    r: f64,
}

impl Estimator {
    fn new(initial: f64, params: &FilterParams) -> Self {
        Self {
            x: initial,
            p: params.p0,
            q: params.q,
            r: params.r,
        }
    }

    fn update(&mut self, measurement: f64) -> f64 {
        // Predict
        self.p += self.q;
        // Correct
        let gain = self.p / (self.p + self.r);
        self.x += gain * (measurement - self.x);
        self.p *= 1.0 - gain;
        self.x
    }
}

/// Smooth `dataset` with `params`, keeping every sample's time.
///
/// Callers are expected to pass validated parameters (see `FilterParams::validate`).
pub fn smooth(dataset: &Dataset, params: &FilterParams) -> Dataset {
    let initial = dataset.get(0).map(|s| s.value).unwrap_or(0.0);
    let mut estimator = Estimator::new(initial, params);

    dataset
        .iter()
        .map(|sample| Sample::new(sample.time.clone(), estimator.update(sample.value)))
        .collect()
}
