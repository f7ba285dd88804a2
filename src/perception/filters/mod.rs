//! Weighting and resampling primitives for the particle filter

use crate::common::Pose;
use crate::perception::sensors::Scan;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// How headings are averaged into the pose estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadingMean {
    /// Weighted arithmetic mean of raw headings
    ///
    /// Headings straddling the wrap point average badly: 359° and 1° give 180°.
    Linear,
    /// Weighted mean of unit vectors
    Circular,
}

/// Log of the normal density `N(x; mean, std)`
pub fn gaussian_log_pdf(x: f64, mean: f64, std: f64) -> f64 {
    let z = (x - mean) / std;
    -0.5 * z * z - (std * TAU.sqrt()).ln()
}

/// Log-likelihood of an observed scan given an expected one, beams independent
///
/// Beams the observed scan marks as empty contribute nothing.
pub fn scan_log_likelihood(observed: &Scan, expected: &[f64], std: f64) -> f64 {
    observed
        .valid_ranges()
        .filter_map(|(i, o)| expected.get(i).map(|&e| gaussian_log_pdf(o, e, std)))
        .sum()
}

/// Scale weights to sum to one, returning the sum before scaling
///
/// A zero or non-finite sum resets the weights to uniform.
pub fn normalize_weights(weights: &mut [f64]) -> f64 {
    let total: f64 = weights.iter().sum();
    if total > 0.0 && total.is_finite() {
        weights.iter_mut().for_each(|w| *w /= total);
    } else if !weights.is_empty() {
        let uniform = 1.0 / weights.len() as f64;
        weights.iter_mut().for_each(|w| *w = uniform);
    }
    total
}

/// Weighted mean pose; weights must be normalized
pub fn weighted_mean<'a, I>(particles: I, heading_mean: HeadingMean) -> Pose
where
    I: IntoIterator<Item = (&'a Pose, f64)>,
{
    let mut x = 0.0;
    let mut y = 0.0;
    let mut theta = 0.0;
    let mut sin = 0.0;
    let mut cos = 0.0;

    for (pose, w) in particles {
        x += w * pose.x;
        y += w * pose.y;
        theta += w * pose.theta;
        sin += w * pose.theta.sin();
        cos += w * pose.theta.cos();
    }

    let theta = match heading_mean {
        HeadingMean::Linear => theta,
        HeadingMean::Circular => sin.atan2(cos),
    };
    Pose::new(x, y, theta)
}

/// Weighted variance of positions about `mean`, averaged over both axes
pub fn weighted_position_variance<'a, I>(particles: I, mean: &Pose) -> f64
where
    I: IntoIterator<Item = (&'a Pose, f64)>,
{
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    let mut total = 0.0;

    for (pose, w) in particles {
        var_x += w * (pose.x - mean.x).powi(2);
        var_y += w * (pose.y - mean.y).powi(2);
        total += w;
    }

    if total > 0.0 {
        (var_x + var_y) / (2.0 * total)
    } else {
        0.0
    }
}

/// Stratified resampling
///
/// Splits `[0, 1)` into `count` equal strata and draws one uniform point in
/// each, returning the index whose cumulative weight covers it. Weights must be
/// normalized. `count` may differ from `weights.len()`: exactly `count` strata
/// are drawn, so a shrinking population is not the first few draws of a larger
/// one and a growing population stays spread over the whole weight mass.
pub fn stratified_resample<R: Rng + ?Sized>(
    weights: &[f64],
    count: usize,
    rng: &mut R,
) -> Vec<usize> {
    if weights.is_empty() {
        return Vec::new();
    }

    let mut indices = Vec::with_capacity(count);
    let last = weights.len() - 1;
    let mut cumulative = weights[0];
    let mut j = 0;

    for i in 0..count {
        let u = (i as f64 + rng.gen::<f64>()) / count as f64;
        while cumulative < u && j < last {
            j += 1;
            cumulative += weights[j];
        }
        indices.push(j);
    }

    indices
}
