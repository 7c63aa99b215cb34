//! Randomized search over boost weightings.
//!
//! Every trial samples each field's weight independently from its range and scores it with
//! the objective. The whole iteration budget always runs; the first weighting reaching the
//! highest score wins.

use crate::error::{CoreError, Result};
use crate::index::BoostWeights;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sampling range for one field's weight, bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ParamRange {
    /// Whole-number weights only.
    Int { min: u32, max: u32 },
    Float { min: f64, max: f64 },
}

impl ParamRange {
    pub fn float(min: f64, max: f64) -> Self {
        ParamRange::Float { min, max }
    }

    pub fn int(min: u32, max: u32) -> Self {
        ParamRange::Int { min, max }
    }

    fn validate(&self, field: &str) -> Result<()> {
        let ok = match *self {
            ParamRange::Int { min, max } => min <= max,
            ParamRange::Float { min, max } => min.is_finite() && max.is_finite() && min >= 0.0 && min <= max,
        };
        if ok {
            Ok(())
        } else {
            Err(CoreError::InvalidArgument(format!("range for `{field}` is malformed: {self:?}")))
        }
    }

    fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        match *self {
            ParamRange::Int { min, max } => f64::from(rng.gen_range(min..=max)),
            ParamRange::Float { min, max } if min == max => min,
            ParamRange::Float { min, max } => rng.gen_range(min..=max),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Optimization {
    pub best_weighting: BoostWeights,
    pub best_score: f64,
    pub trials: usize,
}

fn check_args(ranges: &BTreeMap<String, ParamRange>, iterations: usize) -> Result<()> {
    if iterations == 0 {
        return Err(CoreError::InvalidArgument("iterations must be at least 1".into()));
    }
    if ranges.is_empty() {
        return Err(CoreError::InvalidArgument("no parameter ranges given".into()));
    }
    for (field, range) in ranges {
        range.validate(field)?;
    }
    Ok(())
}

fn sample_weighting<R: Rng>(ranges: &BTreeMap<String, ParamRange>, rng: &mut R) -> Result<BoostWeights> {
    let mut weights = BoostWeights::uniform();
    for (field, range) in ranges {
        weights.insert(field.clone(), range.sample(rng))?;
    }
    Ok(weights)
}

/// NaN never beats anything.
fn sanitize(score: f64) -> f64 {
    if score.is_nan() {
        f64::NEG_INFINITY
    } else {
        score
    }
}

/// Keep the earliest of the highest-scoring trials.
fn pick_best(trials: impl IntoIterator<Item = (BoostWeights, f64)>) -> Option<(BoostWeights, f64)> {
    let mut best: Option<(BoostWeights, f64)> = None;
    for (weights, score) in trials {
        let better = match &best {
            None => true,
            Some((_, best_score)) => score > *best_score,
        };
        if better {
            best = Some((weights, score));
        }
    }
    best
}

/// Sample `iterations` weightings from `ranges`, calling `objective` once per trial.
///
/// Ranges are visited in field-name order, so a seeded `rng` reproduces the same trials.
pub fn optimize<F, R>(
    ranges: &BTreeMap<String, ParamRange>,
    mut objective: F,
    iterations: usize,
    rng: &mut R,
) -> Result<Optimization>
where
    F: FnMut(&BoostWeights) -> f64,
    R: Rng,
{
    try_optimize(ranges, |w| Ok::<_, CoreError>(objective(w)), iterations, rng)
}

/// Like [`optimize`], for objectives that can fail. The first error stops the search and is returned.
pub fn try_optimize<F, R, E>(
    ranges: &BTreeMap<String, ParamRange>,
    mut objective: F,
    iterations: usize,
    rng: &mut R,
) -> std::result::Result<Optimization, E>
where
    F: FnMut(&BoostWeights) -> std::result::Result<f64, E>,
    R: Rng,
    E: From<CoreError>,
{
    check_args(ranges, iterations)?;
    let mut trials = Vec::with_capacity(iterations);
    for trial in 0..iterations {
        let weights = sample_weighting(ranges, rng)?;
        let score = sanitize(objective(&weights)?);
        tracing::debug!(trial, score, "boost trial");
        trials.push((weights, score));
    }
    Ok(finish(trials)?)
}

/// Same trials as [`optimize`] for the same `rng` state, with objectives evaluated on the rayon pool.
pub fn optimize_parallel<F, R>(
    ranges: &BTreeMap<String, ParamRange>,
    objective: F,
    iterations: usize,
    rng: &mut R,
) -> Result<Optimization>
where
    F: Fn(&BoostWeights) -> f64 + Sync,
    R: Rng,
{
    try_optimize_parallel(ranges, |w| Ok::<_, CoreError>(objective(w)), iterations, rng)
}

/// Parallel [`try_optimize`]. Any failed trial fails the whole search.
pub fn try_optimize_parallel<F, R, E>(
    ranges: &BTreeMap<String, ParamRange>,
    objective: F,
    iterations: usize,
    rng: &mut R,
) -> std::result::Result<Optimization, E>
where
    F: Fn(&BoostWeights) -> std::result::Result<f64, E> + Sync,
    R: Rng,
    E: From<CoreError> + Send,
{
    check_args(ranges, iterations)?;
    let candidates = (0..iterations).map(|_| sample_weighting(ranges, rng)).collect::<Result<Vec<_>>>()?;
    let trials = candidates
        .into_par_iter()
        .map(|weights| {
            let score = sanitize(objective(&weights)?);
            Ok((weights, score))
        })
        .collect::<std::result::Result<Vec<(BoostWeights, f64)>, E>>()?;
    Ok(finish(trials)?)
}

fn finish(trials: Vec<(BoostWeights, f64)>) -> Result<Optimization> {
    let count = trials.len();
    let (best_weighting, best_score) =
        pick_best(trials).ok_or_else(|| CoreError::InvalidArgument("no trials were run".into()))?;
    tracing::info!(trials = count, best_score, "boost search finished");
    Ok(Optimization { best_weighting, best_score, trials: count })
}
