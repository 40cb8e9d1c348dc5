//! Candidate-split scoring: partition, bin, optimize, and rank.

use std::collections::HashSet;

use parking_lot::Mutex;

use crate::collector::SectorCollector;
use crate::dataset::{Dataset, PredictedLabel};
use crate::errors::TrainError;
use crate::learner::config::{FeatureSelectionStrategy, TrainConfig};
use crate::learner::context::BagHolder;
use crate::learner::task_runner::{Task, TaskRunner};
use crate::loss::{GrowthPenalty, LogLoss, Objective, SectorGroup, SumObjective};
use crate::optim::{minimize, Minimum};

/// Gains closer than this are one tie-class; gains at or below it are
/// treated as non-improving.
pub(crate) const GAIN_EPS: f64 = 1e-9;

/// Radius of the leaf-delta growth penalty; the training alpha scales its
/// weight.
const GROWTH_RADIUS: f64 = 1.0;

/// A scored candidate: the split parameters fitted on the primary bag and
/// the (possibly hold-out discounted) gain used for ranking.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SplitChoice {
    pub feature_id: u32,
    pub gain: f64,
    /// Shared offset `b*`, folded into the split node's delta.
    pub offset: f64,
    /// Signed half-delta `d*`: the yes child starts at `+d`, the no child
    /// at `-d`.
    pub delta: f64,
}

/// Every feature present (with a nonzero value) in at least one of the
/// given working sets, minus the ones already on the path.
pub(crate) fn features_under(
    parts: &[Dataset<PredictedLabel>],
    skip: &HashSet<u32>,
) -> Vec<u32> {
    let mut seen = HashSet::new();
    for part in parts {
        for group in &part.groups {
            for row in &group.rows {
                for &(feature_id, value) in row.features.iter() {
                    if value != 0 && !skip.contains(&feature_id) {
                        seen.insert(feature_id);
                    }
                }
            }
        }
    }
    let mut features: Vec<u32> = seen.into_iter().collect();
    features.sort_unstable();
    features
}

/// Fits the shared offset of a leaf over its working set: a one-variable
/// run of the optimizer against plain logloss.
pub(crate) fn fit_offset(
    part: &Dataset<PredictedLabel>,
    background: f64,
) -> Result<Minimum, TrainError> {
    let mut collector = SectorCollector::start(0, background);
    for group in &part.groups {
        collector.add(0, &group.label, group.rows.len() as u64);
    }
    let groups = collector.finalize();

    let minimum = minimize(&LogLoss::new(&groups), 1);
    if !minimum.is_finite() {
        return Err(TrainError::NumericFailure);
    }
    Ok(minimum)
}

fn collect_split(
    yes: &Dataset<PredictedLabel>,
    no: &Dataset<PredictedLabel>,
    background: f64,
) -> Vec<SectorGroup> {
    let mut collector = SectorCollector::start(1, background);
    for group in &yes.groups {
        collector.add(1, &group.label, group.rows.len() as u64);
    }
    for group in &no.groups {
        collector.add(0, &group.label, group.rows.len() as u64);
    }
    collector.finalize()
}

/// Scores one candidate on one bag. Returns `(gain, offset, delta)`; the
/// gain includes recursively-scored look-ahead levels below `depth` 1.
fn score_on_bag(
    feature_id: u32,
    part: &Dataset<PredictedLabel>,
    bag: &BagHolder,
    background: f64,
    alpha: f64,
    depth: u32,
    skip: &HashSet<u32>,
) -> Result<(f64, f64, f64), TrainError> {
    if part.is_empty() {
        return Ok((0.0, 0.0, 0.0));
    }

    let (yes, no) = match bag.index.rows_with(feature_id) {
        Some(feature_rows) => Dataset::cross(part, feature_rows),
        None => return Ok((0.0, 0.0, 0.0)),
    };
    // A one-sided partition cannot improve on the leaf's fitted offset.
    if yes.is_empty() || no.is_empty() {
        return Ok((0.0, 0.0, 0.0));
    }

    let groups = collect_split(&yes, &no, background);
    let fused = SumObjective::new(
        LogLoss::new(&groups),
        GrowthPenalty::new(GROWTH_RADIUS, alpha),
    );

    let mut scratch = vec![0.0; 2];
    let before = fused.eval_with_gradient(&mut scratch, &[0.0, 0.0]);
    let minimum = minimize(&fused, 2);
    if !minimum.is_finite() {
        return Err(TrainError::NumericFailure);
    }

    let offset = minimum.vars[0];
    let delta = minimum.vars[1];
    let mut gain = before - minimum.value;

    if depth > 1 {
        let mut deeper_skip = skip.clone();
        deeper_skip.insert(feature_id);
        gain += best_child_gain(&yes, bag, background + offset + delta, alpha, depth - 1, &deeper_skip)?;
        gain += best_child_gain(&no, bag, background + offset - delta, alpha, depth - 1, &deeper_skip)?;
    }

    Ok((gain, offset, delta))
}

/// The best achievable gain of any single split of `side`, floored at zero.
fn best_child_gain(
    side: &Dataset<PredictedLabel>,
    bag: &BagHolder,
    background: f64,
    alpha: f64,
    depth: u32,
    skip: &HashSet<u32>,
) -> Result<f64, TrainError> {
    let mut best = 0.0;
    for feature_id in features_under(std::slice::from_ref(side), skip) {
        let (gain, _, _) = score_on_bag(feature_id, side, bag, background, alpha, depth, skip)?;
        if gain > best {
            best = gain;
        }
    }
    Ok(best)
}

/// Scores one candidate across bags: fit on the primary bag, then discount
/// by the regret against the hold-out bags' independently fitted gains.
pub(crate) fn score_feature(
    feature_id: u32,
    parts: &[Dataset<PredictedLabel>],
    bags: &[BagHolder],
    background: f64,
    skip: &HashSet<u32>,
    config: &TrainConfig,
) -> Result<SplitChoice, TrainError> {
    let (fit_gain, offset, delta) = score_on_bag(
        feature_id,
        &parts[0],
        &bags[0],
        background,
        config.alpha(),
        config.check_depth(),
        skip,
    )?;

    let mut gain = fit_gain;
    let holdouts = (config.gain_check_bags() as usize).min(bags.len() - 1);
    if holdouts > 0 {
        let mut holdout_sum = 0.0;
        for bag_idx in 1..=holdouts {
            let (holdout_gain, _, _) = score_on_bag(
                feature_id,
                &parts[bag_idx],
                &bags[bag_idx],
                background,
                config.alpha(),
                config.check_depth(),
                skip,
            )?;
            holdout_sum += holdout_gain;
        }
        let regret = (fit_gain - holdout_sum / holdouts as f64).max(0.0);
        gain = fit_gain - regret;
    }

    Ok(SplitChoice {
        feature_id,
        gain,
        offset,
        delta,
    })
}

/// Scores every candidate feature of a leaf, fanning the work out over the
/// task runner, and returns the choices sorted by gain (ties by lower id).
pub(crate) fn score_leaf(
    parts: &[Dataset<PredictedLabel>],
    bags: &[BagHolder],
    background: f64,
    skip: &HashSet<u32>,
    config: &TrainConfig,
    runner: &dyn TaskRunner,
) -> Result<Vec<SplitChoice>, TrainError> {
    let candidates = features_under(parts, skip);
    let results: Mutex<Vec<Result<SplitChoice, TrainError>>> =
        Mutex::new(Vec::with_capacity(candidates.len()));

    let tasks: Vec<Task> = candidates
        .into_iter()
        .map(|feature_id| {
            let results = &results;
            Box::new(move || {
                let choice = score_feature(feature_id, parts, bags, background, skip, config);
                results.lock().push(choice);
            }) as Task
        })
        .collect();

    runner.run_all(tasks)?;

    let mut choices = Vec::new();
    for result in results.into_inner() {
        choices.push(result?);
    }
    choices.sort_by(|a, b| {
        b.gain
            .partial_cmp(&a.gain)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.feature_id.cmp(&b.feature_id))
    });
    Ok(choices)
}

/// Applies the selection strategy to the sorted choices.
pub(crate) fn choose(
    choices: &[SplitChoice],
    strategy: FeatureSelectionStrategy,
    rng: &mut impl rand::Rng,
) -> Option<SplitChoice> {
    if choices.is_empty() {
        return None;
    }
    match strategy {
        FeatureSelectionStrategy::Best => Some(choices[0]),
        FeatureSelectionStrategy::Top3Random => {
            // Equal-gain runs collapse into one candidate class represented
            // by their lowest feature id.
            let mut class_heads: Vec<usize> = vec![0];
            for i in 1..choices.len() {
                if class_heads.len() == 3 {
                    break;
                }
                let head_gain = choices[*class_heads.last().expect("non-empty")].gain;
                if (head_gain - choices[i].gain).abs() > GAIN_EPS {
                    class_heads.push(i);
                }
            }
            let picked = class_heads[rng.gen_range(0..class_heads.len())];
            Some(choices[picked])
        }
    }
}
