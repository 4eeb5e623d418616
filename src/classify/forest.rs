//! Random forest classifier.
//!
//! Ensemble of CART trees grown on bootstrap resamples of the training
//! samples, each split choosing among a random subset of `sqrt(n_features)`
//! candidate features (Gini impurity). The positive-class probability of a
//! sample is the mean over trees of the positive fraction in the leaf it
//! falls into.
//!
//! Trees are grown in parallel. Each tree draws its own `StdRng` seed from
//! the caller's generator up front, so a seeded run is reproducible
//! regardless of thread scheduling.

use super::{ClassLevels, Classifier, Predictions};
use crate::data::Experiment;
use crate::error::{MetricsError, Result};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, RngCore, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Hyper-parameters of the forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Number of trees.
    pub n_trees: usize,
    /// Maximum tree depth; `None` grows until leaves are pure.
    pub max_depth: Option<usize>,
    /// Minimum number of samples required to split a node.
    pub min_samples_split: usize,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        p_positive: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A single fitted classification tree (array-based).
#[derive(Debug, Clone)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Positive-class fraction of the leaf reached by `sample`.
    pub fn predict_proba(&self, sample: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { p_positive } => return *p_positive,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if sample[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

/// A fitted forest plus the feature order and classes it was trained on.
#[derive(Debug, Clone)]
pub struct ForestModel {
    trees: Vec<DecisionTree>,
    feature_ids: Vec<String>,
    classes: ClassLevels,
}

impl ForestModel {
    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    pub fn classes(&self) -> &ClassLevels {
        &self.classes
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }
}

/// Random forest classifier (see the module docs).
#[derive(Debug, Clone, Default)]
pub struct RandomForest {
    config: ForestConfig,
}

impl RandomForest {
    pub fn new(config: ForestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }
}

/// Sample-major feature rows (one `Vec` per sample).
fn sample_rows(exp: &Experiment) -> Vec<Vec<f64>> {
    let dense = exp.counts().to_dense();
    (0..exp.n_samples())
        .map(|s| dense.column(s).iter().copied().collect())
        .collect()
}

impl Classifier for RandomForest {
    type Model = ForestModel;

    fn fit(
        &self,
        train: &Experiment,
        label_field: &str,
        rng: &mut dyn RngCore,
    ) -> Result<ForestModel> {
        if self.config.n_trees == 0 {
            return Err(MetricsError::InvalidParameter(
                "n_trees must be at least 1".to_string(),
            ));
        }
        if train.n_samples() == 0 {
            return Err(MetricsError::EmptyData("No training samples".to_string()));
        }

        let labels = train.labels(label_field)?;
        let classes = ClassLevels::from_labels(&labels)?;
        let y: Vec<bool> = labels.iter().map(|l| classes.is_positive(l)).collect();
        let x = sample_rows(train);

        let seeds: Vec<u64> = (0..self.config.n_trees).map(|_| rng.gen()).collect();
        let builder = TreeBuilder {
            x: &x,
            y: &y,
            n_features: train.n_features(),
            max_features: max_features(train.n_features()),
            max_depth: self.config.max_depth,
            min_samples_split: self.config.min_samples_split.max(2),
        };

        let trees: Vec<DecisionTree> = seeds
            .into_par_iter()
            .map(|seed| {
                let mut tree_rng = StdRng::seed_from_u64(seed);
                let n = x.len();
                let bootstrap: Vec<usize> = (0..n).map(|_| tree_rng.gen_range(0..n)).collect();
                builder.build(bootstrap, &mut tree_rng)
            })
            .collect();

        debug!(
            n_trees = trees.len(),
            n_samples = train.n_samples(),
            n_features = train.n_features(),
            "fitted random forest"
        );

        Ok(ForestModel {
            trees,
            feature_ids: train.feature_ids().to_vec(),
            classes,
        })
    }

    fn predict(
        &self,
        model: &ForestModel,
        test: &Experiment,
        label_field: &str,
    ) -> Result<Predictions> {
        let true_labels = test.labels(label_field)?;

        // Columns of the model, looked up in the test experiment; absent
        // features read as zero.
        let test_index = test.counts().feature_index();
        let columns: Vec<Option<usize>> = model
            .feature_ids
            .iter()
            .map(|id| test_index.get(id.as_str()).copied())
            .collect();

        let dense = test.counts().to_dense();
        let probabilities: Vec<f64> = (0..test.n_samples())
            .into_par_iter()
            .map(|s| {
                let row: Vec<f64> = columns
                    .iter()
                    .map(|c| c.map_or(0.0, |f| dense[(f, s)]))
                    .collect();
                let total: f64 = model.trees.iter().map(|t| t.predict_proba(&row)).sum();
                total / model.trees.len() as f64
            })
            .collect();

        Ok(Predictions {
            classes: model.classes.clone(),
            sample_ids: test.sample_ids().to_vec(),
            true_labels,
            probabilities,
        })
    }
}

fn max_features(n_features: usize) -> usize {
    ((n_features as f64).sqrt().floor() as usize).clamp(1, n_features.max(1))
}

fn gini(n_pos: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = n_pos as f64 / n as f64;
    2.0 * p * (1.0 - p)
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [bool],
    n_features: usize,
    max_features: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
}

impl TreeBuilder<'_> {
    fn build(&self, samples: Vec<usize>, rng: &mut StdRng) -> DecisionTree {
        let mut nodes = Vec::new();
        self.grow(&mut nodes, samples, 0, rng);
        DecisionTree { nodes }
    }

    /// Grow the subtree for `samples`, returning its node index.
    fn grow(&self, nodes: &mut Vec<Node>, samples: Vec<usize>, depth: usize, rng: &mut StdRng) -> usize {
        let n = samples.len();
        let n_pos = samples.iter().filter(|&&i| self.y[i]).count();
        let p_positive = if n == 0 { 0.0 } else { n_pos as f64 / n as f64 };

        let node_idx = nodes.len();
        nodes.push(Node::Leaf { p_positive });

        let depth_reached = self.max_depth.map_or(false, |d| depth >= d);
        if depth_reached || n < self.min_samples_split || n_pos == 0 || n_pos == n {
            return node_idx;
        }

        let Some(split) = self.best_split(&samples, n_pos, rng) else {
            return node_idx;
        };

        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&i| self.x[i][split.feature] <= split.threshold);

        let left = self.grow(nodes, left_samples, depth + 1, rng);
        let right = self.grow(nodes, right_samples, depth + 1, rng);
        nodes[node_idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_idx
    }

    /// Search random features for the split with the lowest weighted Gini.
    ///
    /// Features that are constant within the node do not count towards
    /// `max_features`; the search continues past `max_features` until a
    /// valid split is found or every feature has been tried.
    fn best_split(&self, samples: &[usize], n_pos: usize, rng: &mut StdRng) -> Option<SplitCandidate> {
        let n = samples.len();
        let parent = gini(n_pos, n);
        let mut best: Option<SplitCandidate> = None;
        let mut n_visited = 0;

        for feature in index::sample(rng, self.n_features, self.n_features).into_iter() {
            if n_visited >= self.max_features && best.is_some() {
                break;
            }
            let mut sorted: Vec<(f64, bool)> = samples
                .iter()
                .map(|&i| (self.x[i][feature], self.y[i]))
                .collect();
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
            if sorted[0].0 == sorted[n - 1].0 {
                continue;
            }
            n_visited += 1;

            let mut left_pos = 0;
            for k in 1..n {
                if sorted[k - 1].1 {
                    left_pos += 1;
                }
                if sorted[k].0 == sorted[k - 1].0 {
                    continue;
                }
                let right_pos = n_pos - left_pos;
                let impurity = (k as f64 * gini(left_pos, k)
                    + (n - k) as f64 * gini(right_pos, n - k))
                    / n as f64;
                if impurity < parent && best.as_ref().map_or(true, |b| impurity < b.impurity) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: (sorted[k - 1].0 + sorted[k].0) / 2.0,
                        impurity,
                    });
                }
            }
        }
        best
    }
}
