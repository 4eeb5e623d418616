//! Integration tests for the cross-cohort evaluator.

use cohort_metrics::prelude::*;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use sprs::TriMat;
use std::cell::RefCell;
use std::collections::HashSet;

const COMMON: [&str; 4] = ["f0", "f1", "f2", "f3"];

/// Cohort description: (cohort id, number of samples, number of disease samples).
type CohortDef<'a> = (&'a str, usize, usize);

/// Build one experiment holding several cohorts.
///
/// Every cohort shares the features f0..f3 and carries one private feature
/// `only_<label>` that is zero everywhere else. Disease samples take the odd
/// positions 1, 3, 5, ... until the requested count is reached. f0 is high
/// and f1 low in disease samples, so the classes are separable on the shared
/// features.
fn create_synthetic_experiment(cohorts: &[CohortDef]) -> Experiment {
    let mut feature_ids: Vec<String> = COMMON.iter().map(|s| s.to_string()).collect();
    for (id, _, _) in cohorts {
        feature_ids.push(format!("only_{}", cohort_label(id)));
    }

    let n_samples: usize = cohorts.iter().map(|(_, n, _)| n).sum();
    let mut tri_mat = TriMat::new((feature_ids.len(), n_samples));
    let mut sample_ids = Vec::new();
    let mut rows = Vec::new();

    let mut col = 0;
    for (k, (id, n, n_disease)) in cohorts.iter().enumerate() {
        for s in 0..*n {
            let disease = s % 2 == 1 && s / 2 < *n_disease;
            let shift = s as f64 + k as f64;
            let effect = if disease { 40.0 } else { 0.0 };

            tri_mat.add_triplet(0, col, 50.0 + effect + shift);
            tri_mat.add_triplet(1, col, 90.0 - effect + shift);
            tri_mat.add_triplet(2, col, 10.0 + shift);
            tri_mat.add_triplet(3, col, 20.0 + (s % 3) as f64);
            tri_mat.add_triplet(COMMON.len() + k, col, 5.0);

            let sample_id = format!("{}_{}", cohort_label(id), s);
            let label = if disease { "disease" } else { "control" };
            rows.push((sample_id.clone(), vec![id.to_string(), label.to_string()]));
            sample_ids.push(sample_id);
            col += 1;
        }
    }

    let counts = AbundanceMatrix::new(tri_mat.to_csr(), feature_ids, sample_ids).unwrap();
    let metadata = Metadata::from_rows(vec!["exp".to_string(), "type".to_string()], rows).unwrap();
    Experiment::new(counts, metadata).unwrap()
}

/// What a classifier saw in one fit or predict call.
#[derive(Debug, Clone)]
struct Seen {
    sample_ids: Vec<String>,
    feature_ids: Vec<String>,
    labels: Vec<String>,
}

/// Classifier that records its inputs and predicts the true labels.
///
/// It never rejects a single-class training set, so metric failures on the
/// test side can be observed in isolation.
#[derive(Default)]
struct RecordingClassifier {
    fits: RefCell<Vec<Seen>>,
    predictions: RefCell<Vec<(Seen, Seen)>>,
}

impl Classifier for RecordingClassifier {
    type Model = Seen;

    fn fit(&self, train: &Experiment, label_field: &str, _rng: &mut dyn RngCore) -> Result<Seen> {
        let seen = Seen {
            sample_ids: train.sample_ids().to_vec(),
            feature_ids: train.feature_ids().to_vec(),
            labels: train.labels(label_field)?,
        };
        self.fits.borrow_mut().push(seen.clone());
        Ok(seen)
    }

    fn predict(&self, model: &Seen, test: &Experiment, label_field: &str) -> Result<Predictions> {
        let true_labels = test.labels(label_field)?;
        let classes = ClassLevels {
            negative: "control".to_string(),
            positive: "disease".to_string(),
        };
        let probabilities = true_labels
            .iter()
            .map(|l| if classes.is_positive(l) { 0.9 } else { 0.1 })
            .collect();

        let seen = Seen {
            sample_ids: test.sample_ids().to_vec(),
            feature_ids: test.feature_ids().to_vec(),
            labels: true_labels.clone(),
        };
        self.predictions.borrow_mut().push((model.clone(), seen));

        Ok(Predictions {
            classes,
            sample_ids: test.sample_ids().to_vec(),
            true_labels,
            probabilities,
        })
    }
}

fn three_cohorts() -> Experiment {
    create_synthetic_experiment(&[("data/A", 12, 6), ("data/B", 9, 4), ("C", 10, 5)])
}

#[test]
fn test_matrix_shape_and_labels() {
    let exp = three_cohorts();
    let config = CrossCohortConfig::default().with_seed(1);
    let classifier = RecordingClassifier::default();
    let mut rng = StdRng::seed_from_u64(1);

    let result = evaluate(&exp, &config, &classifier, &mut rng).unwrap();

    let expected = vec!["A".to_string(), "B".to_string(), "C".to_string()];
    assert_eq!(result.roc.labels(), expected.as_slice());
    assert_eq!(result.accuracy.labels(), expected.as_slice());
    assert_eq!(result.roc.size(), 3);

    // The recording classifier is perfect. A diagonal test split may hold a
    // single class, which leaves that cell missing.
    for i in 0..3 {
        for j in 0..3 {
            let roc = result.roc.get(i, j);
            let acc = result.accuracy.get(i, j);
            if i == j {
                assert!(roc.is_none() || roc == Some(1.0));
                assert_eq!(roc.is_none(), acc.is_none());
            } else {
                assert_eq!(roc, Some(1.0));
                assert_eq!(acc, Some(1.0));
            }
        }
    }
}

#[test]
fn test_diagonal_split_is_disjoint() {
    let exp = three_cohorts();
    let config = CrossCohortConfig::default().with_seed(7);
    let classifier = RecordingClassifier::default();
    let mut rng = StdRng::seed_from_u64(7);

    evaluate(&exp, &config, &classifier, &mut rng).unwrap();

    let predictions = classifier.predictions.borrow();
    assert_eq!(predictions.len(), 9);

    // Pairs are visited row-major; the diagonal is at 0, 4 and 8.
    let sizes = [12, 9, 10];
    for (k, &n) in sizes.iter().enumerate() {
        let (train, test) = &predictions[k * 3 + k];
        assert_eq!(train.sample_ids.len(), n * 2 / 3);
        assert_eq!(test.sample_ids.len(), n - n * 2 / 3);

        let train_ids: HashSet<&String> = train.sample_ids.iter().collect();
        assert!(test.sample_ids.iter().all(|id| !train_ids.contains(id)));
    }

    // Off the diagonal the test cohort is used whole
    let (_, test) = &predictions[1];
    assert_eq!(test.sample_ids.len(), 9);
}

#[test]
fn test_subset_features_are_shared() {
    let exp = three_cohorts();
    let config = CrossCohortConfig::default().with_seed(3);
    let classifier = RecordingClassifier::default();
    let mut rng = StdRng::seed_from_u64(3);

    evaluate(&exp, &config, &classifier, &mut rng).unwrap();

    // One fit per pair
    assert_eq!(classifier.fits.borrow().len(), 9);

    for (idx, (train, test)) in classifier.predictions.borrow().iter().enumerate() {
        assert_eq!(train.feature_ids, test.feature_ids);
        if idx % 4 != 0 {
            // Private features never survive an off-diagonal pair
            assert_eq!(train.feature_ids, COMMON.to_vec());
        } else {
            assert_eq!(train.feature_ids.len(), COMMON.len() + 1);
        }
    }
}

#[test]
fn test_without_subset_features() {
    let exp = three_cohorts();
    let mut config = CrossCohortConfig::default().with_seed(5);
    config.use_subset_features = false;
    let classifier = RecordingClassifier::default();
    let mut rng = StdRng::seed_from_u64(5);

    let result = evaluate(&exp, &config, &classifier, &mut rng).unwrap();
    assert_eq!(result.roc.get(0, 1), Some(1.0));

    // One shared model per training cohort plus a fresh one per diagonal cell
    assert_eq!(classifier.fits.borrow().len(), 6);

    let predictions = classifier.predictions.borrow();
    let (train, test) = &predictions[1];
    // Training on A keeps its private feature; test B is only strict-filtered
    assert!(train.feature_ids.contains(&"only_A".to_string()));
    assert!(test.feature_ids.contains(&"only_B".to_string()));
    assert!(!test.feature_ids.contains(&"only_A".to_string()));
}

#[test]
fn test_single_class_test_cohort_is_missing() {
    let exp = create_synthetic_experiment(&[
        ("A", 12, 6),
        ("healthy", 9, 0),
        ("B", 10, 5),
    ]);
    let config = CrossCohortConfig::default().with_seed(11);
    let classifier = RecordingClassifier::default();
    let mut rng = StdRng::seed_from_u64(11);

    let result = evaluate(&exp, &config, &classifier, &mut rng).unwrap();

    for i in 0..3 {
        assert_eq!(result.roc.get(i, 1), None);
        assert_eq!(result.accuracy.get(i, 1), None);
    }
    assert_eq!(result.roc.get(0, 2), Some(1.0));
    assert_eq!(result.roc.get(2, 0), Some(1.0));
    assert!(result.roc.n_missing() >= 3);

    let mut out = Vec::new();
    result.roc.to_writer(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], ",A,healthy,B");
    let row_a: Vec<&str> = lines[1].split(',').collect();
    assert_eq!(row_a[0], "A");
    assert_eq!(row_a[2], "");
    assert_eq!(row_a[3], "1");
}

/// Run the recording classifier with and without the given shuffles.
fn run_recorded(config: &CrossCohortConfig, seed: u64) -> RecordingClassifier {
    let classifier = RecordingClassifier::default();
    let mut rng = StdRng::seed_from_u64(seed);
    evaluate(&three_cohorts(), config, &classifier, &mut rng).unwrap();
    classifier
}

fn sorted(labels: &[String]) -> Vec<String> {
    let mut labels = labels.to_vec();
    labels.sort();
    labels
}

#[test]
fn test_shuffle_keeps_samples_and_features() {
    let exp = three_cohorts();
    let mut config = CrossCohortConfig::default().with_seed(13);
    config.shuffle_test = true;
    config.shuffle_train = true;

    let shuffled = run_recorded(&config, 13);
    let plain = run_recorded(&CrossCohortConfig::default(), 13);

    let a = shuffled.predictions.borrow();
    let b = plain.predictions.borrow();
    for ((train_a, test_a), (train_b, test_b)) in a.iter().zip(b.iter()) {
        assert_eq!(train_a.feature_ids, train_b.feature_ids);
        assert_eq!(test_a.feature_ids, test_b.feature_ids);
        assert_eq!(train_a.sample_ids.len(), train_b.sample_ids.len());
        assert_eq!(test_a.sample_ids.len(), test_b.sample_ids.len());
    }

    // The caller's experiment keeps its labels
    assert_eq!(exp.labels("type").unwrap(), three_cohorts().labels("type").unwrap());
}

#[test]
fn test_shuffle_train_reaches_fit() {
    let mut config = CrossCohortConfig::default();
    config.shuffle_train = true;

    let shuffled = run_recorded(&config, 21);
    let plain = run_recorded(&CrossCohortConfig::default(), 21);

    let a = shuffled.predictions.borrow();
    let b = plain.predictions.borrow();
    let mut n_reordered = 0;
    // Off-diagonal pairs train on the whole cohort in both runs
    for (idx, ((train_a, test_a), (train_b, test_b))) in a.iter().zip(b.iter()).enumerate() {
        if idx % 4 == 0 {
            continue;
        }
        assert_eq!(train_a.sample_ids, train_b.sample_ids);
        assert_eq!(sorted(&train_a.labels), sorted(&train_b.labels));
        assert_eq!(test_a.labels, test_b.labels);
        if train_a.labels != train_b.labels {
            n_reordered += 1;
        }
    }
    assert!(n_reordered > 0);
}

#[test]
fn test_shuffle_test_reaches_predict() {
    let mut config = CrossCohortConfig::default();
    config.shuffle_test = true;

    let shuffled = run_recorded(&config, 22);
    let plain = run_recorded(&CrossCohortConfig::default(), 22);

    let a = shuffled.predictions.borrow();
    let b = plain.predictions.borrow();
    let mut n_reordered = 0;
    for (idx, ((train_a, test_a), (train_b, test_b))) in a.iter().zip(b.iter()).enumerate() {
        if idx % 4 == 0 {
            continue;
        }
        assert_eq!(train_a.labels, train_b.labels);
        assert_eq!(test_a.sample_ids, test_b.sample_ids);
        assert_eq!(sorted(&test_a.labels), sorted(&test_b.labels));
        if test_a.labels != test_b.labels {
            n_reordered += 1;
        }
    }
    assert!(n_reordered > 0);
}

#[test]
fn test_rare_class_self_split_leaves_cell_missing() {
    // R has a single disease sample, so its 2/3 split often trains on one class
    let exp = create_synthetic_experiment(&[("A", 12, 6), ("R", 10, 1)]);
    let mut config = CrossCohortConfig::default();
    config.forest.n_trees = 10;

    for seed in 0..20 {
        let result = cross_cohort_performance(&exp, &config.clone().with_seed(seed)).unwrap();

        // One of the two sides of R's split always holds a single class
        assert_eq!(result.roc.get(1, 1), None);
        assert_eq!(result.accuracy.get(1, 1), None);
        assert!(result.roc.get(0, 1).is_some());
        assert!(result.roc.get(1, 0).is_some());
    }
}

#[test]
fn test_missing_cohort_field() {
    let exp = three_cohorts();
    let mut config = CrossCohortConfig::default();
    config.cohort_field = "study".to_string();
    let classifier = RecordingClassifier::default();
    let mut rng = StdRng::seed_from_u64(0);

    assert!(evaluate(&exp, &config, &classifier, &mut rng).is_err());
}

#[test]
fn test_random_forest_end_to_end() {
    let exp = three_cohorts();
    let mut config = CrossCohortConfig::default().with_seed(42);
    config.forest.n_trees = 25;

    let first = cross_cohort_performance(&exp, &config).unwrap();
    let second = cross_cohort_performance(&exp, &config).unwrap();

    assert_eq!(first.roc.size(), 3);
    for i in 0..3 {
        for j in 0..3 {
            assert_eq!(first.roc.get(i, j), second.roc.get(i, j));
            assert_eq!(first.accuracy.get(i, j), second.accuracy.get(i, j));
        }
    }

    // Separable on shared features, so transfer across cohorts works
    let roc_ab = first.roc.get(0, 1).unwrap();
    assert!(roc_ab > 0.9, "roc A->B = {}", roc_ab);
}

#[test]
fn test_random_forest_single_class_training_fails() {
    let exp = create_synthetic_experiment(&[("A", 12, 6), ("healthy", 9, 0)]);
    let config = CrossCohortConfig::default().with_seed(2);

    let err = cross_cohort_performance(&exp, &config).unwrap_err();
    assert!(matches!(err, MetricsError::Classifier(_)));
}

#[test]
fn test_write_outputs() {
    let exp = three_cohorts();
    let config = CrossCohortConfig::default().with_seed(9);
    let classifier = RecordingClassifier::default();
    let mut rng = StdRng::seed_from_u64(9);
    let result = evaluate(&exp, &config, &classifier, &mut rng).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("run");
    let (roc_path, acc_path) = result.write(prefix.to_str().unwrap()).unwrap();

    assert!(roc_path.ends_with("run_roc.csv"));
    assert!(acc_path.ends_with("run_accuracy.csv"));
    let roc = std::fs::read_to_string(roc_path).unwrap();
    assert!(roc.starts_with(",A,B,C"));
    assert_eq!(roc.lines().count(), 4);
}
