//! Integration tests for the dualsvm library
//!
//! These tests train on seeded synthetic data and check the optimality,
//! sparsity and warm-start behavior of the solvers through the public API.

use dualsvm::api::{SVC, SVR};
use dualsvm::kernel::{KernelEvaluator, RBFKernel};
use dualsvm::optimizer::sparsify;
use dualsvm::solver::{DualState, SmoSolver, WarmStart};
use dualsvm::{
    CacheMode, Dataset, ErrorKind, Kernel, LinearKernel, SVMError, SVMModel, Sample, SmoTrainer,
    SolverConfig, SparseVector, SweepStrategy, TrainableClassifier, TrainableRegressor,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::sync::Arc;

/// Two Gaussian clusters at (-2, -2) (label 0) and (2, 2) (label 1)
fn gaussian_blobs(rng: &mut StdRng, n: usize, std_dev: f64) -> Vec<Sample> {
    let noise = Normal::new(0.0, std_dev).unwrap();
    (0..n)
        .map(|i| {
            let (center, label) = if i % 2 == 0 { (-2.0, 0.0) } else { (2.0, 1.0) };
            let x = center + noise.sample(rng);
            let y = center + noise.sample(rng);
            Sample::dense(&[x, y], label)
        })
        .collect()
}

/// Overlapping clusters so that some multipliers end up at C
fn noisy_blobs(rng: &mut StdRng, n: usize) -> Vec<Sample> {
    let noise = Normal::new(0.0, 1.0).unwrap();
    (0..n)
        .map(|i| {
            let (center, label) = if i % 2 == 0 { (-0.7, -1.0) } else { (0.7, 1.0) };
            Sample::dense(&[center + noise.sample(rng), center + noise.sample(rng)], label)
        })
        .collect()
}

/// y = 3x + N(0, 0.01) for x in [0, 10]
fn noisy_line(rng: &mut StdRng, n: usize) -> Vec<Sample> {
    let noise = Normal::new(0.0, 0.01).unwrap();
    (0..n)
        .map(|_| {
            let x: f64 = rng.random_range(0.0..10.0);
            Sample::dense(&[x], 3.0 * x + noise.sample(rng))
        })
        .collect()
}

fn linear() -> Arc<dyn Kernel> {
    Arc::new(LinearKernel::new())
}

fn dot(w: &[f64], x: &SparseVector) -> f64 {
    x.indices
        .iter()
        .zip(&x.values)
        .map(|(&i, &v)| w.get(i).copied().unwrap_or(0.0) * v)
        .sum()
}

/// Every sample satisfies the margin conditions of its multiplier
#[test]
fn test_kkt_conditions_hold_after_training() {
    let mut rng = StdRng::seed_from_u64(7);
    let samples = noisy_blobs(&mut rng, 120);
    let tolerance = 1e-3;
    let c = 0.5;

    for strategy in [SweepStrategy::ModificationOne, SweepStrategy::ModificationTwo] {
        let config = SolverConfig {
            c,
            tolerance,
            strategy,
            ..SolverConfig::default()
        };
        let trainer = SmoTrainer::new(linear(), config).unwrap();
        let classifier = trainer.train_classifier(&samples).unwrap();
        assert!(classifier.report().converged, "{strategy:?} did not converge");

        let model = classifier.model();
        let w = model.linear_weights().expect("linear model");
        let b = model.bias();

        let mut alpha = vec![0.0; samples.len()];
        for (&i, &coef) in model.support_indices().iter().zip(model.coefficients()) {
            alpha[i] = coef.abs();
        }

        let slack = tolerance + 1e-8;
        let mut at_bound = 0;
        for (i, sample) in samples.iter().enumerate() {
            let margin = sample.label * (dot(&w, &sample.features) + b);
            if alpha[i] == 0.0 {
                assert!(margin >= 1.0 - slack, "sample {i}: alpha 0, margin {margin}");
            } else if alpha[i] < c {
                assert!((margin - 1.0).abs() <= slack, "sample {i}: free, margin {margin}");
            } else {
                at_bound += 1;
                assert!(margin <= 1.0 + slack, "sample {i}: alpha C, margin {margin}");
            }
        }
        assert!(at_bound > 0, "overlapping clusters should leave bounded multipliers");
    }
}

/// Scoring is a pure function of the model
#[test]
fn test_rescoring_is_bit_identical() {
    let mut rng = StdRng::seed_from_u64(11);
    let samples = gaussian_blobs(&mut rng, 60, 0.8);
    let trainer = SmoTrainer::with_kernel(Arc::new(RBFKernel::new(0.5).unwrap()));
    let classifier = trainer.train_classifier(&samples).unwrap();

    let probes = gaussian_blobs(&mut rng, 40, 1.5);
    for probe in &probes {
        let first = classifier.decision_value(&probe.features);
        let second = classifier.decision_value(&probe.features);
        assert_eq!(first.to_bits(), second.to_bits());
    }

    // Parallel batch prediction matches sequential prediction exactly
    let batch = classifier.predict_batch(&probes);
    for (probe, pred) in probes.iter().zip(&batch) {
        let single = classifier.predict(probe);
        assert_eq!(single.decision_value.to_bits(), pred.decision_value.to_bits());
        assert_eq!(single.label, pred.label);
    }
}

/// Support vectors are exactly the samples with a non-zero coefficient
#[test]
fn test_sparsified_model_keeps_only_non_zero_coefficients() {
    let mut rng = StdRng::seed_from_u64(3);
    let samples = noisy_blobs(&mut rng, 80);
    let kernel = RBFKernel::new(1.0).unwrap();
    let config = SolverConfig::default();

    let evaluator = KernelEvaluator::new(&kernel, &samples, CacheMode::Full).unwrap();
    let state = DualState::classification(
        samples.iter().map(|s| s.label).collect(),
        vec![config.c; samples.len()],
    );
    let outcome = SmoSolver::new(evaluator, state, config).solve().unwrap();
    let dense = outcome.state.coefficients();
    let non_zero = dense.iter().filter(|&&b| b != 0.0).count();
    assert!(non_zero > 0 && non_zero < samples.len());

    let model = sparsify(outcome.state, &samples, Arc::new(kernel), outcome.bias).unwrap();
    assert_eq!(model.n_support_vectors(), non_zero);
    assert!(model.coefficients().iter().all(|&c| c != 0.0));
    let kept = model
        .support_indices()
        .iter()
        .zip(model.coefficients())
        .zip(model.support_vectors());
    for ((&i, &coef), sv) in kept {
        assert_eq!(dense[i], coef);
        assert_eq!(sv, &samples[i].features);
    }
}

/// Warm-starting from a model trained on the same data never ends worse
#[test]
fn test_warm_start_objective_no_worse_than_cold() {
    let mut rng = StdRng::seed_from_u64(21);
    let samples = noisy_blobs(&mut rng, 150);
    let config = SolverConfig {
        c: 2.0,
        ..SolverConfig::default()
    };
    let trainer = SmoTrainer::new(Arc::new(RBFKernel::new(0.5).unwrap()), config).unwrap();

    let cold = trainer.train_classifier(&samples).unwrap();
    let warm = trainer
        .train_classifier_warm(&samples, Some(WarmStart::Model(cold.model())))
        .unwrap();

    let cold_objective = cold.report().objective;
    let warm_objective = warm.report().objective;
    assert!(warm.report().converged);
    assert!(
        warm_objective >= cold_objective - 1e-6 * cold_objective.abs().max(1.0),
        "warm {warm_objective} < cold {cold_objective}"
    );
    assert!(warm.report().steps <= cold.report().steps);
}

/// A score function seeds training on a dataset of any size
#[test]
fn test_warm_start_from_score_function() {
    let mut rng = StdRng::seed_from_u64(5);
    let first = gaussian_blobs(&mut rng, 60, 0.5);
    let second = gaussian_blobs(&mut rng, 90, 0.5);
    let trainer = SmoTrainer::with_kernel(linear());

    let previous = trainer.train_classifier(&first).unwrap();
    let score = |x: &SparseVector| previous.model().score(x);
    let warm = trainer
        .train_classifier_warm(&second, Some(WarmStart::Scorer(&score)))
        .unwrap();
    let cold = trainer.train_classifier(&second).unwrap();

    assert!(warm.report().converged);
    let gap = (warm.report().objective - cold.report().objective).abs();
    assert!(gap < 1e-2 * cold.report().objective.abs().max(1.0), "gap {gap}");
    for sample in &second {
        assert_eq!(warm.predict(sample).label, sample.label);
    }

    // Reusing multipliers needs a model of the same cardinality
    let err = trainer
        .train_classifier_warm(&second, Some(WarmStart::Model(previous.model())))
        .unwrap_err();
    assert!(matches!(
        err,
        SVMError::WarmStartMismatch {
            expected: 60,
            actual: 90
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Shape);
}

/// 200 points from two tight clusters, linear kernel, C = 1
#[test]
fn test_two_cluster_classification_end_to_end() {
    let mut rng = StdRng::seed_from_u64(42);
    let train = gaussian_blobs(&mut rng, 200, 0.3);
    let test = gaussian_blobs(&mut rng, 200, 0.3);

    let mut svc = SVC::new().with_c(1.0).with_tolerance(1e-3);
    let classifier = svc.fit(&train).expect("Training should succeed");
    assert_eq!(classifier.classes(), [0.0, 1.0]);
    assert!(classifier.report().converged);

    let metrics = svc.evaluate(&test).unwrap();
    assert_eq!(metrics.false_positives + metrics.false_negatives, 0);
    assert_eq!(metrics.accuracy(), 1.0);

    let w = svc
        .model()
        .and_then(|m| m.model().linear_weights())
        .expect("linear model");
    assert!(w[0] + w[1] > 0.0, "w = {w:?}");
}

/// y = 3x + noise, epsilon = 0.01, C = 10
#[test]
fn test_linear_regression_end_to_end() {
    let mut rng = StdRng::seed_from_u64(42);
    let train = noisy_line(&mut rng, 100);
    let test = noisy_line(&mut rng, 100);

    let mut svr = SVR::new().with_c(10.0).with_epsilon(0.01);
    let regressor = svr.fit(&train).expect("Training should succeed");
    assert!(regressor.report().converged);

    let w = regressor.model().linear_weights().expect("linear model");
    assert!((w[0] - 3.0).abs() / 3.0 < 0.05, "slope {}", w[0]);

    // Slope recovered from held-out predictions
    let (lo, hi) = test
        .iter()
        .map(|s| s.features.get(0))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
            (lo.min(x), hi.max(x))
        });
    let at = |x: f64| svr.decision_function(&SparseVector::from_dense(&[x])).unwrap();
    let slope = (at(hi) - at(lo)) / (hi - lo);
    assert!((slope - 3.0).abs() / 3.0 < 0.05, "held-out slope {slope}");

    let metrics = svr.evaluate(&test).unwrap();
    assert!(metrics.r2 > 0.999, "r2 = {}", metrics.r2);
}

/// Both sweep strategies and all cache policies reach the same solution
#[test]
fn test_strategies_and_cache_modes_agree() {
    let mut rng = StdRng::seed_from_u64(9);
    let samples = noisy_line(&mut rng, 40);
    let probe = SparseVector::from_dense(&[4.2]);

    let mut values = Vec::new();
    for strategy in [SweepStrategy::ModificationOne, SweepStrategy::ModificationTwo] {
        for cache in [
            CacheMode::None,
            CacheMode::Full,
            CacheMode::Rows { bytes: 1024 },
            CacheMode::Entries { capacity: 64 },
        ] {
            let config = SolverConfig {
                c: 10.0,
                epsilon: 0.05,
                strategy,
                cache,
                ..SolverConfig::default()
            };
            let trainer = SmoTrainer::new(linear(), config).unwrap();
            let regressor = trainer.train_regressor(&samples).unwrap();
            assert!(regressor.report().converged);
            values.push(regressor.predict_value(&probe));
        }
    }
    for v in &values {
        assert!((v - values[0]).abs() < 0.05, "{values:?}");
    }
}

/// The bias-free solver separates clusters symmetric about the origin
#[test]
fn test_no_bias_classification() {
    let mut rng = StdRng::seed_from_u64(13);
    let train = gaussian_blobs(&mut rng, 100, 0.4);
    let test = gaussian_blobs(&mut rng, 100, 0.4);

    let mut svc = SVC::new().with_bias(false);
    svc.fit(&train).unwrap();
    let info = svc.info().unwrap();
    assert_eq!(info.bias, 0.0);
    assert!(info.report.converged);
    assert!(svc.evaluate(&test).unwrap().accuracy() >= 0.99);
}

/// Running out of passes degrades the model but is not an error
#[test]
fn test_iteration_budget_yields_usable_model() {
    let mut rng = StdRng::seed_from_u64(17);
    let samples = noisy_blobs(&mut rng, 200);
    let config = SolverConfig {
        max_iterations: 1,
        ..SolverConfig::default()
    };
    let trainer = SmoTrainer::new(Arc::new(RBFKernel::new(0.5).unwrap()), config).unwrap();
    let classifier = trainer.train_classifier(&samples).unwrap();

    assert!(!classifier.report().converged);
    assert_eq!(classifier.report().iterations, 1);
    assert!(classifier.n_support_vectors() > 0);
    assert!(classifier.bias().is_finite());
    for sample in samples.iter().take(10) {
        assert!(classifier.decision_value(&sample.features).is_finite());
    }
}

/// Weighted samples get proportionally larger boxes
#[test]
fn test_sample_weights_scale_box() {
    let samples = vec![
        Sample::dense(&[1.0], 1.0).with_weight(0.1),
        Sample::dense(&[0.8], -1.0),
        Sample::dense(&[-1.0], -1.0),
        Sample::dense(&[-0.8], 1.0),
    ];
    let config = SolverConfig {
        c: 1.0,
        ..SolverConfig::default()
    };
    let trainer = SmoTrainer::new(linear(), config).unwrap();
    let classifier = trainer.train_classifier(&samples).unwrap();

    let model = classifier.model();
    for (&i, &coef) in model.support_indices().iter().zip(model.coefficients()) {
        let bound = samples[i].weight;
        assert!(coef.abs() <= bound + 1e-12, "sample {i}: |{coef}| > {bound}");
    }
}

/// Configuration and shape errors surface before any training happens
#[test]
fn test_error_taxonomy() {
    let bad_configs = [
        SolverConfig {
            c: f64::NAN,
            ..SolverConfig::default()
        },
        SolverConfig {
            tolerance: 0.0,
            ..SolverConfig::default()
        },
        SolverConfig {
            epsilon: -1.0,
            ..SolverConfig::default()
        },
        SolverConfig {
            max_iterations: 0,
            ..SolverConfig::default()
        },
    ];
    for config in bad_configs {
        let err = SmoTrainer::new(linear(), config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    let trainer = SmoTrainer::with_kernel(linear());
    let three_classes = vec![
        Sample::dense(&[0.0], 0.0),
        Sample::dense(&[1.0], 1.0),
        Sample::dense(&[2.0], 2.0),
    ];
    let err = trainer.train_classifier(&three_classes).unwrap_err();
    assert!(matches!(err, SVMError::ClassCount(3)));
    assert!(!err.is_internal());

    let empty: Vec<Sample> = Vec::new();
    assert_eq!(
        trainer.train_regressor(&empty).unwrap_err().kind(),
        ErrorKind::Shape
    );

    let svr = SVR::new();
    assert_eq!(
        svr.decision_function(&SparseVector::empty())
            .unwrap_err()
            .kind(),
        ErrorKind::Usage
    );
    assert!(Dataset::is_empty(&empty));
}
