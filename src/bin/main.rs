//! dualsvm Command Line Interface
//!
//! Train, apply, and inspect SMO-trained SVM classifiers and regressors
//! on LibSVM and CSV data.

use clap::{Args, Parser, Subcommand, ValueEnum};
use dualsvm::api::{EvaluationMetrics, RegressionMetrics};
use dualsvm::core::{
    CacheMode, Dataset, Prediction, Result, SVMError, SVMModel, SolverConfig, SweepStrategy,
};
use dualsvm::kernel::{Kernel, KernelSpec};
use dualsvm::optimizer::{SmoTrainer, TrainableClassifier, TrainableRegressor};
use dualsvm::persistence::{ModelTask, SerializableModel};
use dualsvm::{CSVDataset, LibSVMDataset};
use env_logger::Env;
use log::{error, info, warn};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "dualsvm")]
#[command(about = "Dual coordinate-descent SVM training for classification and regression")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a new model
    Train(TrainArgs),
    /// Make predictions using a trained model
    Predict(PredictArgs),
    /// Evaluate a model on labelled data
    Evaluate(EvaluateArgs),
    /// Display model information
    Info(InfoArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum CliTask {
    /// Binary classification over two label values
    Classify,
    /// Epsilon-insensitive regression
    Regress,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliKernel {
    Linear,
    Rbf,
    Polynomial,
    Sigmoid,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliStrategy {
    /// Examine every free index until the bound gap closes
    #[value(name = "mod1")]
    ModificationOne,
    /// Step the worst violating pair until the bound gap closes
    #[value(name = "mod2")]
    ModificationTwo,
}

impl From<CliStrategy> for SweepStrategy {
    fn from(strategy: CliStrategy) -> Self {
        match strategy {
            CliStrategy::ModificationOne => SweepStrategy::ModificationOne,
            CliStrategy::ModificationTwo => SweepStrategy::ModificationTwo,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliCache {
    /// Recompute every kernel value
    None,
    /// Materialize the Gram matrix
    Full,
    /// LRU of kernel rows within --cache-size
    Rows,
}

#[derive(Args)]
struct TrainArgs {
    /// Training data file (LibSVM or CSV format)
    #[arg(long)]
    data: PathBuf,

    /// Output model file
    #[arg(short, long)]
    output: PathBuf,

    /// Data format: auto, libsvm, or csv
    #[arg(short, long, default_value = "auto")]
    format: String,

    /// What to learn from the labels
    #[arg(long, value_enum, default_value = "classify")]
    task: CliTask,

    /// Kernel function
    #[arg(short, long, value_enum, default_value = "linear")]
    kernel: CliKernel,

    /// Kernel gamma (defaults to 1 / number of features)
    #[arg(long)]
    gamma: Option<f64>,

    /// Polynomial degree
    #[arg(long, default_value = "3")]
    degree: u32,

    /// Kernel coef0 for polynomial and sigmoid kernels
    #[arg(long, default_value = "0.0")]
    coef0: f64,

    /// Regularization parameter C
    #[arg(short = 'C', long, default_value = "1.0")]
    c: f64,

    /// KKT violation tolerance
    #[arg(long, default_value = "0.001")]
    tolerance: f64,

    /// Width of the insensitive tube (regression)
    #[arg(short, long, default_value = "0.001")]
    epsilon: f64,

    /// Maximum outer passes
    #[arg(short, long, default_value = "10000")]
    max_iterations: usize,

    /// Restricted sweep strategy
    #[arg(long, value_enum, default_value = "mod2")]
    strategy: CliStrategy,

    /// Train without a bias term (the kernel is normalized)
    #[arg(long)]
    no_bias: bool,

    /// Kernel cache policy
    #[arg(long, value_enum, default_value = "rows")]
    cache: CliCache,

    /// Kernel cache size in MB (row cache)
    #[arg(long, default_value = "64")]
    cache_size: usize,
}

#[derive(Args)]
struct PredictArgs {
    /// Trained model file
    #[arg(short, long)]
    model: PathBuf,

    /// Input data file
    #[arg(long)]
    data: PathBuf,

    /// Output predictions file (optional, prints to stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Data format: auto, libsvm, or csv
    #[arg(short, long, default_value = "auto")]
    format: String,

    /// Also print the raw decision value
    #[arg(long)]
    scores: bool,
}

#[derive(Args)]
struct EvaluateArgs {
    /// Trained model file
    #[arg(short, long)]
    model: PathBuf,

    /// Test data file
    #[arg(long)]
    data: PathBuf,

    /// Data format: auto, libsvm, or csv
    #[arg(short, long, default_value = "auto")]
    format: String,
}

#[derive(Args)]
struct InfoArgs {
    /// Model file
    model: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Train(args) => train_command(args),
        Commands::Predict(args) => predict_command(args),
        Commands::Evaluate(args) => evaluate_command(args),
        Commands::Info(args) => info_command(args),
    };

    if let Err(e) = result {
        error!("Error: {e}");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn train_command(args: TrainArgs) -> Result<()> {
    let dataset = load_dataset(&args.data, &args.format)?;
    info!(
        "Loaded {} samples with {} dimensions from {:?}",
        dataset.len(),
        dataset.dim(),
        args.data
    );

    let kernel = build_kernel(&args, dataset.dim())?;
    let config = SolverConfig {
        c: args.c,
        tolerance: args.tolerance,
        epsilon: args.epsilon,
        max_iterations: args.max_iterations,
        strategy: args.strategy.into(),
        use_bias: !args.no_bias,
        cache: match args.cache {
            CliCache::None => CacheMode::None,
            CliCache::Full => CacheMode::Full,
            CliCache::Rows => CacheMode::Rows {
                bytes: args.cache_size * 1024 * 1024,
            },
        },
        ..SolverConfig::default()
    };
    info!(
        "Parameters: task={:?}, kernel={}, C={}, tolerance={}, epsilon={}, max_iter={}",
        args.task,
        kernel.spec().name(),
        config.c,
        config.tolerance,
        config.epsilon,
        config.max_iterations
    );

    let trainer = SmoTrainer::new(kernel, config)?;
    let serializable = match args.task {
        CliTask::Classify => {
            let classifier = trainer.train_classifier(&*dataset)?;
            let predicted = labels_of(&classifier.predict_batch(dataset.samples()));
            let metrics = EvaluationMetrics::from_labels(
                &predicted,
                &dataset.get_labels(),
                classifier.classes()[1],
            );
            info!("Training accuracy: {:.2}%", metrics.accuracy() * 100.0);
            report_convergence(classifier.report().converged);
            SerializableModel::from_classifier(&classifier, trainer.config())
        }
        CliTask::Regress => {
            let regressor = trainer.train_regressor(&*dataset)?;
            let predicted = labels_of(&regressor.predict_batch(dataset.samples()));
            let metrics = RegressionMetrics::from_predictions(&predicted, &dataset.get_labels());
            info!("Training MSE: {:.6}, R^2: {:.4}", metrics.mse, metrics.r2);
            report_convergence(regressor.report().converged);
            SerializableModel::from_regressor(&regressor, trainer.config())
        }
    };

    info!("Support vectors: {}", serializable.metadata.n_support_vectors);
    info!("Bias: {:.6}", serializable.bias);
    serializable.save_to_file(&args.output)?;
    info!("Model saved to: {:?}", args.output);
    Ok(())
}

fn report_convergence(converged: bool) {
    if !converged {
        warn!("Iteration budget exhausted before the KKT conditions were met");
    }
}

fn build_kernel(args: &TrainArgs, dim: usize) -> Result<Arc<dyn Kernel>> {
    let gamma = match args.gamma {
        Some(gamma) => gamma,
        None if dim > 0 => 1.0 / dim as f64,
        None => 1.0,
    };
    let spec = match args.kernel {
        CliKernel::Linear => KernelSpec::Linear,
        CliKernel::Rbf => KernelSpec::Rbf { gamma },
        CliKernel::Polynomial => KernelSpec::Polynomial {
            degree: args.degree,
            gamma,
            coef0: args.coef0,
        },
        CliKernel::Sigmoid => KernelSpec::Sigmoid {
            gamma,
            coef0: args.coef0,
        },
    };
    spec.build()
}

fn predict_command(args: PredictArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let serializable = SerializableModel::load_from_file(&args.model)?;
    let dataset = load_dataset(&args.data, &args.format)?;

    info!(
        "Making predictions using model with {} support vectors",
        serializable.metadata.n_support_vectors
    );
    let predictions = predict_all(&serializable, &*dataset)?;

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(std::io::stdout().lock()),
    };

    writeln!(out, "# Predictions for {} samples", predictions.len())?;
    writeln!(
        out,
        "# Format: sample_index prediction{}",
        if args.scores { " decision_value" } else { "" }
    )?;
    for (i, pred) in predictions.iter().enumerate() {
        if args.scores {
            writeln!(out, "{} {} {:.6}", i, pred.label, pred.decision_value)?;
        } else {
            writeln!(out, "{} {}", i, pred.label)?;
        }
    }
    out.flush()?;

    if let Some(path) = &args.output {
        info!("Predictions saved to: {path:?}");
    }
    Ok(())
}

fn evaluate_command(args: EvaluateArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let serializable = SerializableModel::load_from_file(&args.model)?;
    let dataset = load_dataset(&args.data, &args.format)?;
    let predicted = labels_of(&predict_all(&serializable, &*dataset)?);
    let actual = dataset.get_labels();

    println!("=== Model Evaluation ===");
    serializable.print_summary();
    println!("\nTest Results ({} samples):", actual.len());

    match serializable.task {
        ModelTask::Classification => {
            let positive = serializable.classes.map_or(1.0, |[_, high]| high);
            let metrics = EvaluationMetrics::from_labels(&predicted, &actual, positive);
            println!("  Accuracy:        {:.2}%", metrics.accuracy() * 100.0);
            println!("  True Positives:  {}", metrics.true_positives);
            println!("  True Negatives:  {}", metrics.true_negatives);
            println!("  False Positives: {}", metrics.false_positives);
            println!("  False Negatives: {}", metrics.false_negatives);
            println!("  Precision:       {:.4}", metrics.precision());
            println!("  Recall:          {:.4}", metrics.recall());
            println!("  F1 Score:        {:.4}", metrics.f1_score());
            println!("  Specificity:     {:.4}", metrics.specificity());
        }
        ModelTask::Regression => {
            let metrics = RegressionMetrics::from_predictions(&predicted, &actual);
            println!("  MSE:  {:.6}", metrics.mse);
            println!("  RMSE: {:.6}", metrics.rmse());
            println!("  MAE:  {:.6}", metrics.mae);
            println!("  R^2:  {:.4}", metrics.r2);
        }
    }
    Ok(())
}

fn info_command(args: InfoArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let serializable = SerializableModel::load_from_file(&args.model)?;
    serializable.print_summary();

    println!("\nSupport Vector Details:");
    println!("  Total: {}", serializable.support_vectors.len());
    if let Some(first_sv) = serializable.support_vectors.first() {
        println!("  First SV non-zeros: {}", first_sv.indices.len());
        println!(
            "  First SV indices: {:?}",
            &first_sv.indices[..first_sv.indices.len().min(5)]
        );
    }

    println!("\nCoefficients:");
    let coefficients = &serializable.coefficients;
    let n_show = coefficients.len().min(10);
    for (&index, &coef) in serializable
        .support_indices
        .iter()
        .zip(coefficients)
        .take(n_show)
    {
        println!("  sample {index}: {coef:.6}");
    }
    if coefficients.len() > n_show {
        println!("  ... ({} more)", coefficients.len() - n_show);
    }
    Ok(())
}

fn predict_all(serializable: &SerializableModel, dataset: &dyn Dataset) -> Result<Vec<Prediction>> {
    Ok(match serializable.task {
        ModelTask::Classification => serializable
            .to_classifier()?
            .predict_batch(dataset.samples()),
        ModelTask::Regression => serializable.to_regressor()?.predict_batch(dataset.samples()),
    })
}

fn labels_of(predictions: &[Prediction]) -> Vec<f64> {
    predictions.iter().map(|p| p.label).collect()
}

fn load_dataset(path: &Path, format: &str) -> Result<Box<dyn Dataset>> {
    let format = if format == "auto" {
        detect_format(path)
    } else {
        format.to_string()
    };
    info!("Loading {path:?} as {format} format");

    match format.as_str() {
        "libsvm" => Ok(Box::new(LibSVMDataset::from_file(path)?)),
        "csv" => Ok(Box::new(CSVDataset::from_file(path)?)),
        _ => Err(SVMError::InvalidParameter(format!(
            "Unsupported format: {format}. Use 'libsvm' or 'csv'"
        ))),
    }
}

fn detect_format(path: &Path) -> String {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("csv") => "csv".to_string(),
        Some("libsvm") | Some("svm") => "libsvm".to_string(),
        Some(_) => {
            warn!("Unknown file extension, assuming LibSVM format");
            "libsvm".to_string()
        }
        None => {
            warn!("No file extension, assuming LibSVM format");
            "libsvm".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(detect_format(&PathBuf::from("test.csv")), "csv");
        assert_eq!(detect_format(&PathBuf::from("test.libsvm")), "libsvm");
        assert_eq!(detect_format(&PathBuf::from("test.svm")), "libsvm");
        assert_eq!(detect_format(&PathBuf::from("test")), "libsvm");
    }

    #[test]
    fn test_cli_parses_regression_training() {
        let cli = Cli::parse_from([
            "dualsvm", "train", "--data", "d.csv", "-o", "m.json", "--task", "regress", "-C",
            "10", "--kernel", "rbf", "--gamma", "0.5", "--no-bias", "--strategy", "mod1",
        ]);
        match cli.command {
            Commands::Train(args) => {
                assert_eq!(args.task, CliTask::Regress);
                assert_eq!(args.c, 10.0);
                assert!(args.no_bias);
                let kernel = build_kernel(&args, 4).unwrap();
                assert_eq!(kernel.spec(), KernelSpec::Rbf { gamma: 0.5 });
            }
            _ => panic!("expected train command"),
        }
    }
}
