//! cohort-metrics CLI
//!
//! Command-line interface for cross-cohort classifier evaluation and the
//! dysbiosis index.

use clap::{Parser, Subcommand, ValueEnum};
use cohort_metrics::config::{CrossCohortConfig, Verbosity};
use cohort_metrics::cross_cohort::cross_cohort_performance;
use cohort_metrics::data::{AbundanceMatrix, Experiment, MarkerTable, Metadata};
use cohort_metrics::dysbiosis::{dysbiosis_index, DysbiosisMethod};
use cohort_metrics::error::Result;
use cohort_metrics::filter::filter_library_size;
use cohort_metrics::normalize::norm_tss;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// CLI-friendly dysbiosis method enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliMethod {
    /// Count of markers present above the threshold
    Binary,
    /// Summed marker abundances
    Frequency,
    /// Summed per-feature ranks across samples
    Rank,
}

impl From<CliMethod> for DysbiosisMethod {
    fn from(method: CliMethod) -> Self {
        match method {
            CliMethod::Binary => DysbiosisMethod::Binary,
            CliMethod::Frequency => DysbiosisMethod::Frequency,
            CliMethod::Rank => DysbiosisMethod::Rank,
        }
    }
}

/// Cross-cohort classifier performance and dysbiosis index
#[derive(Parser)]
#[command(name = "cohort-metrics")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Loading options shared by both subcommands.
#[derive(clap::Args)]
struct LoadArgs {
    /// Path to abundance table TSV (features × samples)
    #[arg(short, long)]
    input: PathBuf,

    /// Path to sample mapping (metadata) TSV
    #[arg(short, long)]
    map: PathBuf,

    /// Drop samples with fewer total reads
    #[arg(long, default_value = "1000")]
    min_reads: f64,

    /// Rescale each sample to this total (0 disables)
    #[arg(long, default_value = "10000")]
    normalize: f64,
}

#[derive(Subcommand)]
enum Commands {
    /// Train on each cohort, test on every cohort, write ROC and accuracy matrices
    CrossCohort {
        #[command(flatten)]
        load: LoadArgs,

        /// Output path prefix (writes <prefix>_roc.csv and <prefix>_accuracy.csv)
        #[arg(short, long)]
        output: String,

        /// Optional YAML run configuration; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Train on all features of the training cohort instead of the shared subset
        #[arg(long)]
        no_subset: bool,

        /// Shuffle testing labels
        #[arg(long)]
        shuffle: bool,

        /// Shuffle training labels
        #[arg(long)]
        shuffle_source: bool,

        /// Add a unique signature to the output name
        #[arg(long)]
        uname: bool,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Metadata field with the cohort id
        #[arg(long)]
        cohort_field: Option<String>,

        /// Metadata field with the class label
        #[arg(long)]
        label_field: Option<String>,

        /// Number of trees in the random forest
        #[arg(long)]
        n_trees: Option<usize>,

        /// Progress reporting: quiet, normal or detailed
        #[arg(long)]
        verbosity: Option<String>,
    },

    /// Score each sample with the dysbiosis index
    Dysbiosis {
        #[command(flatten)]
        load: LoadArgs,

        /// TSV of features increased in dysbiosis
        #[arg(long)]
        up: PathBuf,

        /// TSV of features increased in health
        #[arg(long)]
        down: PathBuf,

        /// Column holding the feature id in the marker tables
        #[arg(long, default_value = "_feature_id")]
        id_column: String,

        /// Index variant
        #[arg(long, value_enum, default_value = "binary")]
        method: CliMethod,

        /// Presence threshold for the binary index
        #[arg(long, default_value = "0")]
        thresh: f64,

        /// Output TSV (printed to stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print an example cross-cohort YAML configuration
    Example,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::CrossCohort {
            load,
            output,
            config,
            no_subset,
            shuffle,
            shuffle_source,
            uname,
            seed,
            cohort_field,
            label_field,
            n_trees,
            verbosity,
        } => build_config(
            config.as_deref(),
            no_subset,
            shuffle,
            shuffle_source,
            seed,
            cohort_field,
            label_field,
            n_trees,
            verbosity.as_deref(),
        )
        .and_then(|config| cmd_cross_cohort(&load, &output, uname, &config)),
        Commands::Dysbiosis {
            load,
            up,
            down,
            id_column,
            method,
            thresh,
            output,
        } => cmd_dysbiosis(&load, &up, &down, &id_column, method.into(), thresh, output.as_deref()),
        Commands::Example => cmd_example(),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[allow(clippy::too_many_arguments)]
fn build_config(
    path: Option<&Path>,
    no_subset: bool,
    shuffle: bool,
    shuffle_source: bool,
    seed: Option<u64>,
    cohort_field: Option<String>,
    label_field: Option<String>,
    n_trees: Option<usize>,
    verbosity: Option<&str>,
) -> Result<CrossCohortConfig> {
    let mut config = match path {
        Some(p) => CrossCohortConfig::from_yaml_file(p)?,
        None => CrossCohortConfig::default(),
    };
    if no_subset {
        config.use_subset_features = false;
    }
    config.shuffle_test |= shuffle;
    config.shuffle_train |= shuffle_source;
    if seed.is_some() {
        config.seed = seed;
    }
    if let Some(field) = cohort_field {
        config.cohort_field = field;
    }
    if let Some(field) = label_field {
        config.label_field = field;
    }
    if let Some(n) = n_trees {
        config.forest.n_trees = n;
    }
    if let Some(v) = verbosity {
        config.verbosity = Verbosity::from_str(v).ok_or_else(|| {
            cohort_metrics::error::MetricsError::InvalidParameter(format!(
                "unknown verbosity '{}'",
                v
            ))
        })?;
    }
    Ok(config)
}

/// Read the table and mapping file, drop shallow samples and rescale.
fn load_experiment(load: &LoadArgs) -> Result<Experiment> {
    info!("Loading experiment {:?}...", load.input);
    let mut counts = AbundanceMatrix::from_tsv(&load.input)?;
    let metadata = Metadata::from_tsv(&load.map)?;

    if load.min_reads > 0.0 {
        counts = filter_library_size(&counts, load.min_reads)?;
    }
    if load.normalize > 0.0 {
        counts = norm_tss(&counts, load.normalize)?;
    }

    let exp = Experiment::new(counts, metadata)?;
    info!(
        "Loaded {} samples × {} features",
        exp.n_samples(),
        exp.n_features()
    );
    Ok(exp)
}

fn cmd_cross_cohort(
    load: &LoadArgs,
    output: &str,
    uname: bool,
    config: &CrossCohortConfig,
) -> Result<()> {
    let mut name = output.to_string();
    if uname {
        name.push('_');
        name.push_str(&uuid::Uuid::new_v4().to_string());
    }
    info!("Started processing file {}", name);

    let exp = load_experiment(load)?;

    info!("Running the classifier...");
    let result = cross_cohort_performance(&exp, config)?;

    info!("Saving to {}", name);
    let (roc_path, accuracy_path) = result.write(&name)?;
    eprintln!("{}", result.roc);
    eprintln!("{}", result.accuracy);
    info!("Done! Wrote {:?} and {:?}", roc_path, accuracy_path);
    Ok(())
}

fn cmd_dysbiosis(
    load: &LoadArgs,
    up: &Path,
    down: &Path,
    id_column: &str,
    method: DysbiosisMethod,
    thresh: f64,
    output: Option<&Path>,
) -> Result<()> {
    let exp = load_experiment(load)?;
    let markers = MarkerTable::from_tsv_pair(up, down, id_column)?;
    info!(
        "Loaded {} up and {} down markers",
        markers.up_features().len(),
        markers.down_features().len()
    );

    let result = dysbiosis_index(&exp, &markers, method, thresh)?;

    match output {
        Some(path) => {
            result.to_tsv(path)?;
            info!("Wrote {} {} scores to {:?}", result.len(), method.name(), path);
        }
        None => result.to_writer(std::io::stdout().lock())?,
    }
    Ok(())
}

fn cmd_example() -> Result<()> {
    let config = CrossCohortConfig::default().with_seed(42);
    print!("{}", config.to_yaml()?);
    Ok(())
}
