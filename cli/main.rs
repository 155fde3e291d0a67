#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]

use clap::{Args, CommandFactory, Parser, Subcommand};
use edrvfl::data::{LoadOptions, load_dataset};
use edrvfl::{Activation, EnsembleDeepRvfl, ModelConfig, Prediction};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use std::process;

#[derive(Args)]
pub struct RunArgs {
    /// Path to a CSV or TSV file with a header row and an integer label column
    #[arg(value_name = "DATA")]
    pub data: PathBuf,

    /// TOML file with model hyperparameters; flags below take precedence over it
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Fraction of samples used for training; the rest is held out for validation
    #[arg(long, default_value = "0.9")]
    pub split: f64,

    /// Name of the column holding class labels
    #[arg(long, default_value = "label")]
    pub label_column: String,

    /// Field delimiter (defaults to tab for .tsv files and comma otherwise)
    #[arg(long, value_name = "CHAR")]
    pub delimiter: Option<char>,

    /// Number of enhancement nodes per layer
    #[arg(long, value_name = "N")]
    pub n_nodes: Option<usize>,

    /// Ridge regularization strength
    #[arg(long, value_name = "LAMBDA")]
    pub lam: Option<f64>,

    /// Number of stacked layers
    #[arg(long, value_name = "N")]
    pub n_layer: Option<usize>,

    /// Activation function (sigmoid, sine, hardlim, tribas, radbas, sign, relu, leaky_relu)
    #[arg(long, value_name = "NAME")]
    pub activation: Option<String>,

    /// Standardize each layer input with one scalar mean and std
    #[arg(long)]
    pub same_feature: bool,

    /// Seed for the data split and the random projections
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,
}

#[derive(Parser)]
#[command(
    name = "edrvfl",
    about = "Ensemble deep random vector functional link classifier",
    long_about = "Trains a stack of random-projection layers with closed-form ridge output \
                 weights and reports held-out accuracy of the layer-voted ensemble."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a labeled dataset, train the ensemble and report accuracy
    #[command(about = "Train on a split of the data and report validation accuracy")]
    Run(RunArgs),

    /// Display version information
    #[command(about = "Display version information")]
    Version,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Cli { command } = Cli::parse();
    let result: Result<(), Box<dyn std::error::Error>> = match command {
        Some(Commands::Run(args)) => run(args),
        Some(Commands::Version) => {
            print_version_info();
            Ok(())
        }
        None => Cli::command()
            .print_help()
            .map(|()| println!())
            .map_err(Into::into),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// Reads the file config (or defaults), applies command-line overrides, then validates
/// the result.
fn resolve_config(args: &RunArgs) -> Result<ModelConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => {
            println!("Loading model configuration from: {}", path.display());
            ModelConfig::read(path)?
        }
        None => ModelConfig::default(),
    };

    if let Some(n_nodes) = args.n_nodes {
        config.n_nodes = n_nodes;
    }
    if let Some(lam) = args.lam {
        config.lam = lam;
    }
    if let Some(n_layer) = args.n_layer {
        config.n_layer = n_layer;
    }
    if let Some(name) = &args.activation {
        config.activation = name.parse::<Activation>()?;
    }
    if args.same_feature {
        config.same_feature = true;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }

    config.validate()?;
    Ok(config)
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(&args)?;

    let delimiter = match args.delimiter {
        Some(c) if c.is_ascii() => Some(c as u8),
        Some(c) => return Err(format!("Delimiter '{c}' must be a single ASCII character.").into()),
        None => None,
    };
    let options = LoadOptions {
        label_column: args.label_column.clone(),
        delimiter,
    };

    println!("Loading data from: {}", args.data.display());
    let dataset = load_dataset(&args.data, &options)?;
    println!(
        "Loaded {} samples with {} features and {} classes",
        dataset.n_samples(),
        dataset.n_features(),
        dataset.num_classes
    );

    // One generator drives both the split and the projections, so a seed fixes the whole run.
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let (train, validation) = dataset.split(args.split, &mut rng)?;
    println!(
        "Training on {} samples, validating on {}",
        train.n_samples(),
        validation.n_samples()
    );

    println!(
        "Model: {} layers x {} {} nodes, lam = {}, same_feature = {}",
        config.n_layer, config.n_nodes, config.activation, config.lam, config.same_feature
    );
    let mut model = EnsembleDeepRvfl::new(config)?;
    model.train_with_rng(
        train.features.view(),
        train.labels.view(),
        train.num_classes,
        &mut rng,
    )?;

    if let Prediction::Labels(predicted) = model.predict(validation.features.view(), false)? {
        let mut counts = vec![0usize; train.num_classes];
        for &label in predicted.iter() {
            counts[label] += 1;
        }
        println!(
            "Validation predictions per class: {}",
            counts
                .iter()
                .enumerate()
                .map(|(class, count)| format!("{class}: {count}"))
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    let validation_accuracy = model.eval(validation.features.view(), validation.labels.view())?;
    let training_accuracy = model.eval(train.features.view(), train.labels.view())?;
    println!("Validation accuracy: {:.4}", validation_accuracy);
    println!("Training accuracy: {:.4}", training_accuracy);

    Ok(())
}

fn print_version_info() {
    let version = env!("CARGO_PKG_VERSION");
    let release_tag = option_env!("EDRVFL_RELEASE_TAG");

    println!("edrvfl {}", version);
    match release_tag {
        Some(tag) => println!("Release: {}", tag),
        None => println!("Release: development build"),
    }
}
