use anyhow::Context;
use clap::Parser;
use geo_sentinel::core::models::save_json;
use geo_sentinel::core::training::{self, ClassificationReport, LabelledSet};
use geo_sentinel::utils::logger;

#[derive(Parser)]
#[command(name = "train_tsunami")]
#[command(about = "Train the tsunami risk classifier from a historical tsunami dataset")]
struct Args {
    /// Dataset CSV with EQ_MAGNITUDE, EQ_DEPTH and TS_INTENSITY columns
    #[arg(short, long, default_value = "tsunami_dataset.csv")]
    input: String,

    /// Where to write the serialized model
    #[arg(short, long, default_value = "tsunami_predictor_model.json")]
    output: String,

    /// Share of each class held out for evaluation
    #[arg(long, default_value = "0.3")]
    test_fraction: f64,

    #[arg(long, default_value = "42")]
    seed: u64,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    if !(args.test_fraction > 0.0 && args.test_fraction < 1.0) {
        anyhow::bail!("--test-fraction must be between 0 and 1, got {}", args.test_fraction);
    }

    tracing::info!("🚀 Training tsunami predictor");
    tracing::info!("📁 Loading dataset from: {}", args.input);

    let data = LabelledSet::from_csv(&args.input)
        .with_context(|| format!("failed to prepare training data from {}", args.input))?;

    let [none, tsunami] = data.class_counts();
    println!("📋 Target distribution:");
    println!("  0 (no tsunami): {}", none);
    println!("  1 (tsunami):    {}", tsunami);
    println!();

    let (train, test) = data.stratified_split(args.test_fraction, args.seed);
    let model = training::train_tsunami_model(&train, args.seed)
        .context("random forest training failed")?;

    println!("📊 Classification report on {} held-out rows:", test.labels.len());
    println!("{}", ClassificationReport::evaluate(&model, &test));

    save_json(&model, &args.output)
        .with_context(|| format!("failed to write model to {}", args.output))?;

    println!("✅ Model saved to {}", args.output);
    Ok(())
}
