use anyhow::Context;
use clap::Parser;
use geo_sentinel::core::models::save_json;
use geo_sentinel::core::training::{self, AnomalyTrainingSet};
use geo_sentinel::utils::logger;

#[derive(Parser)]
#[command(name = "train_anomaly")]
#[command(about = "Train the seismic anomaly detector from an earthquake catalog")]
struct Args {
    /// Catalog CSV with Depth, Magnitude and Type columns
    #[arg(short, long, default_value = "earthquake.csv")]
    input: String,

    /// Where to write the serialized model
    #[arg(short, long, default_value = "anomaly_detector_model.json")]
    output: String,

    /// Random seed for the isolation forest
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    tracing::info!("🚀 Training anomaly detector");
    tracing::info!("📁 Loading catalog from: {}", args.input);

    let set = AnomalyTrainingSet::from_csv(&args.input)
        .with_context(|| format!("failed to prepare training data from {}", args.input))?;

    println!("📋 Training Data:");
    println!("  Complete rows: {}", set.total_rows);
    println!("  Earthquakes used for training: {}", set.earthquakes.len());
    println!("  Contamination (explosion share): {:.4}", set.contamination);
    println!();

    let detector = training::train_anomaly_detector(&set, args.seed)
        .context("isolation forest training failed")?;
    save_json(&detector, &args.output)
        .with_context(|| format!("failed to write model to {}", args.output))?;

    println!("✅ Model saved to {}", args.output);
    Ok(())
}
