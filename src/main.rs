use clap::Parser;
use geo_sentinel::utils::{logger, validation::Validate};
use geo_sentinel::{CliConfig, CommandCenter, LocalStorage, ModelSet, SentinelConfig, SentinelError};
use std::path::Path;

const DEFAULT_CONFIG: &str = "geo-sentinel.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliConfig::parse();

    // 先載入配置，才知道日誌格式
    let mut config = if args.config == DEFAULT_CONFIG && !Path::new(DEFAULT_CONFIG).exists() {
        SentinelConfig::default()
    } else {
        match SentinelConfig::from_file(&args.config) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
                eprintln!("💡 Make sure the file exists and is valid TOML format");
                std::process::exit(1);
            }
        }
    };

    logger::init_logger(&config.monitoring.log_format, args.verbose);

    tracing::info!("🚀 Starting geo-sentinel command center");
    tracing::info!("📁 Configuration: {}", args.config);

    // 應用命令列覆蓋設定
    if args.advanced {
        config.polling.advanced = true;
        tracing::info!("🔧 Advanced mode enabled");
    }
    if let Some(path) = &args.output_path {
        config.output.path = path.clone();
        tracing::info!("🔧 Output path overridden to: {}", path);
    }
    if let Some(monitor) = args.monitor {
        config.monitoring.enabled = monitor;
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No feeds will be polled");
        perform_dry_run(&config);
        return Ok(());
    }

    if config.monitoring_enabled() {
        tracing::info!("🔍 Runtime monitoring enabled");
    }

    // 模型缺失屬於致命錯誤
    let models = match ModelSet::load(
        &config.models.anomaly_model_path,
        &config.models.tsunami_model_path,
    ) {
        Ok(models) => models,
        Err(e) => fail(e),
    };

    let storage = LocalStorage::new(config.output_path().to_string());
    let mut center = match CommandCenter::with_models(storage, models, &config) {
        Ok(center) => center,
        Err(e) => fail(e),
    };

    if let Some(start) = args.playback_start {
        match center.playback(start, args.playback_end).await {
            Ok(report) => {
                println!(
                    "✅ Playback {} to {}: {} events, {} anomalous",
                    report.start, report.end, report.events, report.anomalies
                );
                for path in &report.exported {
                    println!("📁 {}", path);
                }
                if args.sitrep {
                    println!("\n{}", report.sitrep);
                }
            }
            Err(e) => fail(e),
        }
        return Ok(());
    }

    if args.once {
        match center.run_once().await {
            Ok(exported) => {
                println!("✅ Poll cycle completed, {} alerts raised", center.state().alerts.len());
                for path in &exported {
                    println!("📁 {}", path);
                }
                if args.sitrep {
                    println!("\n{}", center.sitrep());
                }
            }
            Err(e) => fail(e),
        }
        return Ok(());
    }

    if let Err(e) = center.run().await {
        fail(e);
    }
    if args.sitrep {
        println!("{}", center.sitrep());
    }

    Ok(())
}

fn fail(e: SentinelError) -> ! {
    tracing::error!(
        "❌ geo-sentinel failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼，Low 仍視為失敗
    std::process::exit(e.exit_code().max(1))
}

fn display_config_summary(config: &SentinelConfig, args: &CliConfig) {
    println!("📋 Configuration Summary:");
    println!("  USGS: {}", config.sources.usgs_summary_url);
    println!("  DONKI: {}", config.sources.donki_base_url);
    println!("  Output: {}", config.output_path());
    println!("  Advanced Mode: {}", config.polling.advanced);
    println!("  Risk Zones: {}", config.risk_zones.len());

    if let Some(start) = args.playback_start {
        println!(
            "  Playback: {} to {}",
            start,
            args.playback_end.unwrap_or(start)
        );
    }

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

fn perform_dry_run(config: &SentinelConfig) {
    println!("🔍 Dry Run Analysis:");
    println!();

    println!("📡 Feeds:");
    let sources = &config.sources;
    for (name, url) in [
        ("USGS summary", &sources.usgs_summary_url),
        ("USGS query", &sources.usgs_query_url),
        ("NASA DONKI", &sources.donki_base_url),
        ("NOAA flare probability", &sources.noaa_flare_probability_url),
        ("NOAA Kp", &sources.noaa_kp_url),
        ("NOAA solar wind", &sources.noaa_solar_wind_url),
        ("JPL CAD", &sources.jpl_cad_url),
        ("GDACS", &sources.gdacs_rss_url),
    ] {
        println!("  {}: {}", name, url);
    }
    println!(
        "  NASA API key: {}",
        if config.nasa_api_key() == "DEMO_KEY" { "DEMO_KEY" } else { "custom" }
    );

    println!();
    println!("⏱️ Polling (seconds):");
    let polling = &config.polling;
    println!("  Seismic: {}", polling.seismic_period());
    println!("  Solar: {}", polling.solar_seconds);
    println!("  Kp: {}", polling.kp_seconds);
    println!("  Solar wind: {}", polling.solar_wind_seconds);
    println!("  Asteroids: {}", polling.asteroid_seconds);
    println!("  Disasters: {}", polling.disaster_seconds);

    println!();
    println!("🎯 Thresholds:");
    let t = &config.thresholds;
    println!("  Anomaly alert: {} (strategic: {})", t.anomaly_alert, t.strategic_anomaly);
    println!("  Magnitude ≥ {} or depth ≤ {} km", t.seismic_magnitude, t.seismic_depth_km);
    println!("  Tsunami: P > {} and M > {}", t.tsunami_probability, t.tsunami_magnitude);
    println!("  Kp ≥ {}, CME ≥ {} km/s, NEO ≤ {} LD", t.kp_index, t.cme_speed_km_s, t.neo_distance_ld);

    println!();
    println!("🗺️ Risk Zones:");
    for zone in &config.risk_zones {
        println!("  {} ({:?}, {} vertices)", zone.name, zone.kind, zone.vertices.len());
    }

    println!();
    println!("💾 Models:");
    for path in [&config.models.anomaly_model_path, &config.models.tsunami_model_path] {
        let status = if Path::new(path).exists() { "found" } else { "MISSING" };
        println!("  {} ({})", path, status);
    }

    println!();
    println!("✅ Dry run analysis complete. Use --verbose for more details during actual run.");
}
