use crate::app::state::{AppState, Mode};
use crate::config::toml_config::{OutputConfig, PollingConfig, SentinelConfig};
use crate::core::classifier::{self, Thresholds};
use crate::core::export;
use crate::core::feeds::donki::{self, CmeFeed, FlareFeed};
use crate::core::feeds::gdacs::GdacsFeed;
use crate::core::feeds::jpl::{self, CloseApproachFeed};
use crate::core::feeds::noaa::{FlareProbabilityFeed, KpIndexFeed, SolarWindFeed};
use crate::core::feeds::usgs::UsgsFeed;
use crate::core::geofence::RiskZone;
use crate::core::http::FeedClient;
use crate::core::models::ModelSet;
use crate::core::sitrep;
use crate::domain::model::SeismicEvent;
use crate::domain::ports::{AnomalyScorer, Feed, Storage, TsunamiPredictor};
use crate::utils::error::{Result, SentinelError};
use crate::utils::monitor::RuntimeMonitor;
use chrono::{Duration, NaiveDate, Utc};
use tokio::time::{interval, MissedTickBehavior};

/// Every upstream the command center polls.
#[derive(Debug, Clone)]
pub struct Feeds {
    pub usgs: UsgsFeed,
    pub flares: FlareFeed,
    pub cmes: CmeFeed,
    pub flare_probability: FlareProbabilityFeed,
    pub kp: KpIndexFeed,
    pub solar_wind: SolarWindFeed,
    pub asteroids: CloseApproachFeed,
    pub disasters: GdacsFeed,
}

impl Feeds {
    pub fn from_config(config: &SentinelConfig) -> Result<Self> {
        let client = FeedClient::new(config.sources.timeout_seconds)?;
        let sources = &config.sources;
        let api_key = config.nasa_api_key();

        Ok(Self {
            usgs: UsgsFeed::new(client.clone(), &sources.usgs_summary_url, &sources.usgs_query_url),
            flares: FlareFeed::new(client.clone(), &sources.donki_base_url, api_key),
            cmes: CmeFeed::new(
                client.clone(),
                &sources.donki_base_url,
                api_key,
                config.thresholds.cme_speed_km_s,
            ),
            flare_probability: FlareProbabilityFeed::new(client.clone(), &sources.noaa_flare_probability_url)?,
            kp: KpIndexFeed::new(client.clone(), &sources.noaa_kp_url),
            solar_wind: SolarWindFeed::new(client.clone(), &sources.noaa_solar_wind_url),
            asteroids: CloseApproachFeed::new(
                client.clone(),
                &sources.jpl_cad_url,
                config.thresholds.neo_distance_ld,
            ),
            disasters: GdacsFeed::new(client, &sources.gdacs_rss_url),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub events: usize,
    pub anomalies: usize,
    pub sitrep: String,
    pub exported: Vec<String>,
}

/// 記錄失敗後繼續，等下一次輪詢
fn log_failure<T>(feed: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!(
                "❌ {} poll failed: {} (Category: {:?})",
                feed,
                e,
                e.category()
            );
            None
        }
    }
}

pub struct CommandCenter<S: Storage> {
    storage: S,
    scorer: Box<dyn AnomalyScorer>,
    predictor: Box<dyn TsunamiPredictor>,
    feeds: Feeds,
    zones: Vec<RiskZone>,
    thresholds: Thresholds,
    polling: PollingConfig,
    output: OutputConfig,
    state: AppState,
    monitor: RuntimeMonitor,
    cycle: u64,
}

impl<S: Storage> CommandCenter<S> {
    pub fn new(
        storage: S,
        scorer: Box<dyn AnomalyScorer>,
        predictor: Box<dyn TsunamiPredictor>,
        config: &SentinelConfig,
    ) -> Result<Self> {
        Ok(Self {
            storage,
            scorer,
            predictor,
            feeds: Feeds::from_config(config)?,
            zones: config.risk_zones.clone(),
            thresholds: config.thresholds.clone(),
            polling: config.polling.clone(),
            output: config.output.clone(),
            state: AppState::new(config.polling.advanced),
            monitor: RuntimeMonitor::new(config.monitoring_enabled()),
            cycle: 0,
        })
    }

    pub fn with_models(storage: S, models: ModelSet, config: &SentinelConfig) -> Result<Self> {
        Self::new(storage, Box::new(models.anomaly), Box::new(models.tsunami), config)
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Marks the last day's events as already seen. The seed counts as done
    /// even when the fetch fails so live polling can start.
    pub async fn seed(&mut self) -> usize {
        let ids = log_failure(self.feeds.usgs.name(), self.feeds.usgs.fetch_seed_ids().await)
            .unwrap_or_default();
        let added = self.state.complete_seed(ids);
        tracing::info!("🌱 Seeded {} existing seismic events", added);
        added
    }

    fn process_events(&mut self, events: Vec<SeismicEvent>) -> (usize, usize) {
        let now = Utc::now();
        let mut processed = 0;
        let mut anomalies = 0;

        for event in events {
            if !self.state.claim(&event.id) {
                continue;
            }
            let assessment = classifier::assess(
                event,
                self.scorer.as_ref(),
                self.predictor.as_ref(),
                &self.zones,
                &self.thresholds,
            );
            if assessment.classification.is_anomalous() {
                anomalies += 1;
            }
            self.state.record_assessment(assessment, now);
            processed += 1;
        }

        (processed, anomalies)
    }

    /// Returns the number of new events.
    pub async fn poll_seismic(&mut self) -> Result<usize> {
        if self.state.mode() == Mode::Playback {
            return Ok(0);
        }
        if !self.state.seed_complete() {
            self.seed().await;
        }

        let events = self.feeds.usgs.fetch_live().await?;
        let (processed, anomalies) = self.process_events(events);
        if processed > 0 {
            tracing::info!("🌍 {} new seismic events ({} anomalous)", processed, anomalies);
        }
        Ok(processed)
    }

    pub async fn poll_flares(&mut self) -> Result<()> {
        let flares = self.feeds.flares.fetch().await?;
        if let Some(strongest) = donki::strongest_flare(&flares) {
            tracing::info!(
                "☀️ {} flares in window, strongest {} (geo-effective: {})",
                flares.len(),
                strongest.class_type,
                strongest.geoeffective
            );
        }
        let threats = flares.iter().filter(|f| f.is_threat()).count();
        if threats > 0 {
            tracing::warn!("⚠️ {} geo-effective M/X flares", threats);
        }
        self.state.apply_flares(flares);
        Ok(())
    }

    pub async fn poll_cmes(&mut self) -> Result<()> {
        let cmes = self.feeds.cmes.fetch().await?;
        tracing::info!(
            "🌞 {} Earth-bound CMEs, next ETA {}",
            cmes.count(),
            cmes.next_arrival().unwrap_or("N/A")
        );
        tracing::debug!("CME launches per day: {:?}", cmes.daily_counts);
        self.state.apply_cmes(cmes);
        Ok(())
    }

    pub async fn poll_flare_probability(&mut self) -> Result<()> {
        let probability = self.feeds.flare_probability.fetch().await?;
        self.state.apply_flare_probability(probability, Utc::now());
        Ok(())
    }

    /// Flares, CME analysis and flare probability; each feed fails on its own.
    pub async fn poll_solar(&mut self) {
        let flares = self.poll_flares().await;
        log_failure(self.feeds.flares.name(), flares);
        let cmes = self.poll_cmes().await;
        log_failure(self.feeds.cmes.name(), cmes);
        let probability = self.poll_flare_probability().await;
        log_failure(self.feeds.flare_probability.name(), probability);
    }

    pub async fn poll_kp(&mut self) -> Result<()> {
        let kp = self.feeds.kp.fetch().await?;
        self.state.apply_kp(kp, self.thresholds.kp_index, Utc::now());
        Ok(())
    }

    pub async fn poll_solar_wind(&mut self) -> Result<()> {
        let sample = self.feeds.solar_wind.fetch().await?;
        self.state.apply_solar_wind(sample, Utc::now());
        Ok(())
    }

    pub async fn poll_asteroids(&mut self) -> Result<()> {
        let approaches = self.feeds.asteroids.fetch().await?;
        let summary = jpl::summarize(&approaches);
        tracing::info!(
            "☄️ {} close approaches, closest {:?}, {} high risk",
            approaches.len(),
            summary.closest.as_ref().map(|(name, _)| name),
            summary.high_risk
        );
        self.state.apply_close_approaches(approaches, Utc::now());
        Ok(())
    }

    pub async fn poll_disasters(&mut self) -> Result<()> {
        let disasters = self.feeds.disasters.fetch().await?;
        tracing::info!("🌐 {} GDACS events", disasters.len());
        self.state.apply_disasters(disasters, Utc::now());
        Ok(())
    }

    fn next_cycle(&mut self) {
        self.cycle += 1;
        self.monitor.log_cycle(self.cycle);
    }

    /// Polls every feed once; individual failures are logged and skipped.
    pub async fn run_once(&mut self) -> Result<Vec<String>> {
        let seismic = self.poll_seismic().await;
        log_failure(self.feeds.usgs.name(), seismic);
        self.poll_solar().await;
        let kp = self.poll_kp().await;
        log_failure(self.feeds.kp.name(), kp);
        let wind = self.poll_solar_wind().await;
        log_failure(self.feeds.solar_wind.name(), wind);
        let asteroids = self.poll_asteroids().await;
        log_failure(self.feeds.asteroids.name(), asteroids);
        let disasters = self.poll_disasters().await;
        log_failure(self.feeds.disasters.name(), disasters);

        self.next_cycle();
        self.export().await
    }

    pub fn sitrep(&self) -> String {
        sitrep::generate(&self.state, Utc::now())
    }

    pub async fn export(&self) -> Result<Vec<String>> {
        let report = self.sitrep();
        export::export_snapshot(&self.storage, &self.state, &report, &self.output.bundle_filename).await
    }

    /// Replays one or more whole days of M3+ events, exports the snapshot,
    /// then returns to live mode.
    pub async fn playback(&mut self, start: NaiveDate, end: Option<NaiveDate>) -> Result<PlaybackReport> {
        let end = end.unwrap_or(start);
        if end < start {
            return Err(SentinelError::ValidationError {
                message: format!("Playback end {} is before start {}", end, start),
            });
        }

        self.state.enter_playback();
        tracing::info!("⏪ Replaying seismic events from {} to {}", start, end);

        let outcome = self.replay(start, end).await;
        self.stop_playback().await;
        outcome
    }

    async fn replay(&mut self, start: NaiveDate, end: NaiveDate) -> Result<PlaybackReport> {
        let end_exclusive = end + Duration::days(1);
        let events = self.feeds.usgs.fetch_playback(start, end_exclusive).await?;
        let total = events.len();
        let (processed, anomalies) = self.process_events(events);
        tracing::info!(
            "⏹️ Playback finished: {} events ({} duplicates skipped), {} anomalous",
            processed,
            total - processed,
            anomalies
        );

        // 切回即時模式前先匯出回放結果
        let sitrep = self.sitrep();
        let exported = export::export_snapshot(
            &self.storage,
            &self.state,
            &sitrep,
            &self.output.bundle_filename,
        )
        .await?;

        Ok(PlaybackReport {
            start,
            end,
            events: processed,
            anomalies,
            sitrep,
            exported,
        })
    }

    pub async fn stop_playback(&mut self) {
        if self.state.mode() == Mode::Playback {
            self.state.enter_live();
            self.seed().await;
        }
    }

    /// Polls on per-feed timers until Ctrl-C, then writes a final snapshot.
    pub async fn run(&mut self) -> Result<()> {
        let period = |seconds: u64| {
            let mut timer = interval(std::time::Duration::from_secs(seconds));
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer
        };
        let mut seismic = period(self.polling.seismic_period());
        let mut solar = period(self.polling.solar_seconds);
        let mut kp = period(self.polling.kp_seconds);
        let mut wind = period(self.polling.solar_wind_seconds);
        let mut asteroids = period(self.polling.asteroid_seconds);
        let mut disasters = period(self.polling.disaster_seconds);

        tracing::info!(
            "📡 Command center live (seismic every {}s, advanced: {})",
            self.polling.seismic_period(),
            self.state.is_advanced()
        );

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = seismic.tick() => {
                    let result = self.poll_seismic().await;
                    log_failure("usgs", result);
                    self.next_cycle();
                    if self.output.export_every_cycle {
                        let exported = self.export().await;
                        log_failure("export", exported);
                    }
                }
                _ = solar.tick() => {
                    self.poll_solar().await;
                }
                _ = kp.tick() => {
                    let result = self.poll_kp().await;
                    log_failure("noaa-kp", result);
                }
                _ = wind.tick() => {
                    let result = self.poll_solar_wind().await;
                    log_failure("noaa-solar-wind", result);
                }
                _ = asteroids.tick() => {
                    let result = self.poll_asteroids().await;
                    log_failure("jpl-cad", result);
                }
                _ = disasters.tick() => {
                    let result = self.poll_disasters().await;
                    log_failure("gdacs", result);
                }
                _ = &mut shutdown => {
                    tracing::info!("🛑 Shutdown requested");
                    break;
                }
            }
        }

        let exported = self.export().await?;
        tracing::info!("📁 Final snapshot: {}", exported.join(", "));
        Ok(())
    }
}
