use crate::core::feeds::donki::CmeSummary;
use crate::core::feeds::noaa::{FlareProbability, SolarWindSample};
use crate::domain::model::{
    Alert, AlertSource, CloseApproach, DisasterAlert, EventAssessment, FlareRecord, RiskLevel,
    SpaceWeather,
};
use chrono::{DateTime, Duration, DurationRound, Utc};
use std::collections::{BTreeMap, HashSet, VecDeque};

pub const TIME_SERIES_CAPACITY: usize = 50;
pub const FREQUENCY_WINDOW_MINUTES: i64 = 10;
pub const FLARE_PROBABILITY_HISTORY: usize = 24;
pub const SOLAR_WIND_HISTORY: usize = 60;
/// 即時模式下保留的事件與警報筆數；回放不裁切
pub const SEISMIC_LOG_CAPACITY: usize = 1_000;
pub const ALERT_LOG_CAPACITY: usize = 500;
pub const PROCESSED_ID_CAPACITY: usize = 10_000;
pub const ALERT_KEY_CAPACITY: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Live,
    Playback,
}

/// 指揮中心唯一的可變狀態，由 `CommandCenter` 擁有
#[derive(Debug, Clone)]
pub struct AppState {
    mode: Mode,
    advanced: bool,
    seed_complete: bool,
    processed_ids: RecentKeys,
    /// Keys of non-seismic alerts already raised, so re-polls stay quiet.
    alerted: RecentKeys,

    pub seismic_log: Vec<EventAssessment>,
    pub time_series: VecDeque<(DateTime<Utc>, f64)>,
    pub frequency: BTreeMap<DateTime<Utc>, usize>,

    pub flares: Vec<FlareRecord>,
    pub cmes: CmeSummary,
    pub space_weather: SpaceWeather,
    pub flare_probability_history: VecDeque<(DateTime<Utc>, FlareProbability)>,
    pub solar_wind_history: VecDeque<(DateTime<Utc>, SolarWindSample)>,

    pub close_approaches: Vec<CloseApproach>,
    pub disasters: Vec<DisasterAlert>,
    pub alerts: Vec<Alert>,
}

fn push_capped<T>(buffer: &mut VecDeque<T>, item: T, capacity: usize) {
    buffer.push_back(item);
    while buffer.len() > capacity {
        buffer.pop_front();
    }
}

fn trim_front<T>(log: &mut Vec<T>, capacity: usize) {
    if log.len() > capacity {
        log.drain(..log.len() - capacity);
    }
}

/// Set of keys that forgets the oldest entries past its capacity.
#[derive(Debug, Clone)]
struct RecentKeys {
    keys: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl RecentKeys {
    fn new(capacity: usize) -> Self {
        Self {
            keys: HashSet::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    fn insert(&mut self, key: String) -> bool {
        if self.keys.contains(&key) {
            return false;
        }
        self.keys.insert(key.clone());
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.keys.remove(&oldest);
            }
        }
        true
    }

    fn len(&self) -> usize {
        self.keys.len()
    }

    fn clear(&mut self) {
        self.keys.clear();
        self.order.clear();
    }
}

impl AppState {
    pub fn new(advanced: bool) -> Self {
        Self {
            mode: Mode::Live,
            advanced,
            seed_complete: false,
            processed_ids: RecentKeys::new(PROCESSED_ID_CAPACITY),
            alerted: RecentKeys::new(ALERT_KEY_CAPACITY),
            seismic_log: Vec::new(),
            time_series: VecDeque::with_capacity(TIME_SERIES_CAPACITY),
            frequency: BTreeMap::new(),
            flares: Vec::new(),
            cmes: CmeSummary::default(),
            space_weather: SpaceWeather::default(),
            flare_probability_history: VecDeque::with_capacity(FLARE_PROBABILITY_HISTORY),
            solar_wind_history: VecDeque::with_capacity(SOLAR_WIND_HISTORY),
            close_approaches: Vec::new(),
            disasters: Vec::new(),
            alerts: Vec::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_advanced(&self) -> bool {
        self.advanced
    }

    pub fn seed_complete(&self) -> bool {
        self.seed_complete
    }

    pub fn processed_count(&self) -> usize {
        self.processed_ids.len()
    }

    /// Remembers pre-existing events without processing them.
    pub fn complete_seed<I: IntoIterator<Item = String>>(&mut self, ids: I) -> usize {
        let added = ids
            .into_iter()
            .filter(|id| self.processed_ids.insert(id.clone()))
            .count();
        self.seed_complete = true;
        added
    }

    /// True the first time an id is seen.
    pub fn claim(&mut self, id: &str) -> bool {
        self.processed_ids.insert(id.to_string())
    }

    fn reset_seismic(&mut self) {
        self.processed_ids.clear();
        self.seismic_log.clear();
        self.time_series.clear();
        self.frequency.clear();
    }

    pub fn enter_playback(&mut self) {
        tracing::info!("⏪ Switching to playback mode");
        self.reset_seismic();
        self.mode = Mode::Playback;
    }

    /// 回到即時模式後需重新同步
    pub fn enter_live(&mut self) {
        tracing::info!("📡 Switching to live mode");
        self.reset_seismic();
        self.seed_complete = false;
        self.mode = Mode::Live;
    }

    fn raise(&mut self, source: AlertSource, title: String, message: String, now: DateTime<Utc>) {
        tracing::warn!("🚨 {}: {}", title, message.replace('\n', " | "));
        self.alerts.push(Alert {
            source,
            title,
            message,
            raised_at: now,
        });
        trim_front(&mut self.alerts, ALERT_LOG_CAPACITY);
    }

    fn raise_once(&mut self, key: String, source: AlertSource, title: String, message: String, now: DateTime<Utc>) {
        if self.alerted.insert(key) {
            self.raise(source, title, message, now);
        }
    }

    /// Adds an assessed event; returns whether it raised an alert.
    pub fn record_assessment(&mut self, assessment: EventAssessment, now: DateTime<Utc>) -> bool {
        if self.advanced && self.mode == Mode::Live {
            let time = assessment.event.timestamp;
            push_capped(
                &mut self.time_series,
                (time, assessment.event.magnitude),
                TIME_SERIES_CAPACITY,
            );

            if let Ok(minute) = time.duration_trunc(Duration::minutes(1)) {
                *self.frequency.entry(minute).or_insert(0) += 1;
                let newest = self.frequency.keys().next_back().copied().unwrap_or(minute);
                let cutoff = newest - Duration::minutes(FREQUENCY_WINDOW_MINUTES);
                self.frequency.retain(|t, _| *t > cutoff);
            }
        }

        // 回放與初始同步完成前不發警報
        let alerting = self.mode == Mode::Live && self.seed_complete;
        let mut raised = false;
        if alerting {
            if let (Some(title), Some(message)) = (
                assessment.classification.alert_title(),
                assessment.alert_message(),
            ) {
                self.raise(AlertSource::Seismic, title.to_string(), message, now);
                raised = true;
            }
        }

        self.seismic_log.push(assessment);
        if self.mode == Mode::Live {
            trim_front(&mut self.seismic_log, SEISMIC_LOG_CAPACITY);
        }
        raised
    }

    pub fn apply_flares(&mut self, flares: Vec<FlareRecord>) {
        self.flares = flares;
    }

    pub fn apply_cmes(&mut self, summary: CmeSummary) {
        self.cmes = summary;
    }

    pub fn apply_flare_probability(&mut self, probability: FlareProbability, now: DateTime<Utc>) {
        self.space_weather.m_flare_probability = Some(probability.m_class);
        self.space_weather.x_flare_probability = Some(probability.x_class);
        push_capped(
            &mut self.flare_probability_history,
            (now, probability),
            FLARE_PROBABILITY_HISTORY,
        );
    }

    /// Alerts when Kp reaches the threshold from below.
    pub fn apply_kp(&mut self, kp: Option<u32>, threshold: u32, now: DateTime<Utc>) {
        let previous = self.space_weather.kp_index;
        self.space_weather.kp_index = kp;

        let Some(kp) = kp else {
            return;
        };
        let was_below = previous.map_or(true, |p| p < threshold);
        if self.mode == Mode::Live && kp >= threshold && was_below {
            self.raise(
                AlertSource::Geomagnetic,
                "KP-INDEX ALERT".to_string(),
                format!(
                    "Current Kp index is high: {} (threshold: {}). Geomagnetic storm risk!",
                    kp, threshold
                ),
                now,
            );
        }
    }

    pub fn apply_solar_wind(&mut self, sample: Option<SolarWindSample>, now: DateTime<Utc>) {
        let Some(sample) = sample else {
            return;
        };
        self.space_weather.solar_wind_speed = Some(sample.speed_km_s);
        self.space_weather.solar_wind_density = Some(sample.density_p_cc);
        push_capped(&mut self.solar_wind_history, (now, sample), SOLAR_WIND_HISTORY);
    }

    pub fn apply_close_approaches(&mut self, approaches: Vec<CloseApproach>, now: DateTime<Utc>) {
        if self.mode == Mode::Live {
            for approach in approaches.iter().filter(|a| a.risk == RiskLevel::High) {
                self.raise_once(
                    format!("neo:{}:{}", approach.designation, approach.approach_date),
                    AlertSource::Orbital,
                    "ORBITAL ALERT".to_string(),
                    format!(
                        "HIGH-RISK OBJECT DETECTED: {}\nApproach on {} at {:.0} km.\nEstimated diameter: {:.0} m.",
                        approach.designation,
                        approach.approach_date,
                        approach.distance_km,
                        approach.diameter_m
                    ),
                    now,
                );
            }
        }
        self.close_approaches = approaches;
    }

    pub fn apply_disasters(&mut self, disasters: Vec<DisasterAlert>, now: DateTime<Utc>) {
        if self.mode == Mode::Live {
            for disaster in disasters.iter().filter(|d| d.is_severe()) {
                self.raise_once(
                    format!("gdacs:{}:{}:{}", disaster.link, disaster.alert_level, disaster.published),
                    AlertSource::Disaster,
                    "DISASTER ALERT".to_string(),
                    format!(
                        "GDACS: {} alert for {} in {}!",
                        disaster.alert_level, disaster.event_type, disaster.country
                    ),
                    now,
                );
            }
        }
        self.disasters = disasters;
    }
}
