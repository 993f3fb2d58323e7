use crate::core::models::isolation_forest::{IsolationForest, IsolationForestParams};
use crate::core::models::random_forest::{RandomForestClassifier, RandomForestParams};
use crate::core::models::scaler::StandardScaler;
use crate::core::models::{AnomalyDetector, TsunamiModel};
use crate::utils::error::{Result, SentinelError};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

pub const EARTHQUAKE_TYPE: &str = "Earthquake";
pub const EXPLOSION_TYPE: &str = "Nuclear Explosion";

/// earthquake.csv 的一列；其餘欄位忽略
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogRow {
    #[serde(rename = "Depth", default, deserialize_with = "csv::invalid_option")]
    pub depth: Option<f64>,
    #[serde(rename = "Magnitude", default, deserialize_with = "csv::invalid_option")]
    pub magnitude: Option<f64>,
    #[serde(rename = "Type", default)]
    pub event_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TsunamiRow {
    #[serde(rename = "EQ_MAGNITUDE", default, deserialize_with = "csv::invalid_option")]
    pub magnitude: Option<f64>,
    #[serde(rename = "EQ_DEPTH", default, deserialize_with = "csv::invalid_option")]
    pub depth: Option<f64>,
    #[serde(rename = "TS_INTENSITY", default, deserialize_with = "csv::invalid_option")]
    pub intensity: Option<f64>,
}

fn read_rows<T: for<'de> Deserialize<'de>, R: std::io::Read>(reader: R) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

fn open_dataset(path: &Path) -> Result<std::fs::File> {
    std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => SentinelError::ProcessingError {
            message: format!("Training dataset not found: {}", path.display()),
        },
        _ => SentinelError::IoError(e),
    })
}

#[derive(Debug, Clone)]
pub struct AnomalyTrainingSet {
    /// (depth, magnitude) of earthquake rows only
    pub earthquakes: Vec<Vec<f64>>,
    /// Share of explosion rows among all complete rows.
    pub contamination: f64,
    pub total_rows: usize,
}

impl AnomalyTrainingSet {
    pub fn from_rows(rows: &[CatalogRow]) -> Result<Self> {
        let complete: Vec<(f64, f64, &str)> = rows
            .iter()
            .filter_map(|row| Some((row.depth?, row.magnitude?, row.event_type.as_deref()?)))
            .collect();

        if complete.is_empty() {
            return Err(SentinelError::ValidationError {
                message: "No complete rows with Depth, Magnitude and Type".to_string(),
            });
        }

        let explosions = complete.iter().filter(|(_, _, t)| *t == EXPLOSION_TYPE).count();
        let earthquakes: Vec<Vec<f64>> = complete
            .iter()
            .filter(|(_, _, t)| *t == EARTHQUAKE_TYPE)
            .map(|(depth, magnitude, _)| vec![*depth, *magnitude])
            .collect();

        if earthquakes.is_empty() {
            return Err(SentinelError::ValidationError {
                message: format!("No rows of type '{}' to train on", EARTHQUAKE_TYPE),
            });
        }

        Ok(Self {
            contamination: explosions as f64 / complete.len() as f64,
            total_rows: complete.len(),
            earthquakes,
        })
    }

    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let rows: Vec<CatalogRow> = read_rows(open_dataset(path.as_ref())?)?;
        tracing::info!("📥 Read {} catalog rows from {}", rows.len(), path.as_ref().display());
        Self::from_rows(&rows)
    }
}

pub fn train_anomaly_detector(set: &AnomalyTrainingSet, seed: u64) -> Result<AnomalyDetector> {
    let scaler = StandardScaler::fit(&set.earthquakes)?;
    let scaled = scaler.transform(&set.earthquakes);

    let params = IsolationForestParams {
        contamination: Some(set.contamination),
        seed,
        ..IsolationForestParams::default()
    };
    let forest = IsolationForest::fit(&scaled, &params)?;
    let flagged = scaled.iter().filter(|sample| forest.is_outlier(sample)).count();

    tracing::info!(
        "✅ Anomaly detector trained on {} earthquakes (contamination {:.4}, {} flagged as outliers)",
        set.earthquakes.len(),
        set.contamination,
        flagged
    );
    Ok(AnomalyDetector { scaler, forest })
}

#[derive(Debug, Clone)]
pub struct LabelledSet {
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<usize>,
}

impl LabelledSet {
    /// 特徵 (EQ_DEPTH, EQ_MAGNITUDE)，標籤 TS_INTENSITY > 0
    pub fn from_rows(rows: &[TsunamiRow]) -> Result<Self> {
        let (features, labels): (Vec<Vec<f64>>, Vec<usize>) = rows
            .iter()
            .filter_map(|row| {
                let intensity = row.intensity?;
                Some((vec![row.depth?, row.magnitude?], usize::from(intensity > 0.0)))
            })
            .unzip();

        if features.is_empty() {
            return Err(SentinelError::ValidationError {
                message: "No complete rows with EQ_MAGNITUDE, EQ_DEPTH and TS_INTENSITY".to_string(),
            });
        }
        Ok(Self { features, labels })
    }

    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let rows: Vec<TsunamiRow> = read_rows(open_dataset(path.as_ref())?)?;
        tracing::info!("📥 Read {} tsunami rows from {}", rows.len(), path.as_ref().display());
        Self::from_rows(&rows)
    }

    pub fn class_counts(&self) -> [usize; 2] {
        let positives = self.labels.iter().filter(|l| **l == 1).count();
        [self.labels.len() - positives, positives]
    }

    /// Stratified shuffle split; each class keeps `test_fraction` of its rows for testing.
    pub fn stratified_split(&self, test_fraction: f64, seed: u64) -> (LabelledSet, LabelledSet) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut train = Vec::new();
        let mut test = Vec::new();

        for class in 0..2 {
            let mut indices: Vec<usize> = (0..self.labels.len())
                .filter(|&i| self.labels[i] == class)
                .collect();
            indices.shuffle(&mut rng);

            let n_test = (indices.len() as f64 * test_fraction).round() as usize;
            let n_test = n_test.min(indices.len().saturating_sub(1));
            test.extend_from_slice(&indices[..n_test]);
            train.extend_from_slice(&indices[n_test..]);
        }

        train.sort_unstable();
        test.sort_unstable();
        (self.subset(&train), self.subset(&test))
    }

    fn subset(&self, indices: &[usize]) -> LabelledSet {
        LabelledSet {
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }
}

pub fn train_tsunami_model(train: &LabelledSet, seed: u64) -> Result<TsunamiModel> {
    let params = RandomForestParams {
        seed,
        ..RandomForestParams::default()
    };
    let forest = RandomForestClassifier::fit(&train.features, &train.labels, &params)?;
    let [negatives, positives] = train.class_counts();
    tracing::info!(
        "✅ Tsunami model trained on {} rows ({} tsunami, {} none)",
        train.labels.len(),
        positives,
        negatives
    );
    Ok(TsunamiModel { forest })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// 二元分類報告，分母為零時指標記為 0
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub classes: [ClassMetrics; 2],
    pub accuracy: f64,
}

impl ClassificationReport {
    pub fn new(truth: &[usize], predicted: &[usize]) -> Self {
        let metrics = |class: usize| {
            let tp = truth.iter().zip(predicted).filter(|(t, p)| **t == class && **p == class).count();
            let fp = truth.iter().zip(predicted).filter(|(t, p)| **t != class && **p == class).count();
            let support = truth.iter().filter(|t| **t == class).count();

            let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
            let precision = ratio(tp, tp + fp);
            let recall = ratio(tp, support);
            let f1 = if precision + recall == 0.0 {
                0.0
            } else {
                2.0 * precision * recall / (precision + recall)
            };
            ClassMetrics {
                precision,
                recall,
                f1,
                support,
            }
        };

        let correct = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
        Self {
            classes: [metrics(0), metrics(1)],
            accuracy: if truth.is_empty() {
                0.0
            } else {
                correct as f64 / truth.len() as f64
            },
        }
    }

    pub fn evaluate(model: &TsunamiModel, test: &LabelledSet) -> Self {
        let predicted: Vec<usize> = test.features.iter().map(|x| model.forest.predict(x)).collect();
        Self::new(&test.labels, &predicted)
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>12} {:>10} {:>10} {:>10} {:>10}", "", "precision", "recall", "f1-score", "support")?;
        for (class, m) in self.classes.iter().enumerate() {
            writeln!(
                f,
                "{:>12} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                class, m.precision, m.recall, m.f1, m.support
            )?;
        }
        let total: usize = self.classes.iter().map(|m| m.support).sum();
        write!(f, "{:>12} {:>10} {:>10} {:>10.2} {:>10}", "accuracy", "", "", self.accuracy, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_anomaly_set_from_csv() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "Date,Depth,Magnitude,Type\n\
             01/02/1965,131.6,6.0,Earthquake\n\
             01/04/1965,80.0,5.8,Earthquake\n\
             01/05/1965,,6.2,Earthquake\n\
             01/08/1965,0.0,5.6,Nuclear Explosion\n\
             01/09/1965,20.0,5.9,Rock Burst\n"
        )
        .unwrap();

        let set = AnomalyTrainingSet::from_csv(file.path()).unwrap();
        assert_eq!(set.total_rows, 4);
        assert_eq!(set.earthquakes, vec![vec![131.6, 6.0], vec![80.0, 5.8]]);
        assert!((set.contamination - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_missing_dataset_is_reported() {
        let err = AnomalyTrainingSet::from_csv("/nonexistent/earthquake.csv").unwrap_err();
        assert!(err.to_string().contains("earthquake.csv"));
    }

    #[test]
    fn test_train_anomaly_detector_flags_explosion_like_event() {
        let rows: Vec<CatalogRow> = (0..200)
            .map(|i| CatalogRow {
                depth: Some(20.0 + (i % 50) as f64 * 4.0),
                magnitude: Some(5.5 + (i % 10) as f64 * 0.1),
                event_type: Some(EARTHQUAKE_TYPE.to_string()),
            })
            .chain((0..10).map(|_| CatalogRow {
                depth: Some(0.0),
                magnitude: Some(5.6),
                event_type: Some(EXPLOSION_TYPE.to_string()),
            }))
            .collect();

        let set = AnomalyTrainingSet::from_rows(&rows).unwrap();
        let model = train_anomaly_detector(&set, 42).unwrap();

        use crate::domain::ports::AnomalyScorer;
        assert!(model.anomaly_score(-50.0, 9.5) < model.anomaly_score(120.0, 6.0));
    }

    #[test]
    fn test_tsunami_rows_and_labels() {
        let rows = vec![
            TsunamiRow { magnitude: Some(9.1), depth: Some(29.0), intensity: Some(4.0) },
            TsunamiRow { magnitude: Some(6.1), depth: Some(10.0), intensity: Some(0.0) },
            TsunamiRow { magnitude: Some(7.0), depth: None, intensity: Some(1.0) },
            TsunamiRow { magnitude: Some(7.0), depth: Some(5.0), intensity: None },
        ];
        let set = LabelledSet::from_rows(&rows).unwrap();
        assert_eq!(set.features, vec![vec![29.0, 9.1], vec![10.0, 6.1]]);
        assert_eq!(set.labels, vec![1, 0]);
    }

    #[test]
    fn test_stratified_split_keeps_class_ratio() {
        let set = LabelledSet {
            features: (0..100).map(|i| vec![i as f64, 5.0]).collect(),
            labels: (0..100).map(|i| usize::from(i % 5 == 0)).collect(),
        };
        let (train, test) = set.stratified_split(0.3, 42);

        assert_eq!(train.labels.len() + test.labels.len(), 100);
        assert_eq!(test.class_counts(), [24, 6]);
        assert_eq!(train.class_counts(), [56, 14]);

        let (train_again, _) = set.stratified_split(0.3, 42);
        assert_eq!(train.features, train_again.features);
    }

    #[test]
    fn test_classification_report() {
        let truth = [0, 0, 0, 1, 1];
        let predicted = [0, 0, 1, 1, 0];
        let report = ClassificationReport::new(&truth, &predicted);

        assert!((report.classes[0].precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((report.classes[0].recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((report.classes[1].precision - 0.5).abs() < 1e-12);
        assert!((report.classes[1].recall - 0.5).abs() < 1e-12);
        assert_eq!(report.classes[1].support, 2);
        assert!((report.accuracy - 0.6).abs() < 1e-12);
        assert!(report.to_string().contains("precision"));
    }

    #[test]
    fn test_report_zero_division_is_zero() {
        let report = ClassificationReport::new(&[0, 0], &[0, 0]);
        assert_eq!(report.classes[1].precision, 0.0);
        assert_eq!(report.classes[1].f1, 0.0);
        assert_eq!(report.accuracy, 1.0);
    }
}
