pub mod isolation_forest;
pub mod random_forest;
pub mod scaler;

use crate::domain::ports::{AnomalyScorer, TsunamiPredictor};
use crate::utils::error::{Result, SentinelError};
use isolation_forest::IsolationForest;
use random_forest::RandomForestClassifier;
use scaler::StandardScaler;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Scaler + isolation forest over (depth_km, magnitude).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyDetector {
    pub scaler: StandardScaler,
    pub forest: IsolationForest,
}

impl AnomalyScorer for AnomalyDetector {
    fn anomaly_score(&self, depth_km: f64, magnitude: f64) -> f64 {
        let scaled = self.scaler.transform_one(&[depth_km, magnitude]);
        self.forest.decision_function(&scaled)
    }
}

/// 特徵順序為 (depth_km, magnitude)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TsunamiModel {
    pub forest: RandomForestClassifier,
}

impl TsunamiPredictor for TsunamiModel {
    fn tsunami_probability(&self, depth_km: f64, magnitude: f64) -> f64 {
        self.forest
            .predict_proba(&[depth_km, magnitude])
            .get(1)
            .copied()
            .unwrap_or(0.0)
    }
}

pub fn save_json<T: Serialize, P: AsRef<Path>>(model: &T, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec(model)?;
    std::fs::write(path, json)?;
    tracing::info!("💾 Model saved to {}", path.display());
    Ok(())
}

pub fn load_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => SentinelError::ModelNotFoundError {
            path: path.display().to_string(),
        },
        _ => SentinelError::IoError(e),
    })?;

    serde_json::from_slice(&data).map_err(|e| SentinelError::ModelError {
        message: format!("{} is not a valid model file: {}", path.display(), e),
    })
}

/// 監控程式啟動時載入的兩個模型
#[derive(Debug, Clone)]
pub struct ModelSet {
    pub anomaly: AnomalyDetector,
    pub tsunami: TsunamiModel,
}

impl ModelSet {
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(anomaly_path: P, tsunami_path: Q) -> Result<Self> {
        let anomaly = load_json(anomaly_path.as_ref())?;
        tracing::info!("🧠 Anomaly detector loaded from {}", anomaly_path.as_ref().display());

        let tsunami = load_json(tsunami_path.as_ref())?;
        tracing::info!("🌊 Tsunami predictor loaded from {}", tsunami_path.as_ref().display());

        Ok(Self { anomaly, tsunami })
    }
}
