use crate::utils::error::{Result, SentinelError};
use serde::{Deserialize, Serialize};

/// Per-feature standardisation with population standard deviation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(samples: &[Vec<f64>]) -> Result<Self> {
        let n_features = samples.first().map(Vec::len).ok_or_else(|| {
            SentinelError::ModelError {
                message: "Cannot fit a scaler on an empty dataset".to_string(),
            }
        })?;

        let n = samples.len() as f64;
        let mut mean = vec![0.0; n_features];
        for row in samples {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut variance = vec![0.0; n_features];
        for row in samples {
            for ((var, v), m) in variance.iter_mut().zip(row).zip(&mean) {
                *var += (v - m).powi(2);
            }
        }

        // 常數特徵不縮放
        let scale = variance
            .into_iter()
            .map(|var| {
                let std = (var / n).sqrt();
                if std == 0.0 {
                    1.0
                } else {
                    std
                }
            })
            .collect();

        Ok(Self { mean, scale })
    }

    pub fn transform_one(&self, sample: &[f64]) -> Vec<f64> {
        sample
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }

    pub fn transform(&self, samples: &[Vec<f64>]) -> Vec<Vec<f64>> {
        samples.iter().map(|s| self.transform_one(s)).collect()
    }
}
