use crate::utils::error::Result;
use async_trait::async_trait;

/// 匯出目的地，只寫不讀
pub trait Storage: Send + Sync {
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Full location of `path` inside this storage, for log output.
    fn location(&self, path: &str) -> String;
}

/// Unsupervised outlier model over (depth, magnitude); more negative means more anomalous.
pub trait AnomalyScorer: Send + Sync {
    fn anomaly_score(&self, depth_km: f64, magnitude: f64) -> f64;
}

/// Supervised estimate of P(tsunami | depth, magnitude).
pub trait TsunamiPredictor: Send + Sync {
    fn tsunami_probability(&self, depth_km: f64, magnitude: f64) -> f64;
}

/// 單一資料來源：抓取並解析，不持有任何狀態
#[async_trait]
pub trait Feed: Send + Sync {
    type Output: Send;

    fn name(&self) -> &'static str;

    async fn fetch(&self) -> Result<Self::Output>;
}
