use thiserror::Error;

#[derive(Error, Debug)]
pub enum SentinelError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("API returned status {status} for {endpoint}")]
    HttpStatusError { endpoint: String, status: u16 },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("XML parsing error: {0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Model file not found: {path}")]
    ModelNotFoundError { path: String },

    #[error("Model error: {message}")]
    ModelError { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    Configuration,
    Model,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl SentinelError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ApiError(_) | Self::HttpStatusError { .. } => ErrorCategory::Network,
            Self::CsvError(_)
            | Self::SerializationError(_)
            | Self::XmlError(_)
            | Self::ProcessingError { .. }
            | Self::ValidationError { .. } => ErrorCategory::Data,
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
            Self::ModelNotFoundError { .. } | Self::ModelError { .. } => ErrorCategory::Model,
            Self::ZipError(_) | Self::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 網路與資料錯誤在下一輪輪詢會自動重試
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Data => ErrorSeverity::Medium,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Model => ErrorSeverity::Critical,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// 給使用者的修復建議
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::ModelNotFoundError { .. } => {
                "Run train_anomaly and train_tsunami first, or point [models] at the model files"
            }
            Self::ModelError { .. } => "Retrain the models; the model file may be corrupt",
            Self::ApiError(_) | Self::HttpStatusError { .. } => {
                "Check network connectivity and the feed endpoint; polling will retry"
            }
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => "Review the TOML configuration file",
            Self::CsvError(_) => "Check the CSV file columns and encoding",
            Self::IoError(_) | Self::ZipError(_) => {
                "Check that the output directory exists and is writable"
            }
            Self::SerializationError(_) | Self::XmlError(_) => {
                "The feed returned an unexpected payload; it will be retried on the next cycle"
            }
            Self::ProcessingError { .. } | Self::ValidationError { .. } => {
                "Inspect the input data for missing or malformed values"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::ModelNotFoundError { path } => {
                format!("Required model file is missing: {}", path)
            }
            Self::HttpStatusError { endpoint, status } => {
                format!("Feed {} answered with HTTP {}", endpoint, status)
            }
            Self::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid setting '{}': {}", field, reason)
            }
            Self::MissingConfigError { field } => format!("Missing setting '{}'", field),
            other => other.to_string(),
        }
    }

    /// 依嚴重程度對應的程序結束碼
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl From<toml::de::Error> for SentinelError {
    fn from(e: toml::de::Error) -> Self {
        SentinelError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        }
    }
}

pub type Result<T> = std::result::Result<T, SentinelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_is_critical() {
        let err = SentinelError::ModelNotFoundError {
            path: "models/anomaly_detector_model.json".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Model);
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.exit_code(), 3);
        assert!(err.user_friendly_message().contains("anomaly_detector_model.json"));
    }

    #[test]
    fn test_feed_errors_are_retryable() {
        let err = SentinelError::HttpStatusError {
            endpoint: "https://example.com/feed".to_string(),
            status: 503,
        };
        assert_eq!(err.category(), ErrorCategory::Network);
        assert_eq!(err.severity(), ErrorSeverity::Medium);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_config_errors_are_high() {
        let err = SentinelError::MissingConfigError {
            field: "sources.nasa_api_key".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert_eq!(err.user_friendly_message(), "Missing setting 'sources.nasa_api_key'");
    }
}
