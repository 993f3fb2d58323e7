pub mod classifier;
pub mod export;
pub mod feeds;
pub mod geofence;
pub mod http;
pub mod models;
pub mod scheduler;
pub mod sitrep;
pub mod training;

pub use crate::domain::ports::{AnomalyScorer, Feed, Storage, TsunamiPredictor};
pub use crate::utils::error::Result;
