#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, PipelineError, PostwatchError};

// 설정
pub use config::PostwatchConfig;

// 파이프라인 trait
pub use pipeline::{HealthStatus, Pipeline};
