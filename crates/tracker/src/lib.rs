#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`pattern`]: 이름 있는 캡처 그룹 기반 추출 규칙 (첫 매칭 우선)
//! - [`record`]: 미완성/완성 전달 레코드
//! - [`bounded`]: 미완성 테이블과 원장이 공유하는 LRU 테이블
//! - [`accumulator`]: 상관 ID별 레코드 병합 및 완성 판정
//! - [`ledger`]: 중복 알림 억제 원장
//! - [`history`]: 완료 이력 링
//! - [`tailer`]: 로테이션을 따라가는 파일 tailer
//! - [`template`]: 알림 라인 템플릿
//! - [`facade`]: 조회/알림 파사드 (`Tracker`, `CompletionSink`)
//! - [`pipeline`]: tailer와 처리 태스크 오케스트레이션 (Pipeline trait 구현)
//! - [`config`]: 엔진 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입

pub mod accumulator;
pub mod bounded;
pub mod config;
pub mod error;
pub mod facade;
pub mod history;
pub mod ledger;
pub mod pattern;
pub mod pipeline;
pub mod record;
pub mod tailer;
pub mod template;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{DeliveryPipeline, DeliveryPipelineBuilder, QueryHandle};

// 파사드
pub use facade::{CompletionSink, Tracker, human_duration, render_entry};

// 설정
pub use config::{TrackerConfig, TrackerConfigBuilder};

// 에러
pub use error::TrackerError;

// 레코드
pub use accumulator::{Accumulator, Completion};
pub use record::{CompletedRecord, PartialRecord};

// 구성 요소
pub use history::CompletionCache;
pub use ledger::DedupLedger;
pub use pattern::{Captures, Field, PatternEngine};
pub use template::LogLineTemplate;

// tailer
pub use tailer::Tailer;
pub use tailer::fs::{LocalFs, TailFs};
pub use tailer::state::TailState;
