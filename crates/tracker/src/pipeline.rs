//! 전달 파이프라인 오케스트레이션 -- tailer와 처리 태스크를 관리합니다.
//!
//! [`DeliveryPipeline`]은 core의 [`Pipeline`](postwatch_core::pipeline::Pipeline) trait을 구현하여
//! `postwatch-daemon`에서 start/stop/health_check 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! Tailer -> mpsc<String> -> 처리 태스크 (Tracker 소유) -> CompletionSink
//!                                 ^
//!            QueryHandle -> mpsc<QueryRequest> (oneshot 응답)
//! ```
//!
//! 추적 상태는 처리 태스크만 소유하므로 잠금이 필요 없습니다.
//! 라인은 tailer가 읽은 순서대로 처리되고, 완성 이벤트도 같은 순서로 전달됩니다.

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use postwatch_core::error::{PipelineError, PostwatchError};
use postwatch_core::pipeline::{HealthStatus, Pipeline};

use crate::config::TrackerConfig;
use crate::error::TrackerError;
use crate::facade::{CompletionSink, Tracker};
use crate::record::CompletedRecord;
use crate::tailer::Tailer;
use crate::tailer::fs::{LocalFs, TailFs};
use crate::tailer::state::TailState;

/// 파이프라인 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 처리 태스크로 보내는 조회 요청
enum QueryRequest {
    /// `emailstate` 명령 응답
    EmailState {
        args: String,
        reply: oneshot::Sender<Vec<String>>,
    },
    /// 주소별 이력
    History {
        address: String,
        reply: oneshot::Sender<Vec<CompletedRecord>>,
    },
}

/// 실행 중인 파이프라인에 조회를 보내는 핸들
///
/// 복제해서 여러 곳에서 사용할 수 있습니다.
#[derive(Clone)]
pub struct QueryHandle {
    tx: mpsc::Sender<QueryRequest>,
}

impl QueryHandle {
    /// `emailstate` 명령의 응답 라인을 요청합니다.
    pub async fn email_state(&self, args: impl Into<String>) -> Result<Vec<String>, TrackerError> {
        let (reply, rx) = oneshot::channel();
        self.send(QueryRequest::EmailState {
            args: args.into(),
            reply,
        })
        .await?;
        rx.await
            .map_err(|_| TrackerError::Channel("query reply dropped".to_owned()))
    }

    /// 주소의 이력을 최신순으로 요청합니다.
    pub async fn history(&self, address: impl Into<String>) -> Result<Vec<CompletedRecord>, TrackerError> {
        let (reply, rx) = oneshot::channel();
        self.send(QueryRequest::History {
            address: address.into(),
            reply,
        })
        .await?;
        rx.await
            .map_err(|_| TrackerError::Channel("query reply dropped".to_owned()))
    }

    async fn send(&self, request: QueryRequest) -> Result<(), TrackerError> {
        self.tx
            .send(request)
            .await
            .map_err(|_| TrackerError::Channel("tracker is not running".to_owned()))
    }
}

/// 전달 추적 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use postwatch_tracker::{DeliveryPipelineBuilder, TrackerConfig};
///
/// let mut pipeline = DeliveryPipelineBuilder::new()
///     .config(config)
///     .build(sink)?;
/// let queries = pipeline.query_handle();
///
/// pipeline.start().await?;
/// let lines = queries.email_state("user@example.com").await?;
/// ```
pub struct DeliveryPipeline<S: CompletionSink, F: TailFs = LocalFs> {
    config: TrackerConfig,
    state: PipelineState,
    /// 시작 시 처리 태스크로 이동
    tracker: Option<Tracker>,
    sink: Option<S>,
    fs: Option<F>,
    query_tx: mpsc::Sender<QueryRequest>,
    query_rx: Option<mpsc::Receiver<QueryRequest>>,
    cancel: CancellationToken,
    tail_status: Option<watch::Receiver<TailState>>,
    tailer_task: Option<JoinHandle<Result<(), TrackerError>>>,
    processor_task: Option<JoinHandle<()>>,
}

impl<S: CompletionSink, F: TailFs> DeliveryPipeline<S, F> {
    /// 현재 상태 이름을 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 엔진 설정
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// 조회 핸들을 반환합니다.
    pub fn query_handle(&self) -> QueryHandle {
        QueryHandle {
            tx: self.query_tx.clone(),
        }
    }

    /// tailer 상태 구독 (시작 후에만 `Some`)
    pub fn tail_status(&self) -> Option<watch::Receiver<TailState>> {
        self.tail_status.clone()
    }

    /// tailer 태스크가 끝날 때까지 기다리고, 치명적인 에러로 끝났으면 반환합니다.
    ///
    /// tailer가 없거나 정상 종료했으면 `None`입니다. 취소해도 안전합니다.
    pub async fn tailer_failure(&mut self) -> Option<TrackerError> {
        let handle = self.tailer_task.as_mut()?;
        let result = handle.await;
        self.tailer_task = None;
        match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(join) => Some(TrackerError::Channel(format!("tailer task failed: {join}"))),
        }
    }
}

impl<S: CompletionSink, F: TailFs> Pipeline for DeliveryPipeline<S, F> {
    async fn start(&mut self) -> Result<(), PostwatchError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        let (Some(tracker), Some(sink), Some(fs), Some(query_rx)) = (
            self.tracker.take(),
            self.sink.take(),
            self.fs.take(),
            self.query_rx.take(),
        ) else {
            return Err(PipelineError::InitFailed("pipeline cannot be restarted".to_owned()).into());
        };

        tracing::info!(
            path = %self.config.log_file.display(),
            patterns = tracker.patterns().len(),
            "starting delivery pipeline"
        );

        let (line_tx, line_rx) = mpsc::channel(self.config.line_channel_capacity);

        let tailer = Tailer::from_config(fs, &self.config);
        self.tail_status = Some(tailer.subscribe());
        self.tailer_task = Some(tokio::spawn(tailer.run(line_tx, self.cancel.clone())));
        self.processor_task = Some(tokio::spawn(process(
            tracker,
            sink,
            line_rx,
            query_rx,
            self.cancel.clone(),
        )));

        self.state = PipelineState::Running;
        tracing::info!("delivery pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), PostwatchError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        tracing::info!("stopping delivery pipeline");
        self.cancel.cancel();

        if let Some(handle) = self.tailer_task.take() {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "tailer had already failed"),
                Err(e) => tracing::warn!(error = %e, "tailer task panicked"),
            }
        }
        if let Some(handle) = self.processor_task.take()
            && let Err(e) = handle.await
        {
            tracing::warn!(error = %e, "processing task panicked");
        }

        self.state = PipelineState::Stopped;
        tracing::info!("delivery pipeline stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                if self.tailer_task.as_ref().is_none_or(|t| t.is_finished()) {
                    return HealthStatus::Unhealthy("tailer stopped".to_owned());
                }
                let waiting = self
                    .tail_status
                    .as_ref()
                    .is_some_and(|status| status.borrow().is_waiting());
                if waiting {
                    HealthStatus::Degraded(format!(
                        "waiting for {} to reappear",
                        self.config.log_file.display()
                    ))
                } else {
                    HealthStatus::Healthy
                }
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

impl<S: CompletionSink, F: TailFs> Drop for DeliveryPipeline<S, F> {
    fn drop(&mut self) {
        // stop 없이 버려져도 백그라운드 태스크가 남지 않도록 취소
        self.cancel.cancel();
    }
}

/// 라인 처리와 조회 응답을 한 태스크에서 순서대로 수행합니다.
async fn process<S: CompletionSink>(
    mut tracker: Tracker,
    mut sink: S,
    mut lines: mpsc::Receiver<String>,
    mut queries: mpsc::Receiver<QueryRequest>,
    cancel: CancellationToken,
) {
    let mut lines_open = true;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            // 조회는 밀린 라인보다 먼저
            Some(request) = queries.recv() => match request {
                QueryRequest::EmailState { args, reply } => {
                    let _ = reply.send(tracker.email_state(&args, Utc::now()));
                }
                QueryRequest::History { address, reply } => {
                    let records = tracker.history(&address).into_iter().cloned().collect();
                    let _ = reply.send(records);
                }
            },
            line = lines.recv(), if lines_open => match line {
                Some(line) => {
                    tracker.process_line(&line, &mut sink);
                }
                None => {
                    // tailer가 끝나도 조회에는 계속 응답
                    tracing::debug!("line channel closed");
                    lines_open = false;
                }
            },
        }
    }

    tracing::debug!(
        completed = tracker.accumulator().total_completed(),
        incomplete = tracker.accumulator().incomplete_len(),
        "processing task stopped"
    );
}

/// 전달 파이프라인 빌더
pub struct DeliveryPipelineBuilder {
    config: TrackerConfig,
}

impl DeliveryPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: TrackerConfig::default(),
        }
    }

    /// 엔진 설정을 지정합니다.
    pub fn config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    /// 로컬 파일 시스템을 감시하는 파이프라인을 빌드합니다.
    pub fn build<S: CompletionSink>(self, sink: S) -> Result<DeliveryPipeline<S>, TrackerError> {
        self.build_with_fs(sink, LocalFs)
    }

    /// 지정한 파일 시스템을 감시하는 파이프라인을 빌드합니다.
    ///
    /// 패턴과 템플릿은 여기서 컴파일되므로 잘못된 설정은 시작 전에 실패합니다.
    pub fn build_with_fs<S: CompletionSink, F: TailFs>(
        self,
        sink: S,
        fs: F,
    ) -> Result<DeliveryPipeline<S, F>, TrackerError> {
        let tracker = Tracker::new(&self.config)?;
        let (query_tx, query_rx) = mpsc::channel(self.config.query_channel_capacity);

        Ok(DeliveryPipeline {
            config: self.config,
            state: PipelineState::Initialized,
            tracker: Some(tracker),
            sink: Some(sink),
            fs: Some(fs),
            query_tx,
            query_rx: Some(query_rx),
            cancel: CancellationToken::new(),
            tail_status: None,
            tailer_task: None,
            processor_task: None,
        })
    }
}

impl Default for DeliveryPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
