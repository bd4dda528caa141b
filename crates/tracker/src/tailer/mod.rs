//! 파일 tailer -- 감시 중인 로그 파일에서 완성된 라인을 공급합니다.
//!
//! `tail -F`와 유사하게 동작합니다:
//! - 시작 시 한 번만 기존 내용을 건너뛰고 끝에서부터 읽습니다.
//! - 새 라인이 없으면 폴링 간격만큼 협력적으로 대기합니다.
//! - 읽기 시도마다 경로의 파일 식별자(inode)와 길이를 확인해 로테이션을 감지합니다.
//! - 로테이션(rename, 삭제 후 재생성, truncation) 후에는 새 파일의 처음부터 읽습니다.
//!
//! tailer는 애플리케이션 상태를 갖지 않으며, 라인을 채널로 보내기만 합니다.

pub mod fs;
pub mod state;

#[cfg(test)]
pub(crate) mod memfs;

use std::path::{Path, PathBuf};
use std::time::Duration;

use metrics::counter;
use postwatch_core::metrics as m;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::TrackerConfig;
use crate::error::TrackerError;

use self::fs::{FileId, LocalFs, StartPosition, TailFs};
use self::state::{PathProbe, TailEvent, TailState, classify};

/// 한 번에 읽는 바이트 수
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// 최대 라인 길이 (바이트), 넘는 라인은 버림
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// 한 번의 읽기 시도에서 보내는 최대 라인 수
const MAX_LINES_PER_READ: usize = 1000;

/// 파일 tailer
pub struct Tailer<F: TailFs = LocalFs> {
    fs: F,
    path: PathBuf,
    poll_interval: Duration,
    rotation_wait_timeout: Option<Duration>,
    status_tx: watch::Sender<TailState>,
}

impl Tailer<LocalFs> {
    /// 로컬 파일 시스템을 사용하는 tailer를 생성합니다.
    pub fn local(config: &TrackerConfig) -> Self {
        Self::from_config(LocalFs, config)
    }
}

impl<F: TailFs> Tailer<F> {
    /// 새 tailer를 생성합니다.
    pub fn new(
        fs: F,
        path: impl Into<PathBuf>,
        poll_interval: Duration,
        rotation_wait_timeout: Option<Duration>,
    ) -> Self {
        let (status_tx, _) = watch::channel(TailState::STARTUP);
        Self {
            fs,
            path: path.into(),
            poll_interval,
            rotation_wait_timeout,
            status_tx,
        }
    }

    /// 설정에서 tailer를 생성합니다.
    pub fn from_config(fs: F, config: &TrackerConfig) -> Self {
        Self::new(
            fs,
            config.log_file.clone(),
            config.poll_interval(),
            config.rotation_wait_timeout(),
        )
    }

    /// 감시 중인 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 상태 변화를 구독합니다.
    pub fn subscribe(&self) -> watch::Receiver<TailState> {
        self.status_tx.subscribe()
    }

    /// 취소되거나 치명적인 에러가 날 때까지 라인을 `tx`로 보냅니다.
    ///
    /// 열린 읽기 에러는 숨기지 않고 반환합니다. 취소 시 파일 핸들은 닫힙니다.
    pub async fn run(
        self,
        tx: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Result<(), TrackerError> {
        let mut state = TailState::STARTUP;
        let mut reader: Option<LineReader<F::Reader>> = None;
        let mut waiting_since: Option<Instant> = None;

        tracing::info!(path = %self.path.display(), "tailer started");

        while !cancel.is_cancelled() {
            let event = match state {
                TailState::Opening { seek_end } => {
                    let start = if seek_end {
                        StartPosition::End
                    } else {
                        StartPosition::Beginning
                    };
                    reader = self.open(start).await?;
                    if reader.is_some() {
                        TailEvent::Opened
                    } else {
                        TailEvent::NotFound
                    }
                }
                TailState::RotatedSwitch => {
                    reader = self.open(StartPosition::Beginning).await?;
                    if reader.is_some() {
                        TailEvent::Opened
                    } else {
                        TailEvent::NotFound
                    }
                }
                TailState::Following => {
                    let Some(current) = reader.as_mut() else {
                        // Following인데 핸들이 없으면 새로 열어야 함
                        state = TailState::RotatedSwitch;
                        continue;
                    };

                    let sent = match self.forward_available(current, &tx, &cancel).await? {
                        Some(sent) => sent,
                        None => break,
                    };

                    let stat = self.fs.stat(&self.path).await?;
                    let probe = classify(stat, Some((current.id, current.offset)));
                    match probe {
                        PathProbe::Missing | PathProbe::Replaced => {
                            // 로테이션 직전에 추가된 라인까지 읽은 뒤 전환
                            if self.forward_available(current, &tx, &cancel).await?.is_none() {
                                break;
                            }
                            current.discard_partial(&self.path);
                            reader = None;
                        }
                        PathProbe::Truncated => {
                            current.discard_partial(&self.path);
                            reader = None;
                        }
                        PathProbe::Unchanged | PathProbe::Present => {
                            if sent == 0 && !self.pause(&cancel).await {
                                break;
                            }
                        }
                    }
                    TailEvent::Probed(probe)
                }
                TailState::RotatedWaiting => {
                    let stat = self.fs.stat(&self.path).await?;
                    let probe = classify(stat, None);
                    if probe == PathProbe::Missing {
                        let since = *waiting_since.get_or_insert_with(Instant::now);
                        if let Some(limit) = self.rotation_wait_timeout
                            && since.elapsed() >= limit
                        {
                            tracing::error!(
                                path = %self.path.display(),
                                timeout_secs = limit.as_secs(),
                                "log file did not reappear"
                            );
                            return Err(TrackerError::Tail {
                                path: self.path.display().to_string(),
                                reason: format!(
                                    "file did not reappear within {}s",
                                    limit.as_secs()
                                ),
                            });
                        }
                        if !self.pause(&cancel).await {
                            break;
                        }
                    }
                    TailEvent::Probed(probe)
                }
            };

            let next = state.next(event);
            if next != state {
                self.on_transition(state, next, event);
                if next != TailState::RotatedWaiting {
                    waiting_since = None;
                }
                state = next;
                self.status_tx.send_replace(state);
            }
        }

        drop(reader);
        tracing::info!(path = %self.path.display(), "tailer stopped");
        Ok(())
    }

    async fn open(&self, start: StartPosition) -> Result<Option<LineReader<F::Reader>>, TrackerError> {
        let Some(opened) = self.fs.open(&self.path, start).await? else {
            return Ok(None);
        };
        tracing::debug!(
            path = %self.path.display(),
            ino = opened.stat.id.ino,
            offset = opened.offset,
            "opened log file"
        );
        Ok(Some(LineReader::new(opened.reader, opened.stat.id, opened.offset)))
    }

    /// 현재 읽을 수 있는 완성 라인을 모두 보냅니다.
    ///
    /// 보낸 라인 수를 반환하며, 취소되었으면 `None`입니다.
    async fn forward_available(
        &self,
        reader: &mut LineReader<F::Reader>,
        tx: &mpsc::Sender<String>,
        cancel: &CancellationToken,
    ) -> Result<Option<usize>, TrackerError> {
        let lines = reader.read_available().await?;
        let count = lines.len();

        for line in lines {
            tracing::trace!(line = %line, "read line");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(None),
                result = tx.send(line) => {
                    if result.is_err() {
                        if cancel.is_cancelled() {
                            return Ok(None);
                        }
                        return Err(TrackerError::Channel("line receiver closed".to_owned()));
                    }
                }
            }
        }

        if count > 0 {
            counter!(m::TAIL_LINES_READ_TOTAL).increment(count as u64);
        }
        Ok(Some(count))
    }

    /// 폴링 간격만큼 대기합니다. 취소되면 `false`를 반환합니다.
    async fn pause(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.poll_interval) => true,
        }
    }

    fn on_transition(&self, from: TailState, to: TailState, event: TailEvent) {
        match (from, to, event) {
            (_, TailState::RotatedWaiting, _) => {
                tracing::info!(
                    path = %self.path.display(),
                    "log file is missing, waiting for it to appear"
                );
            }
            (_, TailState::RotatedSwitch, TailEvent::Probed(probe)) => {
                tracing::info!(
                    path = %self.path.display(),
                    rotation = probe.rotation_label(),
                    "log file rotated, switching to new file"
                );
                counter!(m::TAIL_ROTATIONS_TOTAL, m::LABEL_ROTATION => probe.rotation_label())
                    .increment(1);
            }
            (TailState::Opening { seek_end: true }, TailState::Following, _) => {
                tracing::info!(path = %self.path.display(), "following log file from its end");
            }
            (_, TailState::Following, _) => {
                tracing::info!(path = %self.path.display(), "following new log file from its start");
            }
            _ => {}
        }
    }
}

/// 열린 파일에서 완성된 라인을 잘라내는 리더
struct LineReader<R> {
    reader: R,
    id: FileId,
    /// 지금까지 읽은 바이트 위치
    offset: u64,
    pending: PendingLine,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    fn new(reader: R, id: FileId, offset: u64) -> Self {
        Self {
            reader,
            id,
            offset,
            pending: PendingLine::default(),
            buf: vec![0; READ_CHUNK_SIZE],
        }
    }

    /// EOF까지 (최대 `MAX_LINES_PER_READ`개) 읽고 완성된 라인을 반환합니다.
    async fn read_available(&mut self) -> std::io::Result<Vec<String>> {
        let mut lines = Vec::new();
        while lines.len() < MAX_LINES_PER_READ {
            let n = self.reader.read(&mut self.buf).await?;
            if n == 0 {
                break;
            }
            self.offset += n as u64;
            self.pending.feed(&self.buf[..n], &mut lines);
        }
        Ok(lines)
    }

    fn discard_partial(&mut self, path: &Path) {
        if !self.pending.buf.is_empty() {
            tracing::debug!(
                path = %path.display(),
                bytes = self.pending.buf.len(),
                "dropped unterminated line from rotated file"
            );
        }
        self.pending = PendingLine::default();
    }
}

/// 개행을 기다리는 미완성 라인
#[derive(Default)]
struct PendingLine {
    buf: Vec<u8>,
    /// 너무 긴 라인을 다음 개행까지 버리는 중
    discarding: bool,
}

impl PendingLine {
    fn feed(&mut self, chunk: &[u8], lines: &mut Vec<String>) {
        let mut rest = chunk;
        while let Some(pos) = rest.iter().position(|b| *b == b'\n') {
            if self.discarding {
                self.discarding = false;
            } else {
                self.buf.extend_from_slice(&rest[..pos]);
                lines.push(decode_line(&self.buf));
            }
            self.buf.clear();
            rest = &rest[pos + 1..];
        }

        if self.discarding {
            return;
        }
        self.buf.extend_from_slice(rest);
        if self.buf.len() > MAX_LINE_LENGTH {
            tracing::warn!(
                max = MAX_LINE_LENGTH,
                "line exceeds maximum length, discarding"
            );
            self.buf.clear();
            self.discarding = true;
        }
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let line = String::from_utf8_lossy(bytes);
    line.strip_suffix('\r').unwrap_or(&line).to_owned()
}
