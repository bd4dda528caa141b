//! tail 대상 파일 시스템 추상화
//!
//! [`TailFs`]는 tailer가 필요로 하는 두 연산(`stat`, `open`)만 노출합니다.
//! 실제 파일은 [`LocalFs`]가 `tokio::fs`로 처리하고, 테스트는 메모리 구현을 주입합니다.

use std::future::Future;
use std::io;
use std::path::Path;

use tokio::io::{AsyncRead, AsyncSeekExt};

/// 파일 식별자 (경로가 아닌 실제 파일)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId {
    /// 장치 번호
    pub dev: u64,
    /// inode 번호
    pub ino: u64,
}

/// 경로가 가리키는 파일의 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub id: FileId,
    /// 현재 길이 (바이트)
    pub len: u64,
}

/// 파일을 열 때 읽기 시작 위치
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    /// 처음부터 (로테이션 후 새 파일)
    Beginning,
    /// 끝에서 (시작 시 기존 내용 건너뛰기)
    End,
}

/// 열린 파일 핸들
pub struct Opened<R> {
    pub reader: R,
    /// 열린 시점의 상태
    pub stat: FileStat,
    /// 읽기 시작 오프셋
    pub offset: u64,
}

/// tailer가 사용하는 파일 시스템 연산
///
/// 두 연산 모두 경로가 없으면 에러가 아니라 `Ok(None)`을 반환합니다.
pub trait TailFs: Send + Sync + 'static {
    /// 읽기 핸들 타입
    type Reader: AsyncRead + Unpin + Send + 'static;

    /// 경로가 현재 가리키는 파일의 상태를 조회합니다.
    fn stat(&self, path: &Path) -> impl Future<Output = io::Result<Option<FileStat>>> + Send;

    /// 파일을 열고 `start` 위치로 이동합니다.
    fn open(
        &self,
        path: &Path,
        start: StartPosition,
    ) -> impl Future<Output = io::Result<Option<Opened<Self::Reader>>>> + Send;
}

/// 로컬 파일 시스템 구현
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl TailFs for LocalFs {
    type Reader = tokio::fs::File;

    async fn stat(&self, path: &Path) -> io::Result<Option<FileStat>> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => Ok(Some(file_stat(&meta))),
            // 일반 파일이 아니면 없는 것으로 취급
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn open(&self, path: &Path, start: StartPosition) -> io::Result<Option<Opened<Self::Reader>>> {
        let mut file = match tokio::fs::File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Ok(None);
        }
        let stat = file_stat(&meta);

        let offset = match start {
            StartPosition::Beginning => 0,
            StartPosition::End => file.seek(io::SeekFrom::End(0)).await?,
        };

        Ok(Some(Opened {
            reader: file,
            stat,
            offset,
        }))
    }
}

#[cfg(unix)]
fn file_stat(meta: &std::fs::Metadata) -> FileStat {
    use std::os::unix::fs::MetadataExt;

    FileStat {
        id: FileId {
            dev: meta.dev(),
            ino: meta.ino(),
        },
        len: meta.len(),
    }
}

// inode가 없는 플랫폼에서는 truncation만 감지됨
#[cfg(not(unix))]
fn file_stat(meta: &std::fs::Metadata) -> FileStat {
    FileStat {
        id: FileId { dev: 0, ino: 0 },
        len: meta.len(),
    }
}
