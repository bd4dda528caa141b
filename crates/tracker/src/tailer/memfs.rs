//! 테스트용 메모리 파일 시스템
//!
//! rename, 삭제 후 재생성, truncation을 실제 I/O 없이 재현합니다.
//! 열린 리더는 파일 객체를 공유하므로, 경로가 바뀐 뒤에도 기존 파일을 계속 읽습니다.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};

use super::fs::{FileId, FileStat, Opened, StartPosition, TailFs};

#[derive(Debug)]
struct MemFile {
    ino: u64,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
struct Inner {
    files: HashMap<PathBuf, Arc<Mutex<MemFile>>>,
    next_ino: u64,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MemFs {
    inner: Arc<Mutex<Inner>>,
}

impl MemFs {
    /// 새 inode로 빈 파일을 만듭니다 (기존 경로는 대체).
    pub(crate) fn create(&self, path: impl AsRef<Path>) {
        let mut inner = self.inner.lock().unwrap();
        inner.next_ino += 1;
        let file = MemFile {
            ino: inner.next_ino,
            data: Vec::new(),
        };
        inner
            .files
            .insert(path.as_ref().to_path_buf(), Arc::new(Mutex::new(file)));
    }

    pub(crate) fn append(&self, path: impl AsRef<Path>, bytes: &str) {
        let inner = self.inner.lock().unwrap();
        let file = inner.files.get(path.as_ref()).unwrap();
        file.lock().unwrap().data.extend_from_slice(bytes.as_bytes());
    }

    pub(crate) fn truncate(&self, path: impl AsRef<Path>) {
        let inner = self.inner.lock().unwrap();
        let file = inner.files.get(path.as_ref()).unwrap();
        file.lock().unwrap().data.clear();
    }

    pub(crate) fn remove(&self, path: impl AsRef<Path>) {
        self.inner.lock().unwrap().files.remove(path.as_ref());
    }

    pub(crate) fn rename(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) {
        let mut inner = self.inner.lock().unwrap();
        let file = inner.files.remove(from.as_ref()).unwrap();
        inner.files.insert(to.as_ref().to_path_buf(), file);
    }

    fn lookup(&self, path: &Path) -> Option<Arc<Mutex<MemFile>>> {
        self.inner.lock().unwrap().files.get(path).cloned()
    }
}

fn stat_of(file: &MemFile) -> FileStat {
    FileStat {
        id: FileId {
            dev: 1,
            ino: file.ino,
        },
        len: file.data.len() as u64,
    }
}

impl TailFs for MemFs {
    type Reader = MemReader;

    async fn stat(&self, path: &Path) -> io::Result<Option<FileStat>> {
        Ok(self.lookup(path).map(|file| stat_of(&file.lock().unwrap())))
    }

    async fn open(&self, path: &Path, start: StartPosition) -> io::Result<Option<Opened<MemReader>>> {
        let Some(file) = self.lookup(path) else {
            return Ok(None);
        };
        let stat = stat_of(&file.lock().unwrap());
        let offset = match start {
            StartPosition::Beginning => 0,
            StartPosition::End => stat.len,
        };
        Ok(Some(Opened {
            reader: MemReader { file, pos: offset },
            stat,
            offset,
        }))
    }
}

pub(crate) struct MemReader {
    file: Arc<Mutex<MemFile>>,
    pos: u64,
}

impl AsyncRead for MemReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let file = this.file.lock().unwrap();
        let pos = this.pos as usize;
        if pos < file.data.len() {
            let n = buf.remaining().min(file.data.len() - pos);
            buf.put_slice(&file.data[pos..pos + n]);
            this.pos += n as u64;
        }
        Poll::Ready(Ok(()))
    }
}
