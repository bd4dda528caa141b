//! tailer 상태 머신
//!
//! I/O 없이 테스트할 수 있도록 상태 전이를 순수 함수로 분리합니다.
//!
//! ```text
//! Opening{seek_end} --Opened--> Following --Missing--> RotatedWaiting
//!        |                        |  ^                     |
//!        +--NotFound--> RotatedWaiting  |            (file reappears)
//!                                 |  |                     v
//!                   Replaced/Truncated +--Opened-- RotatedSwitch
//! ```
//!
//! 시작 시 한 번만 `Opening { seek_end: true }`로 기존 내용을 건너뛰며,
//! 로테이션 후에는 항상 새 파일의 처음부터 읽습니다.

use std::fmt;

use super::fs::{FileId, FileStat};

/// tailer 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailState {
    /// 파일을 여는 중 (`seek_end`면 기존 내용을 건너뜀)
    Opening { seek_end: bool },
    /// 열린 파일에서 새 라인을 읽는 중
    Following,
    /// 경로가 사라져 다시 나타나기를 기다리는 중
    RotatedWaiting,
    /// 새 파일로 전환하는 중
    RotatedSwitch,
}

impl TailState {
    /// 프로세스 시작 시 초기 상태
    pub const STARTUP: TailState = TailState::Opening { seek_end: true };

    /// 이벤트에 따른 다음 상태를 계산합니다.
    ///
    /// 상태에 맞지 않는 이벤트는 상태를 바꾸지 않습니다.
    pub fn next(self, event: TailEvent) -> TailState {
        use PathProbe::*;
        use TailEvent::*;
        use TailState::*;

        match (self, event) {
            (Opening { .. } | RotatedSwitch, Opened) => Following,
            (Opening { .. } | RotatedSwitch, NotFound) => RotatedWaiting,
            (Following, Probed(Missing)) => RotatedWaiting,
            (Following, Probed(Replaced | Truncated)) => RotatedSwitch,
            (RotatedWaiting, Probed(Present | Replaced | Truncated | Unchanged)) => RotatedSwitch,
            (state, _) => state,
        }
    }

    /// 로테이션 대기 중인지 확인합니다.
    pub fn is_waiting(self) -> bool {
        matches!(self, TailState::RotatedWaiting)
    }
}

impl fmt::Display for TailState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TailState::Opening { seek_end: true } => f.write_str("seeking_end"),
            TailState::Opening { seek_end: false } => f.write_str("opening"),
            TailState::Following => f.write_str("following"),
            TailState::RotatedWaiting => f.write_str("rotated_waiting"),
            TailState::RotatedSwitch => f.write_str("rotated_switch"),
        }
    }
}

/// 상태 전이를 일으키는 관측 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailEvent {
    /// 파일을 열었음
    Opened,
    /// 열려는 경로가 없음
    NotFound,
    /// 경로 상태를 점검했음
    Probed(PathProbe),
}

/// 경로 점검 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathProbe {
    /// 경로가 없음
    Missing,
    /// 열린 파일과 같은 파일이며 잘리지 않음
    Unchanged,
    /// 경로가 다른 파일을 가리킴
    Replaced,
    /// 같은 파일이지만 읽은 위치보다 짧아짐
    Truncated,
    /// 경로가 있음 (비교할 열린 파일 없음)
    Present,
}

impl PathProbe {
    /// 메트릭 레이블 값
    pub fn rotation_label(self) -> &'static str {
        match self {
            PathProbe::Replaced => "replaced",
            PathProbe::Truncated => "truncated",
            _ => "recreated",
        }
    }
}

/// 현재 경로 상태와 열린 파일(식별자, 읽은 위치)을 비교합니다.
pub fn classify(stat: Option<FileStat>, current: Option<(FileId, u64)>) -> PathProbe {
    match (stat, current) {
        (None, _) => PathProbe::Missing,
        (Some(_), None) => PathProbe::Present,
        (Some(stat), Some((id, _))) if stat.id != id => PathProbe::Replaced,
        (Some(stat), Some((_, offset))) if stat.len < offset => PathProbe::Truncated,
        (Some(_), Some(_)) => PathProbe::Unchanged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(ino: u64) -> FileId {
        FileId { dev: 1, ino }
    }

    fn stat(ino: u64, len: u64) -> Option<FileStat> {
        Some(FileStat { id: id(ino), len })
    }

    #[test]
    fn startup_open_leads_to_following() {
        assert_eq!(TailState::STARTUP.next(TailEvent::Opened), TailState::Following);
    }

    #[test]
    fn startup_without_file_waits() {
        assert_eq!(
            TailState::STARTUP.next(TailEvent::NotFound),
            TailState::RotatedWaiting
        );
    }

    #[test]
    fn following_reacts_to_probes() {
        let s = TailState::Following;
        assert_eq!(s.next(TailEvent::Probed(PathProbe::Unchanged)), TailState::Following);
        assert_eq!(s.next(TailEvent::Probed(PathProbe::Missing)), TailState::RotatedWaiting);
        assert_eq!(s.next(TailEvent::Probed(PathProbe::Replaced)), TailState::RotatedSwitch);
        assert_eq!(s.next(TailEvent::Probed(PathProbe::Truncated)), TailState::RotatedSwitch);
    }

    #[test]
    fn waiting_switches_once_path_reappears() {
        let s = TailState::RotatedWaiting;
        assert_eq!(s.next(TailEvent::Probed(PathProbe::Missing)), TailState::RotatedWaiting);
        assert_eq!(s.next(TailEvent::Probed(PathProbe::Present)), TailState::RotatedSwitch);
    }

    #[test]
    fn switch_opens_or_falls_back_to_waiting() {
        let s = TailState::RotatedSwitch;
        assert_eq!(s.next(TailEvent::Opened), TailState::Following);
        assert_eq!(s.next(TailEvent::NotFound), TailState::RotatedWaiting);
    }

    #[test]
    fn unrelated_events_keep_state() {
        assert_eq!(TailState::Following.next(TailEvent::Opened), TailState::Following);
        assert_eq!(
            TailState::RotatedWaiting.next(TailEvent::NotFound),
            TailState::RotatedWaiting
        );
    }

    #[test]
    fn classify_compares_identity_then_length() {
        assert_eq!(classify(None, Some((id(1), 10))), PathProbe::Missing);
        assert_eq!(classify(stat(1, 10), None), PathProbe::Present);
        assert_eq!(classify(stat(2, 100), Some((id(1), 10))), PathProbe::Replaced);
        assert_eq!(classify(stat(1, 5), Some((id(1), 10))), PathProbe::Truncated);
        assert_eq!(classify(stat(1, 10), Some((id(1), 10))), PathProbe::Unchanged);
        assert_eq!(classify(stat(1, 50), Some((id(1), 10))), PathProbe::Unchanged);
    }

    #[test]
    fn startup_state_is_displayed_as_seeking_end() {
        assert_eq!(TailState::STARTUP.to_string(), "seeking_end");
        assert!(TailState::RotatedWaiting.is_waiting());
    }
}
