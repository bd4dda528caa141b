//! 전달 레코드 타입
//!
//! [`PartialRecord`]는 같은 상관 ID를 가진 라인들이 도착할 때마다 갱신되는
//! 미완성 레코드이고, [`CompletedRecord`]는 네 필드가 모두 채워진 뒤 만들어지는
//! 불변 스냅샷입니다.

use chrono::{DateTime, Utc};
use crate::pattern::Captures;

/// 미완성 전달 레코드
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialRecord {
    /// 상관 ID (캡처에 없으면 합성된 값)
    pub id: String,
    /// 첫 캡처 시각
    pub created_at: DateTime<Utc>,
    pub to: Option<String>,
    pub from: Option<String>,
    pub status: Option<String>,
    pub reason: Option<String>,
}

impl PartialRecord {
    /// 빈 레코드를 생성합니다.
    pub fn new(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            created_at,
            to: None,
            from: None,
            status: None,
            reason: None,
        }
    }

    /// 캡처에 포함된 필드를 덮어씁니다 (필드별로 마지막 값이 우선).
    pub fn merge(&mut self, captures: &Captures) {
        if let Some(to) = &captures.to {
            self.to = Some(to.clone());
        }
        if let Some(from) = &captures.from {
            self.from = Some(from.clone());
        }
        if let Some(status) = &captures.status {
            self.status = Some(status.clone());
        }
        if let Some(reason) = &captures.reason {
            self.reason = Some(reason.clone());
        }
    }

    /// `to`, `from`, `status`, `reason`이 모두 비어 있지 않은 값으로 채워졌는지 확인합니다.
    ///
    /// 빈 문자열로 매칭된 그룹은 채워지지 않은 것으로 봅니다.
    pub fn is_finalized(&self) -> bool {
        [&self.to, &self.from, &self.status, &self.reason]
            .into_iter()
            .all(|field| field.as_deref().is_some_and(|v| !v.is_empty()))
    }

    /// 불변 레코드로 변환합니다. 아직 완성되지 않았으면 자신을 돌려줍니다.
    pub fn finalize(self) -> Result<CompletedRecord, Self> {
        if !self.is_finalized() {
            return Err(self);
        }
        match self {
            PartialRecord {
                id,
                created_at,
                to: Some(to),
                from: Some(from),
                status: Some(status),
                reason: Some(reason),
            } => Ok(CompletedRecord {
                id,
                to,
                from,
                status,
                reason,
                created_at,
            }),
            incomplete => Err(incomplete),
        }
    }
}

/// 완성된 전달 레코드
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedRecord {
    /// 상관 ID
    pub id: String,
    /// 수신 주소 (원래 대소문자 유지)
    pub to: String,
    pub from: String,
    pub status: String,
    pub reason: String,
    /// 첫 캡처 시각
    pub created_at: DateTime<Utc>,
}

impl CompletedRecord {
    /// 이력 검색 키 (소문자 수신 주소)
    pub fn search_key(&self) -> String {
        self.to.to_lowercase()
    }
}
