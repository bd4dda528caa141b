//! 추출 패턴 엔진 -- 라인에서 이름 있는 필드를 추출합니다.
//!
//! [`PatternEngine`]은 설정 순서대로 정렬된 [`ExtractionRule`] 목록을 가지며,
//! 라인마다 처음으로 매칭된 규칙의 캡처만 반환합니다 (누적하지 않음).
//! 정규식은 시작 시점에 한 번만 컴파일하며, 잘못된 패턴은 tail 시작 전에 에러가 됩니다.

use std::fmt;

use regex::Regex;

use crate::error::TrackerError;

/// 추출 가능한 필드 어휘
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// 상관 분석 키
    Id,
    /// 수신 주소
    To,
    /// 발신 측 (라우터/전송 이름 등)
    From,
    /// 전달 상태
    Status,
    /// 상태 사유
    Reason,
}

impl Field {
    /// 전체 어휘
    pub const ALL: [Field; 5] = [Field::Id, Field::To, Field::From, Field::Status, Field::Reason];

    /// 캡처 그룹 이름
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::To => "to",
            Field::From => "from",
            Field::Status => "status",
            Field::Reason => "reason",
        }
    }

    /// 캡처 그룹 이름에서 필드를 찾습니다.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == name)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 한 라인에서 추출된 필드 값
///
/// 규칙에 포함되지 않았거나 매칭에 참여하지 않은 그룹은 `None`입니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures {
    pub id: Option<String>,
    pub to: Option<String>,
    pub from: Option<String>,
    pub status: Option<String>,
    pub reason: Option<String>,
}

impl Captures {
    /// 필드 값을 반환합니다.
    pub fn get(&self, field: Field) -> Option<&str> {
        match field {
            Field::Id => self.id.as_deref(),
            Field::To => self.to.as_deref(),
            Field::From => self.from.as_deref(),
            Field::Status => self.status.as_deref(),
            Field::Reason => self.reason.as_deref(),
        }
    }

    /// 필드 값을 설정합니다.
    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let slot = match field {
            Field::Id => &mut self.id,
            Field::To => &mut self.to,
            Field::From => &mut self.from,
            Field::Status => &mut self.status,
            Field::Reason => &mut self.reason,
        };
        *slot = Some(value.into());
    }

    /// 빌더 스타일 설정
    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    /// 값이 하나도 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        Field::ALL.into_iter().all(|f| self.get(f).is_none())
    }
}

/// 컴파일된 추출 규칙
#[derive(Debug, Clone)]
pub struct ExtractionRule {
    /// 설정 내 순번
    index: usize,
    regex: Regex,
    /// 규칙이 포함하는 필드
    fields: Vec<Field>,
}

impl ExtractionRule {
    /// 패턴을 컴파일하고 캡처 그룹 이름을 검증합니다.
    pub fn compile(index: usize, pattern: &str) -> Result<Self, TrackerError> {
        let regex = Regex::new(pattern).map_err(|e| TrackerError::PatternCompile {
            index,
            reason: e.to_string(),
        })?;

        let mut fields = Vec::new();
        for name in regex.capture_names().flatten() {
            let field = Field::from_name(name).ok_or_else(|| TrackerError::PatternField {
                index,
                field: name.to_owned(),
            })?;
            fields.push(field);
        }

        if fields.is_empty() {
            return Err(TrackerError::PatternCompile {
                index,
                reason: "pattern has no named capture groups".to_owned(),
            });
        }

        Ok(Self {
            index,
            regex,
            fields,
        })
    }

    /// 설정 내 순번을 반환합니다.
    pub fn index(&self) -> usize {
        self.index
    }

    /// 규칙이 포함하는 필드를 반환합니다.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// 라인의 어느 위치에서든 매칭되면 캡처를 반환합니다.
    pub fn captures(&self, line: &str) -> Option<Captures> {
        let caps = self.regex.captures(line)?;
        let mut out = Captures::default();
        for field in &self.fields {
            if let Some(m) = caps.name(field.as_str()) {
                out.set(*field, m.as_str());
            }
        }
        Some(out)
    }
}

/// 추출 패턴 엔진
pub struct PatternEngine {
    rules: Vec<ExtractionRule>,
}

impl PatternEngine {
    /// 설정 순서대로 패턴을 컴파일합니다.
    ///
    /// 하나라도 실패하면 전체가 실패합니다.
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self, TrackerError> {
        let rules = patterns
            .iter()
            .enumerate()
            .map(|(index, p)| ExtractionRule::compile(index, p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(rules = rules.len(), "compiled extraction patterns");
        Ok(Self { rules })
    }

    /// 첫 번째로 매칭된 규칙의 캡처를 반환합니다.
    ///
    /// 매칭되는 규칙이 없으면 `None`이며, 이는 에러가 아닙니다.
    pub fn match_line(&self, line: &str) -> Option<Captures> {
        self.rules.iter().find_map(|rule| {
            let caps = rule.captures(line)?;
            tracing::trace!(rule = rule.index, "line matched extraction pattern");
            Some(caps)
        })
    }

    /// 규칙 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// 규칙이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 규칙 목록을 반환합니다.
    pub fn rules(&self) -> &[ExtractionRule] {
        &self.rules
    }
}
