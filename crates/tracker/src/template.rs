//! 알림 라인 템플릿
//!
//! `{email}`, `{status}`, `{reason}` 자리표시자와 `{{`, `}}` 이스케이프를 지원합니다.
//! 템플릿은 시작 시점에 한 번 파싱되며, 알 수 없는 자리표시자는 설정 에러입니다.

use crate::error::TrackerError;
use crate::record::CompletedRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Email,
    Status,
    Reason,
}

/// 파싱된 알림 라인 템플릿
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLineTemplate {
    segments: Vec<Segment>,
}

impl LogLineTemplate {
    /// 템플릿 문자열을 파싱합니다.
    pub fn parse(template: &str) -> Result<Self, TrackerError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for n in chars.by_ref() {
                        if n == '}' {
                            closed = true;
                            break;
                        }
                        name.push(n);
                    }
                    if !closed {
                        return Err(template_error(format!("unclosed placeholder '{{{name}'")));
                    }
                    let segment = match name.as_str() {
                        "email" => Segment::Email,
                        "status" => Segment::Status,
                        "reason" => Segment::Reason,
                        other => {
                            return Err(template_error(format!(
                                "unknown placeholder '{{{other}}}' (allowed: email, status, reason)"
                            )));
                        }
                    };
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(segment);
                }
                '}' => return Err(template_error("unmatched '}' (use '}}' for a literal brace)")),
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments })
    }

    /// 완성된 레코드로 라인을 만듭니다.
    pub fn render(&self, record: &CompletedRecord) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Email => out.push_str(&record.to),
                Segment::Status => out.push_str(&record.status),
                Segment::Reason => out.push_str(&record.reason),
            }
        }
        out
    }
}

fn template_error(reason: impl Into<String>) -> TrackerError {
    TrackerError::Template {
        reason: reason.into(),
    }
}
