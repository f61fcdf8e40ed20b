//! `$이름` 플레이스홀더를 가진 Step 패턴을 정규식 매처로 컴파일한다.

use crate::error::CompileError;
use regex::Regex;
use std::fmt;

/// 플레이스홀더 접두 문자.
const PREFIX: char = '$';

/// 이름 있는 플레이스홀더가 캡처하는 정규식 조각. 줄바꿈을 포함해 탐욕적으로 잡는다.
const NAMED_CAPTURE: &str = "(.*)";

/// 익명 플레이스홀더가 캡처하는 정규식 조각. 공백 없는 한 단어만 잡는다.
const ANONYMOUS_CAPTURE: &str = r"(\S+)";

/// 패턴을 이루는 요소이다.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// 그대로 일치해야 하는 문자열.
    Literal(String),
    /// 캡처 위치. 익명이면 `None`이다.
    Placeholder(Option<String>),
}

/// 컴파일된 Step 패턴이다.
///
/// 매칭은 양 끝이 고정되며 리터럴 안의 정규식 예약 문자는 문자 그대로 취급한다.
/// 리터럴의 공백 묶음은 줄의 어떤 공백 묶음과도 일치한다.
#[derive(Debug, Clone)]
pub struct StepPattern {
    /// 원본 패턴 문자열.
    source: String,
    /// 캡처 순서대로 나열한 파라미터 이름. 익명 플레이스홀더는 위치 번호를 이름으로 쓴다.
    names: Vec<String>,
    /// 공백을 제외한 리터럴 문자 수.
    literal_len: usize,
    /// 생성된 정규식.
    regex: Regex,
}

impl StepPattern {
    /// 패턴 문자열을 컴파일한다.
    ///
    /// # 매개변수
    /// - `pattern`: `$이름` 또는 `$`를 포함할 수 있는 Step 패턴.
    ///
    /// # 반환값
    /// 인접한 플레이스홀더나 중복 이름이 있으면 [`CompileError`]를 반환한다.
    pub fn compile(pattern: &str) -> Result<Self, CompileError> {
        let source = pattern.trim().to_string();
        let segments = tokenize(&source)?;
        let mut names: Vec<String> = Vec::new();
        let mut literal_len = 0;
        let mut expression = String::from("(?s)^");
        for segment in &segments {
            match segment {
                Segment::Literal(text) => {
                    literal_len += text.chars().filter(|c| !c.is_whitespace()).count();
                    push_literal(&mut expression, text);
                }
                Segment::Placeholder(name) => {
                    let position = names.len();
                    let name = name.clone().unwrap_or_else(|| position.to_string());
                    if names.contains(&name) {
                        return Err(CompileError::DuplicatePlaceholder {
                            pattern: source.clone(),
                            name,
                        });
                    }
                    let capture = if matches!(segment, Segment::Placeholder(None)) {
                        ANONYMOUS_CAPTURE
                    } else {
                        NAMED_CAPTURE
                    };
                    expression.push_str(capture);
                    names.push(name);
                }
            }
        }
        expression.push('$');
        let regex = Regex::new(&expression).map_err(|source_err| CompileError::Regex {
            pattern: source.clone(),
            source: source_err,
        })?;
        Ok(Self {
            source,
            names,
            literal_len,
            regex,
        })
    }

    /// 원본 패턴 문자열을 반환한다.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// 줄 전체가 패턴과 일치하는지 확인한다.
    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }

    /// 일치하면 캡처한 원문 조각을 선언 순서대로 반환한다.
    pub fn captures(&self, line: &str) -> Option<Vec<String>> {
        let caps = self.regex.captures(line)?;
        Some(
            (1..caps.len())
                .map(|idx| caps.get(idx).map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect(),
        )
    }

    /// 파라미터 이름을 선언 순서대로 반환한다.
    pub fn parameter_names(&self) -> &[String] {
        &self.names
    }

    /// 플레이스홀더 수를 반환한다.
    pub fn placeholder_count(&self) -> usize {
        self.names.len()
    }

    /// 공백을 제외한 리터럴 문자 수를 반환한다.
    pub fn literal_len(&self) -> usize {
        self.literal_len
    }
}

impl fmt::Display for StepPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// 패턴 문자열을 리터럴과 플레이스홀더로 나눈다.
fn tokenize(pattern: &str) -> Result<Vec<Segment>, CompileError> {
    let mut segments: Vec<Segment> = Vec::new();
    let mut literal = String::new();
    let mut chars = pattern.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != PREFIX {
            literal.push(ch);
            continue;
        }
        let mut name = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_alphanumeric() || next == '_' {
                name.push(next);
                chars.next();
            } else {
                break;
            }
        }
        if literal.is_empty() {
            if let Some(Segment::Placeholder(previous)) = segments.last() {
                return Err(CompileError::AdjacentPlaceholders {
                    pattern: pattern.to_string(),
                    first: previous.clone().unwrap_or_default(),
                    second: name,
                });
            }
        } else {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Placeholder(if name.is_empty() {
            None
        } else {
            Some(name)
        }));
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// 리터럴을 이스케이프해 추가한다. 공백 묶음은 `\s+`로 바꾼다.
fn push_literal(expression: &mut String, text: &str) {
    let mut in_whitespace = false;
    let mut buf = [0u8; 4];
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                expression.push_str(r"\s+");
                in_whitespace = true;
            }
            continue;
        }
        in_whitespace = false;
        expression.push_str(&regex::escape(ch.encode_utf8(&mut buf)));
    }
}
