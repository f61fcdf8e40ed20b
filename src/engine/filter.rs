use crate::story::Meta;
use regex::Regex;
use std::fmt;

/// 메타 필터의 토큰 하나이다.
#[derive(Debug, Clone)]
struct MetaToken {
    /// `+`이면 포함 조건, `-`이면 제외 조건.
    include: bool,
    name: String,
    /// 값 조건. 비어 있으면 속성 존재만 확인한다.
    value: Option<ValueMatcher>,
}

#[derive(Debug, Clone)]
enum ValueMatcher {
    Exact(String),
    Wildcard(Regex),
}

impl ValueMatcher {
    fn parse(value: &str) -> Result<Self, regex::Error> {
        if !value.contains('*') {
            return Ok(ValueMatcher::Exact(value.to_string()));
        }
        let expression = value
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        Regex::new(&format!("^{expression}$")).map(ValueMatcher::Wildcard)
    }

    fn matches(&self, value: &str) -> bool {
        match self {
            ValueMatcher::Exact(expected) => expected == value,
            ValueMatcher::Wildcard(regex) => regex.is_match(value),
        }
    }
}

impl MetaToken {
    fn matches(&self, meta: &Meta) -> bool {
        match (meta.property(&self.name), &self.value) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(actual), Some(matcher)) => matcher.matches(actual),
        }
    }
}

/// `+이름 값` / `-이름 값` 토큰으로 이루어진 메타 필터이다.
///
/// 모든 포함 조건을 만족하고 어떤 제외 조건에도 걸리지 않아야 허용된다.
/// 값에 `*`를 쓰면 임의 문자열과 일치한다. 빈 필터는 모두 허용한다.
#[derive(Debug, Clone, Default)]
pub struct MetaFilter {
    source: String,
    tokens: Vec<MetaToken>,
}

impl MetaFilter {
    /// 필터 표현식을 파싱한다.
    ///
    /// `+`나 `-`로 시작하지 않는 단어는 직전 토큰의 값에 공백으로 이어 붙인다.
    pub fn parse(expression: &str) -> Result<Self, regex::Error> {
        let mut raw: Vec<(bool, String, Vec<&str>)> = Vec::new();
        for word in expression.split_whitespace() {
            if let Some(name) = word.strip_prefix('+') {
                raw.push((true, name.to_string(), Vec::new()));
            } else if let Some(name) = word.strip_prefix('-') {
                raw.push((false, name.to_string(), Vec::new()));
            } else if let Some((_, _, value)) = raw.last_mut() {
                value.push(word);
            } else {
                tracing::warn!(word, "메타 필터 토큰은 '+' 또는 '-'로 시작해야 합니다");
            }
        }
        let mut tokens = Vec::with_capacity(raw.len());
        for (include, name, value) in raw {
            if name.is_empty() {
                continue;
            }
            let value = if value.is_empty() {
                None
            } else {
                Some(ValueMatcher::parse(&value.join(" "))?)
            };
            tokens.push(MetaToken {
                include,
                name,
                value,
            });
        }
        Ok(Self {
            source: expression.trim().to_string(),
            tokens,
        })
    }

    /// 필터 조건이 없는지 확인한다.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// 원본 표현식.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// 메타가 필터를 통과하는지 판단한다.
    pub fn allows(&self, meta: &Meta) -> bool {
        self.tokens
            .iter()
            .all(|token| token.matches(meta) == token.include)
    }
}

impl fmt::Display for MetaFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
