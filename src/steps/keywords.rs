//! Step 줄의 시작 키워드를 인식한다.

use serde::Deserialize;

/// Given 역할 이름. Step 정의는 표기와 무관하게 역할 이름으로 키워드를 가진다.
pub const GIVEN: &str = "Given";
/// When 역할 이름.
pub const WHEN: &str = "When";
/// Then 역할 이름.
pub const THEN: &str = "Then";

/// Step 줄을 나눈 결과이다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepLine<'a> {
    /// 실행 대상 Step. `keyword`는 `And`를 이미 풀어낸 역할 이름이다.
    /// Given/When/Then 표기는 [`GIVEN`], [`WHEN`], [`THEN`]으로 바뀌고
    /// 추가 키워드는 표기 그대로 남는다.
    Step {
        keyword: String,
        body: &'a str,
        is_and: bool,
    },
    /// 무시 표식으로 시작하는 줄.
    Comment(&'a str),
    /// 알려진 키워드로 시작하지 않는 줄.
    Unknown(&'a str),
}

/// Step 시작 키워드 집합이다.
///
/// 대소문자를 구분하며 키워드 뒤에는 공백이 와야 한다.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Keywords {
    /// Given 키워드.
    pub given: String,
    /// When 키워드.
    pub when: String,
    /// Then 키워드.
    pub then: String,
    /// 직전 키워드를 이어받는 키워드.
    pub and: String,
    /// 이 문자열로 시작하는 줄은 실행하지 않는다.
    pub ignorable: String,
    /// 추가 시작 키워드.
    pub custom: Vec<String>,
}

impl Default for Keywords {
    fn default() -> Self {
        Self {
            given: GIVEN.to_string(),
            when: WHEN.to_string(),
            then: THEN.to_string(),
            and: "And".to_string(),
            ignorable: "!--".to_string(),
            custom: Vec::new(),
        }
    }
}

impl Keywords {
    /// `And`를 제외한 시작 키워드의 (표기, 역할 이름) 쌍을 순회한다.
    fn roles(&self) -> impl Iterator<Item = (&str, &str)> {
        [
            (self.given.as_str(), GIVEN),
            (self.when.as_str(), WHEN),
            (self.then.as_str(), THEN),
        ]
        .into_iter()
        .chain(self.custom.iter().map(|word| (word.as_str(), word.as_str())))
    }

    /// 줄을 키워드와 본문으로 나눈다.
    ///
    /// # 매개변수
    /// - `line`: Story에 적힌 Step 한 줄.
    /// - `previous`: 같은 Scenario에서 직전에 사용된 `And`가 아닌 키워드.
    pub fn split<'a>(&self, line: &'a str, previous: Option<&str>) -> StepLine<'a> {
        let line = line.trim();
        if line.starts_with(self.ignorable.as_str()) {
            return StepLine::Comment(line);
        }
        if let Some(body) = strip_keyword(line, &self.and) {
            return match previous {
                Some(keyword) => StepLine::Step {
                    keyword: keyword.to_string(),
                    body,
                    is_and: true,
                },
                None => StepLine::Unknown(line),
            };
        }
        self.roles()
            .find_map(|(word, role)| {
                strip_keyword(line, word).map(|body| StepLine::Step {
                    keyword: role.to_string(),
                    body,
                    is_and: false,
                })
            })
            .unwrap_or(StepLine::Unknown(line))
    }

    /// `And`가 아닌 시작 키워드로 시작하면 그 역할 이름을 반환한다.
    pub fn leading_keyword(&self, line: &str) -> Option<String> {
        let line = line.trim();
        self.roles()
            .find(|(word, _)| strip_keyword(line, word).is_some())
            .map(|(_, role)| role.to_string())
    }
}

/// 키워드 뒤가 공백이거나 줄 끝이면 본문을 반환한다.
fn strip_keyword<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    if keyword.is_empty() {
        return None;
    }
    let rest = line.strip_prefix(keyword)?;
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() => Some(rest.trim_start()),
        Some(_) => None,
    }
}
