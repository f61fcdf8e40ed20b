/// Step 패턴 컴파일 중 발생 가능한 오류를 표현한다.
///
/// 등록 시점에 발생하며 전체 실행을 중단시키는 유일한 Step 관련 오류이다.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// 두 플레이스홀더 사이에 구분 문자열이 없는 경우이다.
    #[error("플레이스홀더 사이에 구분 문자열이 없습니다: '{pattern}' (${first} 다음 ${second})")]
    AdjacentPlaceholders {
        pattern: String,
        first: String,
        second: String,
    },
    /// 같은 이름의 플레이스홀더가 두 번 이상 선언된 경우이다.
    #[error("중복된 플레이스홀더 이름입니다: '{pattern}' (${name})")]
    DuplicatePlaceholder { pattern: String, name: String },
    /// 생성한 정규식이 컴파일되지 않은 경우이다.
    #[error("패턴 정규식 컴파일 실패: '{pattern}'")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Step 해석 및 실행 중 발생해 FAILED 결과로 변환되는 오류이다.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// 동일 점수의 후보가 둘 이상인 경우이다.
    #[error("Step '{step}'에 일치하는 후보가 여러 개입니다: {}", candidates.join(", "))]
    AmbiguousMatch {
        step: String,
        candidates: Vec<String>,
    },
    /// 캡처한 문자열을 선언된 타입으로 변환하지 못한 경우이다.
    #[error("파라미터 '{text}'를 '{type_tag}' 타입으로 변환할 수 없습니다: {reason}")]
    ParameterConversion {
        text: String,
        type_tag: String,
        reason: String,
    },
    /// 등록되지 않은 타입 태그를 참조한 경우이다.
    #[error("등록되지 않은 파라미터 타입입니다: {0}")]
    UnknownConverter(String),
    /// Step 액션이 오류를 반환한 경우이다. 원본 오류를 원인으로 보존한다.
    #[error("Step '{step}' 실행 실패")]
    ActionFailed {
        step: String,
        #[source]
        source: anyhow::Error,
    },
    /// Step 액션이 패닉한 경우이다.
    #[error("Step '{step}' 실행 중 패닉: {message}")]
    ActionPanicked { step: String, message: String },
    /// Composite Step이 허용 깊이를 넘어 중첩된 경우이다.
    #[error("Composite Step '{step}'의 중첩 깊이가 {depth}을 넘었습니다")]
    CompositeTooDeep { step: String, depth: usize },
}

/// Story 단위 실행을 중단시키는 오류를 표현한다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoryError {
    /// Given Story 참조가 자기 자신으로 되돌아오는 경우이다.
    #[error("순환 Given Story 참조가 감지되었습니다: {}", chain.join(" -> "))]
    CyclicGivenStory { chain: Vec<String> },
    /// 카탈로그에 없는 Given Story를 참조한 경우이다.
    #[error("Story '{parent}'가 존재하지 않는 Given Story를 참조합니다: {missing}")]
    MissingGivenStory { parent: String, missing: String },
}
