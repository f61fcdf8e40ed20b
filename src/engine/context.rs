use once_cell::sync::Lazy;
use regex::Regex;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// Story 하나를 실행하는 동안 Step 간 상태를 공유하기 위한 컨텍스트이다.
///
/// Story 작업이 소유하며 Given Story도 같은 컨텍스트를 이어서 사용한다.
pub struct StepContext {
    /// 실행 중인 최상위 Story 식별자.
    story: String,
    /// 문자열 기반 변수 저장소이다.
    vars: HashMap<String, String>,
    /// 타입별 픽스처 저장소이다.
    fixtures: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    /// Story 시간 초과 시 취소되는 토큰.
    cancel: CancellationToken,
}

impl StepContext {
    /// 비어 있는 컨텍스트를 생성한다.
    ///
    /// # 매개변수
    /// - `story`: 최상위 Story 식별자.
    /// - `cancel`: Story 취소 토큰.
    pub fn new(story: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            story: story.into(),
            vars: HashMap::new(),
            fixtures: HashMap::new(),
            cancel,
        }
    }

    /// 최상위 Story 식별자를 반환한다.
    pub fn story(&self) -> &str {
        &self.story
    }

    /// 컨텍스트 변수 값을 설정한다.
    pub fn set_var(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// 변수 값을 조회한다.
    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(|s| s.as_str())
    }

    /// 픽스처를 저장한다. 같은 타입의 기존 값은 교체되어 반환된다.
    pub fn insert_fixture<T: Any + Send + Sync>(&mut self, value: T) -> Option<T> {
        self.fixtures
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    /// 픽스처를 조회한다.
    pub fn fixture<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.fixtures
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    /// 픽스처를 변경 가능하게 조회한다.
    pub fn fixture_mut<T: Any + Send + Sync>(&mut self) -> Option<&mut T> {
        self.fixtures
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut::<T>())
    }

    /// 픽스처가 없으면 Step 오류로 쓸 수 있는 메시지와 함께 실패한다.
    pub fn require_fixture_mut<T: Any + Send + Sync>(&mut self) -> anyhow::Result<&mut T> {
        self.fixture_mut::<T>().ok_or_else(|| {
            anyhow::anyhow!(
                "{} 픽스처가 준비되지 않았습니다.",
                std::any::type_name::<T>()
            )
        })
    }

    /// 픽스처를 제거해 반환한다.
    pub fn take_fixture<T: Any + Send + Sync>(&mut self) -> Option<T> {
        self.fixtures
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }

    /// Story 취소 토큰을 반환한다. 오래 걸리는 액션은 이 토큰을 관찰할 수 있다.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Story가 취소되었는지 확인한다.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Step 문구의 `${VAR}`를 컨텍스트 변수로 치환한다.
    ///
    /// 값이 없는 플레이스홀더는 그대로 남겨 패턴 매칭에 맡긴다.
    pub fn expand_vars(&self, template: &str) -> String {
        static PLACEHOLDER: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"\$\{([A-Za-z0-9_]+)\}").expect("정규식 컴파일 실패"));
        if !template.contains("${") {
            return template.to_string();
        }
        PLACEHOLDER
            .replace_all(template, |caps: &regex::Captures| {
                let key = &caps[1];
                match self.get_var(key) {
                    Some(val) => val.to_string(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

impl std::fmt::Debug for StepContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepContext")
            .field("story", &self.story)
            .field("vars", &self.vars)
            .field("fixtures", &self.fixtures.len())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
