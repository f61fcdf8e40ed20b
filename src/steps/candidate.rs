//! Step 후보 정의와 등록소.

use crate::engine::context::StepContext;
use crate::error::CompileError;
use crate::steps::hooks::{HookStage, LifecycleHook};
use crate::steps::keywords::{GIVEN, THEN, WHEN};
use crate::steps::params::StepArgs;
use crate::steps::pattern::StepPattern;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::ops::RangeBounds;
use std::sync::Arc;

/// Step 또는 훅이 실행하는 동작을 정의한다.
#[async_trait]
pub trait StepAction: Send + Sync {
    /// 동작을 수행한다.
    ///
    /// # 매개변수
    /// - `ctx`: Story 단위 공유 상태.
    /// - `args`: 패턴에서 캡처해 변환한 파라미터.
    async fn perform(&self, ctx: &mut StepContext, args: &StepArgs) -> anyhow::Result<()>;
}

/// StepAction을 공유하기 위한 Arc 타입 별칭이다.
pub type SharedAction = Arc<dyn StepAction>;

/// 동기 클로저를 [`StepAction`]으로 감싼다.
pub struct FnAction<F>(F);

#[async_trait]
impl<F> StepAction for FnAction<F>
where
    F: Fn(&mut StepContext, &StepArgs) -> anyhow::Result<()> + Send + Sync,
{
    async fn perform(&self, ctx: &mut StepContext, args: &StepArgs) -> anyhow::Result<()> {
        (self.0)(ctx, args)
    }
}

/// 동기 클로저로 공유 액션을 만든다.
pub fn step_fn<F>(action: F) -> SharedAction
where
    F: Fn(&mut StepContext, &StepArgs) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(FnAction(action))
}

/// 등록 전 Step 정의이다. 외부 제공자가 만드는 단위이다.
#[derive(Clone)]
pub struct StepDefinition {
    keyword: String,
    pattern: String,
    priority: i32,
    action: SharedAction,
    param_types: HashMap<String, String>,
    aliases: Vec<String>,
    composed: Vec<String>,
}

impl StepDefinition {
    /// 키워드와 패턴, 액션으로 정의를 생성한다.
    pub fn new(keyword: impl Into<String>, pattern: impl Into<String>, action: SharedAction) -> Self {
        Self {
            keyword: keyword.into(),
            pattern: pattern.into(),
            priority: 0,
            action,
            param_types: HashMap::new(),
            aliases: Vec::new(),
            composed: Vec::new(),
        }
    }

    /// Given 정의를 생성한다.
    pub fn given(pattern: impl Into<String>, action: SharedAction) -> Self {
        Self::new(GIVEN, pattern, action)
    }

    /// When 정의를 생성한다.
    pub fn when(pattern: impl Into<String>, action: SharedAction) -> Self {
        Self::new(WHEN, pattern, action)
    }

    /// Then 정의를 생성한다.
    pub fn then(pattern: impl Into<String>, action: SharedAction) -> Self {
        Self::new(THEN, pattern, action)
    }

    /// 명시적 우선순위를 지정한다. 클수록 우선한다.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// 플레이스홀더의 타입 태그를 선언한다.
    pub fn param(mut self, name: impl Into<String>, type_tag: impl Into<String>) -> Self {
        self.param_types.insert(name.into(), type_tag.into());
        self
    }

    /// 같은 액션을 가리키는 별칭 패턴을 추가한다.
    pub fn alias(mut self, pattern: impl Into<String>) -> Self {
        self.aliases.push(pattern.into());
        self
    }

    /// Composite Step으로 만든다.
    ///
    /// 액션이 성공하면 하위 Step 문구들이 이어서 실행된다.
    /// 하위 문구의 `<이름>`은 이 패턴이 캡처한 원문으로 치환된다.
    pub fn composed_of<I, S>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.composed = steps.into_iter().map(Into::into).collect();
        self
    }
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("keyword", &self.keyword)
            .field("pattern", &self.pattern)
            .field("priority", &self.priority)
            .field("aliases", &self.aliases)
            .field("composed", &self.composed)
            .finish()
    }
}

/// 컴파일된 Step 후보이다. 등록 이후에는 변경되지 않는다.
pub struct StepCandidate {
    /// 시작 키워드.
    keyword: String,
    /// 컴파일된 패턴.
    pattern: StepPattern,
    /// 명시적 우선순위.
    priority: i32,
    /// 실행할 액션.
    action: SharedAction,
    /// 플레이스홀더 이름별 타입 태그.
    param_types: HashMap<String, String>,
    /// Composite Step의 하위 Step 문구.
    composed: Vec<String>,
}

impl StepCandidate {
    /// 시작 키워드를 반환한다.
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// 컴파일된 패턴을 반환한다.
    pub fn pattern(&self) -> &StepPattern {
        &self.pattern
    }

    /// 명시적 우선순위를 반환한다.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// 액션을 반환한다.
    pub fn action(&self) -> &SharedAction {
        &self.action
    }

    /// Composite Step이면 하위 Step 문구를 반환한다. 일반 Step은 비어 있다.
    pub fn composed_steps(&self) -> &[String] {
        &self.composed
    }

    /// 플레이스홀더의 선언 타입을 반환한다.
    pub fn param_type(&self, name: &str) -> Option<&str> {
        self.param_types.get(name).map(String::as_str)
    }

    /// `키워드 패턴` 형태의 표시 문자열이다.
    pub fn describe(&self) -> String {
        format!("{} {}", self.keyword, self.pattern)
    }
}

impl fmt::Debug for StepCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepCandidate")
            .field("keyword", &self.keyword)
            .field("pattern", &self.pattern.as_str())
            .field("priority", &self.priority)
            .finish()
    }
}

/// 외부 Step 보유 객체를 등록소에 연결하는 제공자 계약이다.
pub trait StepProvider: Send + Sync {
    /// 제공할 Step 정의 목록을 반환한다.
    fn candidates(&self) -> Vec<StepDefinition>;

    /// 제공할 생명주기 훅 목록을 반환한다.
    fn hooks(&self) -> Vec<LifecycleHook> {
        Vec::new()
    }
}

/// Step 후보 등록소이다.
///
/// 실행 준비 단계에서만 수정하고 이후에는 `Arc`로 공유해 잠금 없이 읽는다.
#[derive(Debug, Default)]
pub struct CandidateRegistry {
    /// 등록 순서대로 저장된 후보.
    candidates: Vec<Arc<StepCandidate>>,
    /// 코드 훅.
    hooks: Vec<LifecycleHook>,
}

impl CandidateRegistry {
    /// 비어 있는 등록소를 생성한다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 정의를 컴파일해 등록한다. 별칭은 같은 액션을 공유하는 독립 후보가 된다.
    ///
    /// # 반환값
    /// 본 패턴이나 별칭 중 하나라도 컴파일되지 않으면 아무것도 등록하지 않고
    /// [`CompileError`]를 반환한다.
    pub fn register(&mut self, definition: StepDefinition) -> Result<(), CompileError> {
        let StepDefinition {
            keyword,
            pattern,
            priority,
            action,
            param_types,
            aliases,
            composed,
        } = definition;
        let mut compiled = Vec::with_capacity(aliases.len() + 1);
        for source in std::iter::once(&pattern).chain(aliases.iter()) {
            compiled.push(StepPattern::compile(source)?);
        }
        for pattern in compiled {
            for name in param_types.keys() {
                if !pattern.parameter_names().contains(name) {
                    tracing::warn!(
                        pattern = pattern.as_str(),
                        param = name.as_str(),
                        "패턴에 없는 파라미터 타입 선언"
                    );
                }
            }
            self.candidates.push(Arc::new(StepCandidate {
                keyword: keyword.clone(),
                pattern,
                priority,
                action: action.clone(),
                param_types: param_types.clone(),
                composed: composed.clone(),
            }));
        }
        Ok(())
    }

    /// 제공자의 정의와 훅을 모두 등록한다.
    pub fn register_provider(&mut self, provider: &dyn StepProvider) -> Result<(), CompileError> {
        for definition in provider.candidates() {
            self.register(definition)?;
        }
        for hook in provider.hooks() {
            self.register_hook(hook);
        }
        Ok(())
    }

    /// 코드 훅을 등록한다.
    pub fn register_hook(&mut self, hook: LifecycleHook) {
        self.hooks.push(hook);
    }

    /// 등록된 모든 후보를 등록 순서대로 반환한다.
    pub fn all_candidates(&self) -> &[Arc<StepCandidate>] {
        &self.candidates
    }

    /// 키워드와 우선순위 범위로 후보를 찾는다.
    pub fn find<R>(&self, keyword: &str, priorities: R) -> Vec<Arc<StepCandidate>>
    where
        R: RangeBounds<i32>,
    {
        self.candidates
            .iter()
            .filter(|candidate| candidate.keyword == keyword && priorities.contains(&candidate.priority))
            .cloned()
            .collect()
    }

    /// 지정한 단계의 훅을 등록 순서대로 반환한다.
    pub fn hooks(&self, stage: HookStage) -> impl Iterator<Item = &LifecycleHook> {
        self.hooks.iter().filter(move |hook| hook.stage() == stage)
    }

    /// 후보 수를 반환한다.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// 등록소가 비었는지 확인한다.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}
