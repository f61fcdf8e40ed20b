use crate::engine::state::Outcome;
use crate::steps::candidate::SharedAction;
use std::fmt;

/// 훅이 실행되는 생명주기 단계이다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookStage {
    BeforeStory,
    AfterStory,
    BeforeScenario,
    AfterScenario,
}

impl HookStage {
    /// 종료 단계 훅인지 여부.
    pub fn is_after(self) -> bool {
        matches!(self, HookStage::AfterStory | HookStage::AfterScenario)
    }
}

/// 종료 단계 훅의 실행 조건이다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HookOutcome {
    /// 결과와 무관하게 실행한다.
    #[default]
    Any,
    /// 실패하지 않았을 때만 실행한다.
    Success,
    /// 실패했을 때만 실행한다.
    Failure,
}

impl HookOutcome {
    /// 주어진 결과에서 실행 조건을 만족하는지 확인한다.
    pub fn admits(self, outcome: Outcome) -> bool {
        match self {
            HookOutcome::Any => true,
            HookOutcome::Success => outcome != Outcome::Failed,
            HookOutcome::Failure => outcome == Outcome::Failed,
        }
    }
}

/// 코드로 등록하는 생명주기 훅이다.
#[derive(Clone)]
pub struct LifecycleHook {
    name: String,
    stage: HookStage,
    upon: HookOutcome,
    action: SharedAction,
}

impl LifecycleHook {
    /// 단계와 이름, 액션으로 훅을 생성한다.
    pub fn new(stage: HookStage, name: impl Into<String>, action: SharedAction) -> Self {
        Self {
            name: name.into(),
            stage,
            upon: HookOutcome::Any,
            action,
        }
    }

    pub fn before_story(name: impl Into<String>, action: SharedAction) -> Self {
        Self::new(HookStage::BeforeStory, name, action)
    }

    pub fn after_story(name: impl Into<String>, action: SharedAction) -> Self {
        Self::new(HookStage::AfterStory, name, action)
    }

    pub fn before_scenario(name: impl Into<String>, action: SharedAction) -> Self {
        Self::new(HookStage::BeforeScenario, name, action)
    }

    pub fn after_scenario(name: impl Into<String>, action: SharedAction) -> Self {
        Self::new(HookStage::AfterScenario, name, action)
    }

    /// 실행 조건을 지정한다. 시작 단계 훅에는 영향이 없다.
    pub fn upon(mut self, upon: HookOutcome) -> Self {
        self.upon = upon;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage(&self) -> HookStage {
        self.stage
    }

    pub fn action(&self) -> &SharedAction {
        &self.action
    }

    /// 현재까지의 결과로 이 훅을 실행해야 하는지 판단한다.
    pub fn should_run(&self, outcome: Outcome) -> bool {
        !self.stage.is_after() || self.upon.admits(outcome)
    }
}

impl fmt::Debug for LifecycleHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHook")
            .field("name", &self.name)
            .field("stage", &self.stage)
            .field("upon", &self.upon)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::candidate::step_fn;

    #[test]
    fn outcome_filter_applies_to_after_hooks_only() {
        let noop = step_fn(|_, _| Ok(()));
        let on_failure = LifecycleHook::after_scenario("dump", noop.clone()).upon(HookOutcome::Failure);
        assert!(on_failure.should_run(Outcome::Failed));
        assert!(!on_failure.should_run(Outcome::Successful));

        let on_success = LifecycleHook::after_story("cleanup", noop.clone()).upon(HookOutcome::Success);
        assert!(on_success.should_run(Outcome::Pending));
        assert!(!on_success.should_run(Outcome::Failed));

        let before = LifecycleHook::before_scenario("init", noop).upon(HookOutcome::Failure);
        assert!(before.should_run(Outcome::NotPerformed));
    }
}
