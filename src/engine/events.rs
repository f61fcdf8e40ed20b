use crate::engine::state::Outcome;
use crate::error::StoryError;
use crate::steps::hooks::HookStage;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Step 하나의 보고 내용이다.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// 치환이 끝난 Step 문구.
    pub text: String,
    /// 일치한 후보의 패턴. 해석되지 않은 Step은 `None`이다.
    pub pattern: Option<String>,
    /// 결과.
    pub outcome: Outcome,
    /// 실패 사유.
    pub failure: Option<String>,
    /// 실행 시간.
    pub elapsed: Option<Duration>,
}

/// 엔진에서 보고 계층으로 전달되는 이벤트이다.
///
/// 모든 이벤트는 최상위 Story 식별자(`story`)를 가진다. Given Story의 이벤트도
/// 그것을 포함한 최상위 Story의 흐름에 속한다.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportEvent {
    /// Story 시작 알림.
    StoryStarted { story: String, path: String, given: bool },
    /// 메타 필터로 제외된 Story. 시작/종료 이벤트 없이 단독으로 전달된다.
    StoryExcluded { story: String, path: String, given: bool },
    /// Given Story 검증 실패.
    StoryFailed { story: String, path: String, error: StoryError },
    /// Scenario 시작 알림.
    ScenarioStarted { story: String, title: String },
    /// Examples 표의 행 하나가 시작됨.
    ExampleStarted { story: String, row: BTreeMap<String, String> },
    /// Step 결과.
    StepOutcome { story: String, step: StepReport },
    /// 훅 실패.
    HookFailed {
        story: String,
        hook: String,
        stage: HookStage,
        message: String,
    },
    /// Scenario 종료 알림.
    ScenarioFinished {
        story: String,
        title: String,
        outcome: Outcome,
    },
    /// Story 종료 알림.
    StoryFinished {
        story: String,
        path: String,
        given: bool,
        outcome: Outcome,
    },
}

impl ReportEvent {
    /// 이벤트가 속한 최상위 Story 식별자.
    pub fn story(&self) -> &str {
        match self {
            ReportEvent::StoryStarted { story, .. }
            | ReportEvent::StoryExcluded { story, .. }
            | ReportEvent::StoryFailed { story, .. }
            | ReportEvent::ScenarioStarted { story, .. }
            | ReportEvent::ExampleStarted { story, .. }
            | ReportEvent::StepOutcome { story, .. }
            | ReportEvent::HookFailed { story, .. }
            | ReportEvent::ScenarioFinished { story, .. }
            | ReportEvent::StoryFinished { story, .. } => story,
        }
    }
}

/// Story 작업 하나가 이벤트를 보내는 송신기이다.
#[derive(Debug, Clone)]
pub struct ReportEmitter {
    story: String,
    sender: UnboundedSender<ReportEvent>,
}

impl ReportEmitter {
    /// 최상위 Story 식별자와 채널로 송신기를 만든다.
    pub fn new(story: impl Into<String>, sender: UnboundedSender<ReportEvent>) -> Self {
        Self {
            story: story.into(),
            sender,
        }
    }

    pub fn story(&self) -> &str {
        &self.story
    }

    fn send(&self, event: ReportEvent) {
        let _ = self.sender.send(event);
    }

    pub fn story_started(&self, path: &str, given: bool) {
        self.send(ReportEvent::StoryStarted {
            story: self.story.clone(),
            path: path.to_string(),
            given,
        });
    }

    pub fn story_excluded(&self, path: &str, given: bool) {
        self.send(ReportEvent::StoryExcluded {
            story: self.story.clone(),
            path: path.to_string(),
            given,
        });
    }

    pub fn story_failed(&self, path: &str, error: StoryError) {
        self.send(ReportEvent::StoryFailed {
            story: self.story.clone(),
            path: path.to_string(),
            error,
        });
    }

    pub fn scenario_started(&self, title: &str) {
        self.send(ReportEvent::ScenarioStarted {
            story: self.story.clone(),
            title: title.to_string(),
        });
    }

    pub fn example_started(&self, row: BTreeMap<String, String>) {
        self.send(ReportEvent::ExampleStarted {
            story: self.story.clone(),
            row,
        });
    }

    pub fn step_outcome(&self, step: StepReport) {
        self.send(ReportEvent::StepOutcome {
            story: self.story.clone(),
            step,
        });
    }

    pub fn hook_failed(&self, hook: &str, stage: HookStage, message: String) {
        self.send(ReportEvent::HookFailed {
            story: self.story.clone(),
            hook: hook.to_string(),
            stage,
            message,
        });
    }

    pub fn scenario_finished(&self, title: &str, outcome: Outcome) {
        self.send(ReportEvent::ScenarioFinished {
            story: self.story.clone(),
            title: title.to_string(),
            outcome,
        });
    }

    pub fn story_finished(&self, path: &str, given: bool, outcome: Outcome) {
        self.send(ReportEvent::StoryFinished {
            story: self.story.clone(),
            path: path.to_string(),
            given,
            outcome,
        });
    }
}

/// 보고 이벤트를 받는 리스너이다. 필요한 메서드만 구현하면 된다.
pub trait StoryListener: Send + Sync {
    fn story_started(&self, _story: &str, _path: &str, _given: bool) {}

    fn story_excluded(&self, _story: &str, _path: &str, _given: bool) {}

    fn story_failed(&self, _story: &str, _path: &str, _error: &StoryError) {}

    fn scenario_started(&self, _story: &str, _title: &str) {}

    fn example_started(&self, _story: &str, _row: &BTreeMap<String, String>) {}

    fn step_outcome(&self, _story: &str, _step: &StepReport) {}

    fn hook_failed(&self, _story: &str, _hook: &str, _stage: HookStage, _message: &str) {}

    fn scenario_finished(&self, _story: &str, _title: &str, _outcome: Outcome) {}

    fn story_finished(&self, _story: &str, _path: &str, _given: bool, _outcome: Outcome) {}

    /// 이벤트를 종류별 메서드로 분배한다.
    fn on_event(&self, event: &ReportEvent) {
        match event {
            ReportEvent::StoryStarted { story, path, given } => self.story_started(story, path, *given),
            ReportEvent::StoryExcluded { story, path, given } => self.story_excluded(story, path, *given),
            ReportEvent::StoryFailed { story, path, error } => self.story_failed(story, path, error),
            ReportEvent::ScenarioStarted { story, title } => self.scenario_started(story, title),
            ReportEvent::ExampleStarted { story, row } => self.example_started(story, row),
            ReportEvent::StepOutcome { story, step } => self.step_outcome(story, step),
            ReportEvent::HookFailed {
                story,
                hook,
                stage,
                message,
            } => self.hook_failed(story, hook, *stage, message),
            ReportEvent::ScenarioFinished {
                story,
                title,
                outcome,
            } => self.scenario_finished(story, title, *outcome),
            ReportEvent::StoryFinished {
                story,
                path,
                given,
                outcome,
            } => self.story_finished(story, path, *given, *outcome),
        }
    }
}

/// StoryListener를 공유하기 위한 Arc 타입 별칭이다.
pub type SharedListener = Arc<dyn StoryListener>;

/// 채널이 닫힐 때까지 이벤트를 모든 리스너에 전달한다.
pub async fn pump_events(mut receiver: UnboundedReceiver<ReportEvent>, listeners: Vec<SharedListener>) {
    while let Some(event) = receiver.recv().await {
        for listener in &listeners {
            listener.on_event(&event);
        }
    }
}

/// 이벤트를 tracing 로그로 출력하는 리스너이다.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl StoryListener for TracingListener {
    fn story_started(&self, story: &str, path: &str, given: bool) {
        tracing::info!(story, path, given, "Story 시작");
    }

    fn story_excluded(&self, story: &str, path: &str, given: bool) {
        tracing::info!(story, path, given, "메타 필터로 Story 제외");
    }

    fn story_failed(&self, story: &str, path: &str, error: &StoryError) {
        tracing::error!(story, path, error = %error, "Story 실행 불가");
    }

    fn scenario_started(&self, story: &str, title: &str) {
        tracing::info!(story, title, "Scenario 시작");
    }

    fn example_started(&self, story: &str, row: &BTreeMap<String, String>) {
        tracing::debug!(story, ?row, "Examples 행 시작");
    }

    fn step_outcome(&self, story: &str, step: &StepReport) {
        match step.outcome {
            Outcome::Failed => tracing::warn!(
                story,
                step = step.text.as_str(),
                failure = step.failure.as_deref().unwrap_or_default(),
                "Step 실패"
            ),
            Outcome::Pending => tracing::warn!(story, step = step.text.as_str(), "일치하는 Step 정의 없음"),
            outcome => tracing::debug!(
                story,
                step = step.text.as_str(),
                %outcome,
                elapsed_ms = step.elapsed.map(|d| d.as_millis() as u64),
                "Step 종료"
            ),
        }
    }

    fn hook_failed(&self, story: &str, hook: &str, stage: HookStage, message: &str) {
        tracing::warn!(story, hook, ?stage, message, "훅 실패");
    }

    fn scenario_finished(&self, story: &str, title: &str, outcome: Outcome) {
        tracing::info!(story, title, %outcome, "Scenario 종료");
    }

    fn story_finished(&self, story: &str, path: &str, given: bool, outcome: Outcome) {
        tracing::info!(story, path, given, %outcome, "Story 종료");
    }
}

/// 받은 이벤트를 메모리에 모으는 리스너이다.
#[derive(Debug, Default, Clone)]
pub struct EventCollector {
    events: Arc<Mutex<Vec<ReportEvent>>>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 지금까지 받은 이벤트 전체를 복사해 반환한다.
    pub fn events(&self) -> Vec<ReportEvent> {
        self.events
            .lock()
            .expect("EventCollector mutex poisoned")
            .clone()
    }

    /// 지정한 최상위 Story의 이벤트만 순서대로 반환한다.
    pub fn for_story(&self, story: &str) -> Vec<ReportEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.story() == story)
            .collect()
    }

    /// 지정한 최상위 Story의 Step 결과만 반환한다.
    pub fn step_outcomes(&self, story: &str) -> Vec<(String, Outcome)> {
        self.for_story(story)
            .into_iter()
            .filter_map(|event| match event {
                ReportEvent::StepOutcome { step, .. } => Some((step.text, step.outcome)),
                _ => None,
            })
            .collect()
    }
}

impl StoryListener for EventCollector {
    fn on_event(&self, event: &ReportEvent) {
        self.events
            .lock()
            .expect("EventCollector mutex poisoned")
            .push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc::unbounded_channel;

    #[derive(Default)]
    struct FinishedCounter(AtomicUsize);

    impl StoryListener for FinishedCounter {
        fn story_finished(&self, _story: &str, _path: &str, _given: bool, _outcome: Outcome) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn pump_fans_out_to_every_listener_in_order() {
        let (tx, rx) = unbounded_channel();
        let collector = EventCollector::new();
        let counter = Arc::new(FinishedCounter::default());
        let a = ReportEmitter::new("a.story", tx.clone());
        let b = ReportEmitter::new("b.story", tx);
        a.story_started("a.story", false);
        b.story_started("b.story", false);
        a.scenario_started("first");
        a.scenario_finished("first", Outcome::Successful);
        b.story_finished("b.story", false, Outcome::Pending);
        a.story_finished("a.story", false, Outcome::Successful);
        drop(a);
        drop(b);

        let listeners: Vec<SharedListener> = vec![Arc::new(collector.clone()) as SharedListener, counter.clone()];
        pump_events(rx, listeners).await;

        assert_eq!(collector.events().len(), 6);
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
        let a_events = collector.for_story("a.story");
        assert!(matches!(a_events.first(), Some(ReportEvent::StoryStarted { .. })));
        assert!(matches!(
            a_events.last(),
            Some(ReportEvent::StoryFinished { outcome: Outcome::Successful, .. })
        ));
        assert_eq!(a_events.len(), 4);
    }

    #[test]
    fn emitter_labels_events_with_root_story() {
        let (tx, mut rx) = unbounded_channel();
        let emitter = ReportEmitter::new("root.story", tx);
        emitter.story_started("given.story", true);
        let event = rx.try_recv().expect("이벤트 없음");
        assert_eq!(event.story(), "root.story");
        assert!(matches!(event, ReportEvent::StoryStarted { ref path, given: true, .. } if path == "given.story"));
    }
}
