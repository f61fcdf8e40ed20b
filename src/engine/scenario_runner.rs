use super::story_runner::StoryRunner;
use crate::engine::context::StepContext;
use crate::engine::events::{ReportEmitter, StepReport};
use crate::engine::state::{Disposition, Outcome, ScenarioRuntime, StepTimer};
use crate::error::StepError;
use crate::steps::candidate::SharedAction;
use crate::steps::hooks::HookStage;
use crate::steps::params::{substitute_named, StepArgs};
use crate::steps::resolver::Resolution;
use crate::story::Scenario;
use futures::future::{BoxFuture, FutureExt};
use std::any::Any;
use std::collections::{BTreeMap, VecDeque};
use std::panic::AssertUnwindSafe;

/// Composite Step 중첩 한도.
const MAX_COMPOSITE_DEPTH: usize = 16;

impl StoryRunner {
    /// Scenario 하나를 실행한다.
    ///
    /// 순서: Given Story → (Examples 행마다) 시작 훅 → Step → 종료 훅.
    /// `parameters`는 Given Story로 호출될 때 넘겨받은 `<이름>` 값이며 Examples 행 값이 우선한다.
    pub(super) fn perform_scenario<'a>(
        &'a self,
        scenario: &'a Scenario,
        ctx: &'a mut StepContext,
        emitter: &'a ReportEmitter,
        given: bool,
        parameters: &'a BTreeMap<String, String>,
    ) -> BoxFuture<'a, Outcome> {
        async move {
            emitter.scenario_started(&scenario.title);
            let given_outcome = self
                .perform_given_stories(&scenario.given_stories, scenario.examples.as_ref(), ctx, emitter)
                .await;
            let halt = given_outcome == Outcome::Failed && self.inner.config.skip_story_if_given_story_failed;
            let mut outcome = given_outcome;
            match scenario.examples.as_ref().filter(|table| !table.is_empty()) {
                Some(table) => {
                    for index in 0..table.len() {
                        let row = table.row_as_map(index).unwrap_or_default();
                        emitter.example_started(row.clone());
                        let mut values = parameters.clone();
                        values.extend(row);
                        let steps = substitute_all(&scenario.steps, &values);
                        outcome = outcome.worst(self.perform_example(&steps, ctx, emitter, given, halt).await);
                    }
                }
                None => {
                    let steps = substitute_all(&scenario.steps, parameters);
                    outcome = outcome.worst(self.perform_example(&steps, ctx, emitter, given, halt).await);
                }
            }
            emitter.scenario_finished(&scenario.title, outcome);
            outcome
        }
        .boxed()
    }

    /// 훅과 Step 목록을 한 번 실행한다.
    async fn perform_example(
        &self,
        steps: &[String],
        ctx: &mut StepContext,
        emitter: &ReportEmitter,
        given: bool,
        halt: bool,
    ) -> Outcome {
        let config = &self.inner.config;
        let with_hooks = !(given && config.skip_before_and_after_scenario_hooks_in_given_stories);
        let mut runtime = ScenarioRuntime::new(config.failure_strategy, config.pending_steps);
        if halt {
            runtime.halt();
        }
        if with_hooks && !ctx.is_cancelled() {
            let hooks = self.run_hooks(HookStage::BeforeScenario, runtime.outcome(), ctx, emitter).await;
            runtime.absorb(hooks);
        }
        self.perform_steps_with(&mut runtime, steps, ctx, emitter).await;
        if with_hooks && !runtime.is_cancelled() {
            let hooks = self.run_hooks(HookStage::AfterScenario, runtime.outcome(), ctx, emitter).await;
            runtime.absorb(hooks);
        }
        runtime.outcome()
    }

    /// 훅 없이 Step 목록만 실행한다. Story 전후 Step에 사용한다.
    pub(super) async fn perform_steps(
        &self,
        steps: &[String],
        ctx: &mut StepContext,
        emitter: &ReportEmitter,
    ) -> Outcome {
        let config = &self.inner.config;
        let mut runtime = ScenarioRuntime::new(config.failure_strategy, config.pending_steps);
        self.perform_steps_with(&mut runtime, steps, ctx, emitter).await;
        runtime.outcome()
    }

    async fn perform_steps_with(
        &self,
        runtime: &mut ScenarioRuntime,
        steps: &[String],
        ctx: &mut StepContext,
        emitter: &ReportEmitter,
    ) {
        let keywords = self.inner.resolver.keywords();
        let mut previous: Option<String> = None;
        let mut queue: VecDeque<(String, usize)> = steps.iter().map(|step| (step.clone(), 0)).collect();
        while let Some((raw, depth)) = queue.pop_front() {
            let text = ctx.expand_vars(&raw);
            let (report, composed) = match runtime.next_disposition(ctx.is_cancelled()) {
                Disposition::Cancel => (unperformed(&text, Outcome::Cancelled), Vec::new()),
                Disposition::Skip => (unperformed(&text, Outcome::Skipped), Vec::new()),
                Disposition::Perform => self.perform_step(&text, previous.as_deref(), depth, ctx).await,
            };
            if let Some(keyword) = keywords.leading_keyword(&text) {
                previous = Some(keyword);
            }
            runtime.absorb(report.outcome);
            emitter.step_outcome(report);
            for step in composed.into_iter().rev() {
                queue.push_front((step, depth + 1));
            }
        }
    }

    /// Step 하나를 해석하고 실행한다.
    ///
    /// Composite Step이 성공하면 이어서 실행할 하위 Step 문구를 함께 반환한다.
    async fn perform_step(
        &self,
        text: &str,
        previous: Option<&str>,
        depth: usize,
        ctx: &mut StepContext,
    ) -> (StepReport, Vec<String>) {
        let timer = StepTimer::start();
        let (pattern, composed, result) = match self.inner.resolver.resolve(text, previous) {
            Ok(Resolution::Comment { .. }) => return (unperformed(text, Outcome::NotPerformed), Vec::new()),
            Ok(Resolution::Pending { .. }) => return (unperformed(text, Outcome::Pending), Vec::new()),
            Ok(Resolution::Bound(step)) => {
                let pattern = Some(step.candidate().describe());
                let composed = step.composed_steps();
                if !composed.is_empty() && depth >= MAX_COMPOSITE_DEPTH {
                    let error = StepError::CompositeTooDeep {
                        step: text.to_string(),
                        depth: MAX_COMPOSITE_DEPTH,
                    };
                    (pattern, Vec::new(), Err(error))
                } else if self.inner.config.dry_run {
                    let report = StepReport {
                        pattern,
                        ..unperformed(text, Outcome::NotPerformed)
                    };
                    return (report, composed);
                } else {
                    let result = invoke(step.action(), ctx, step.args(), text).await;
                    (pattern, composed, result)
                }
            }
            Err(error) => (None, Vec::new(), Err(error)),
        };
        let (outcome, failure, composed) = match result {
            Ok(()) => (Outcome::Successful, None, composed),
            Err(error) => (Outcome::Failed, Some(describe_error(error)), Vec::new()),
        };
        let report = StepReport {
            text: text.to_string(),
            pattern,
            outcome,
            failure,
            elapsed: Some(timer.elapsed()),
        };
        (report, composed)
    }

    /// 단계에 등록된 코드 훅을 실행한다.
    ///
    /// 훅 하나가 실패해도 같은 단계의 나머지 훅은 실행된다.
    /// 반환값은 실패가 있으면 FAILED, 없으면 NOT_PERFORMED이다.
    pub(super) async fn run_hooks(
        &self,
        stage: HookStage,
        current: Outcome,
        ctx: &mut StepContext,
        emitter: &ReportEmitter,
    ) -> Outcome {
        if self.inner.config.dry_run {
            return Outcome::NotPerformed;
        }
        let args = StepArgs::new();
        let mut outcome = Outcome::NotPerformed;
        for hook in self.inner.resolver.registry().hooks(stage) {
            if !hook.should_run(current) {
                continue;
            }
            if let Err(error) = invoke(hook.action(), ctx, &args, hook.name()).await {
                let message = describe_error(error);
                tracing::warn!(hook = hook.name(), ?stage, message = message.as_str(), "훅 실패");
                emitter.hook_failed(hook.name(), stage, message);
                outcome = Outcome::Failed;
            }
        }
        outcome
    }
}

/// 액션을 실행하고 오류와 패닉을 [`StepError`]로 바꾼다.
async fn invoke(
    action: &SharedAction,
    ctx: &mut StepContext,
    args: &StepArgs,
    label: &str,
) -> Result<(), StepError> {
    match AssertUnwindSafe(action.perform(ctx, args)).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(StepError::ActionFailed {
            step: label.to_string(),
            source,
        }),
        Err(payload) => Err(StepError::ActionPanicked {
            step: label.to_string(),
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "알 수 없는 패닉".to_string()
    }
}

/// 오류 원인 체인까지 한 줄로 펼친다.
fn describe_error(error: StepError) -> String {
    format!("{:#}", anyhow::Error::new(error))
}

fn unperformed(text: &str, outcome: Outcome) -> StepReport {
    StepReport {
        text: text.to_string(),
        pattern: None,
        outcome,
        failure: None,
        elapsed: None,
    }
}

/// Step 목록의 `<이름>`을 모두 치환한다.
pub(super) fn substitute_all(steps: &[String], values: &BTreeMap<String, String>) -> Vec<String> {
    steps.iter().map(|step| substitute_named(step, values)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::engine::events::{EventCollector, ReportEvent, StoryListener};
    use crate::engine::failure::{FailureStrategy, PendingStepPolicy};
    use crate::steps::candidate::{step_fn, CandidateRegistry, StepDefinition};
    use crate::steps::hooks::{HookOutcome, LifecycleHook};
    use crate::steps::params::{ParameterConverters, INT};
    use crate::story::{Story, StoryCatalog};
    use crate::table::Table;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc::unbounded_channel;

    #[derive(Clone, Default)]
    struct Journal(Arc<Mutex<Vec<String>>>);

    impl Journal {
        fn note(&self, entry: impl Into<String>) {
            self.0.lock().expect("journal lock").push(entry.into());
        }

        fn entries(&self) -> Vec<String> {
            self.0.lock().expect("journal lock").clone()
        }
    }

    #[derive(Debug, Default)]
    struct Total(i64);

    fn registry(journal: &Journal) -> CandidateRegistry {
        let mut registry = CandidateRegistry::new();
        let j = journal.clone();
        registry
            .register(StepDefinition::given("step $name", step_fn(move |_, args| {
                j.note(args.get::<String>("name")?);
                Ok(())
            })))
            .expect("등록 실패");
        let j = journal.clone();
        registry
            .register(StepDefinition::when("it fails", step_fn(move |_, _| {
                j.note("fail");
                anyhow::bail!("의도한 실패")
            })))
            .expect("등록 실패");
        registry
            .register(StepDefinition::when("it panics", step_fn(|_, _| panic!("폭발"))))
            .expect("등록 실패");
        registry
            .register(StepDefinition::given("a total of $n", step_fn(|ctx, args| {
                ctx.insert_fixture(Total(args.get("n")?));
                Ok(())
            })).param("n", INT))
            .expect("등록 실패");
        registry
            .register(StepDefinition::when("I add $n", step_fn(|ctx, args| {
                ctx.require_fixture_mut::<Total>()?.0 += args.get::<i64>("n")?;
                Ok(())
            })).param("n", INT))
            .expect("등록 실패");
        registry
            .register(StepDefinition::then("the total is $n", step_fn(|ctx, args| {
                let expected: i64 = args.get("n")?;
                let actual = ctx.fixture::<Total>().map(|t| t.0).unwrap_or_default();
                anyhow::ensure!(actual == expected, "합계 {actual} != {expected}");
                Ok(())
            })).param("n", INT))
            .expect("등록 실패");
        let j = journal.clone();
        registry.register_hook(LifecycleHook::before_scenario("open", step_fn(move |_, _| {
            j.note("before");
            Ok(())
        })));
        let j = journal.clone();
        registry.register_hook(LifecycleHook::after_scenario("close", step_fn(move |_, _| {
            j.note("after");
            Ok(())
        })));
        let j = journal.clone();
        registry.register_hook(
            LifecycleHook::after_scenario("dump", step_fn(move |_, _| {
                j.note("dump");
                Ok(())
            }))
            .upon(HookOutcome::Failure),
        );
        registry
    }

    async fn run_single(
        journal: &Journal,
        scenario: Scenario,
        config: RunConfig,
    ) -> (Outcome, EventCollector) {
        run_with_registry(registry(journal), scenario, config).await
    }

    async fn run_with_registry(
        registry: CandidateRegistry,
        scenario: Scenario,
        config: RunConfig,
    ) -> (Outcome, EventCollector) {
        let story = Story::new("unit.story", vec![scenario]);
        let catalog = Arc::new(StoryCatalog::from_stories([story]));
        let runner = StoryRunner::new(
            Arc::new(registry),
            Arc::new(ParameterConverters::new()),
            catalog.clone(),
            config,
        )
        .expect("실행기 생성 실패");
        let (tx, mut rx) = unbounded_channel();
        let outcome = runner
            .run_story(catalog.get("unit.story").expect("story"), tx)
            .await;
        let collector = EventCollector::new();
        while let Ok(event) = rx.try_recv() {
            collector.on_event(&event);
        }
        (outcome, collector)
    }

    fn three_steps() -> Scenario {
        Scenario::new("three", ["Given step one", "When it fails", "Given step three"])
    }

    #[tokio::test]
    async fn fail_fast_skips_remaining_steps() {
        let journal = Journal::default();
        let (outcome, events) = run_single(&journal, three_steps(), RunConfig::default()).await;
        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(
            events.step_outcomes("unit.story"),
            vec![
                ("Given step one".to_string(), Outcome::Successful),
                ("When it fails".to_string(), Outcome::Failed),
                ("Given step three".to_string(), Outcome::Skipped),
            ]
        );
        assert_eq!(journal.entries(), vec!["before", "one", "fail", "after", "dump"]);
    }

    #[tokio::test]
    async fn collect_all_executes_every_step() {
        let journal = Journal::default();
        let config = RunConfig {
            failure_strategy: FailureStrategy::CollectAll,
            ..RunConfig::default()
        };
        let (outcome, events) = run_single(&journal, three_steps(), config).await;
        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(events.step_outcomes("unit.story")[2].1, Outcome::Successful);
        assert_eq!(journal.entries(), vec!["before", "one", "fail", "three", "after", "dump"]);
    }

    #[tokio::test]
    async fn unmatched_step_is_pending_and_does_not_halt() {
        let journal = Journal::default();
        let scenario = Scenario::new("pending", ["Given step one", "Given a chessboard", "Given step two"]);
        let (outcome, events) = run_single(&journal, scenario, RunConfig::default()).await;
        assert_eq!(outcome, Outcome::Pending);
        assert_eq!(events.step_outcomes("unit.story")[1].1, Outcome::Pending);
        assert_eq!(journal.entries(), vec!["before", "one", "two", "after"]);
    }

    #[tokio::test]
    async fn failing_pending_policy_halts_fail_fast() {
        let journal = Journal::default();
        let scenario = Scenario::new("pending", ["Given a chessboard", "Given step two"]);
        let config = RunConfig {
            pending_steps: PendingStepPolicy::Failing,
            ..RunConfig::default()
        };
        let (outcome, events) = run_single(&journal, scenario, config).await;
        assert_eq!(outcome, Outcome::Pending);
        assert_eq!(events.step_outcomes("unit.story")[1].1, Outcome::Skipped);
    }

    #[tokio::test]
    async fn panicking_action_becomes_failure() {
        let journal = Journal::default();
        let scenario = Scenario::new("panic", ["When it panics", "Given step after"]);
        let (outcome, events) = run_single(&journal, scenario, RunConfig::default()).await;
        assert_eq!(outcome, Outcome::Failed);
        let failure = events
            .events()
            .into_iter()
            .find_map(|event| match event {
                ReportEvent::StepOutcome { step, .. } if step.outcome == Outcome::Failed => step.failure,
                _ => None,
            })
            .expect("실패 사유 없음");
        assert!(failure.contains("폭발"));
    }

    #[tokio::test]
    async fn examples_run_once_per_row_with_substitution() {
        let journal = Journal::default();
        let table = Table::parse("|start|add|total|\n|1|2|3|\n|5|5|11|").expect("표 파싱 실패");
        let scenario = Scenario::new(
            "sums",
            ["Given a total of <start>", "When I add <add>", "Then the total is <total>"],
        )
        .with_examples(table);
        let (outcome, events) = run_single(&journal, scenario, RunConfig::default()).await;
        assert_eq!(outcome, Outcome::Failed);
        let all = events.events();
        let rows = all
            .iter()
            .filter(|event| matches!(event, ReportEvent::ExampleStarted { .. }))
            .count();
        assert_eq!(rows, 2);
        let scenario_pairs = all
            .iter()
            .filter(|event| matches!(event, ReportEvent::ScenarioStarted { .. }))
            .count();
        assert_eq!(scenario_pairs, 1);
        let outcomes = events.step_outcomes("unit.story");
        assert_eq!(outcomes[2], ("Then the total is 3".to_string(), Outcome::Successful));
        assert_eq!(outcomes[5], ("Then the total is 11".to_string(), Outcome::Failed));
        assert_eq!(journal.entries(), vec!["before", "after", "before", "after", "dump"]);
    }

    #[tokio::test]
    async fn and_steps_and_comments() {
        let journal = Journal::default();
        let scenario = Scenario::new(
            "and",
            ["Given step one", "And step two", "!-- Given step ignored", "And step three"],
        );
        let (outcome, events) = run_single(&journal, scenario, RunConfig::default()).await;
        assert_eq!(outcome, Outcome::Successful);
        assert_eq!(events.step_outcomes("unit.story")[2].1, Outcome::NotPerformed);
        assert_eq!(journal.entries(), vec!["before", "one", "two", "three", "after"]);
    }

    #[tokio::test]
    async fn dry_run_resolves_without_invoking() {
        let journal = Journal::default();
        let config = RunConfig {
            dry_run: true,
            ..RunConfig::default()
        };
        let scenario = Scenario::new("dry", ["Given step one", "When it fails", "Given a chessboard"]);
        let (outcome, events) = run_single(&journal, scenario, config).await;
        assert_eq!(outcome, Outcome::Pending);
        assert!(journal.entries().is_empty());
        let outcomes = events.step_outcomes("unit.story");
        assert_eq!(outcomes[0].1, Outcome::NotPerformed);
        assert_eq!(outcomes[1].1, Outcome::NotPerformed);
        assert_eq!(outcomes[2].1, Outcome::Pending);
    }

    #[tokio::test]
    async fn hook_failure_does_not_stop_later_hooks_of_same_phase() {
        let journal = Journal::default();
        let mut registry = registry(&journal);
        registry.register_hook(LifecycleHook::before_scenario("broken", step_fn(|_, _| {
            anyhow::bail!("준비 실패")
        })));
        let j = journal.clone();
        registry.register_hook(LifecycleHook::before_scenario("late open", step_fn(move |_, _| {
            j.note("late-before");
            Ok(())
        })));
        registry.register_hook(LifecycleHook::after_scenario("broken close", step_fn(|_, _| {
            anyhow::bail!("정리 실패")
        })));
        let j = journal.clone();
        registry.register_hook(LifecycleHook::after_scenario("late close", step_fn(move |_, _| {
            j.note("late-after");
            Ok(())
        })));
        let (outcome, events) = run_with_registry(
            registry,
            Scenario::new("hooks", ["Given step one"]),
            RunConfig::default(),
        )
        .await;
        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(events.step_outcomes("unit.story")[0].1, Outcome::Skipped);
        assert_eq!(
            journal.entries(),
            vec!["before", "late-before", "after", "dump", "late-after"]
        );
        let failed_hooks: Vec<(String, HookStage)> = events
            .events()
            .into_iter()
            .filter_map(|event| match event {
                ReportEvent::HookFailed { hook, stage, .. } => Some((hook, stage)),
                _ => None,
            })
            .collect();
        assert_eq!(
            failed_hooks,
            vec![
                ("broken".to_string(), HookStage::BeforeScenario),
                ("broken close".to_string(), HookStage::AfterScenario),
            ]
        );
    }

    #[tokio::test]
    async fn localized_story_runs_end_to_end() {
        let journal = Journal::default();
        let config = RunConfig {
            keywords: serde_yaml::from_str("given: 만약\nwhen: 이때\nthen: 그러면\nand: 그리고\n")
                .expect("키워드 파싱 실패"),
            ..RunConfig::default()
        };
        let scenario = Scenario::new(
            "현지화",
            ["만약 a total of 2", "그리고 step one", "이때 I add 3", "그러면 the total is 5"],
        );
        let (outcome, events) = run_single(&journal, scenario, config).await;
        assert_eq!(outcome, Outcome::Successful);
        assert!(events
            .step_outcomes("unit.story")
            .iter()
            .all(|(_, outcome)| *outcome == Outcome::Successful));
        assert_eq!(journal.entries(), vec!["before", "one", "after"]);
    }

    fn composite_registry(journal: &Journal) -> CandidateRegistry {
        let mut registry = registry(journal);
        let j = journal.clone();
        registry
            .register(
                StepDefinition::given("a counted start of $n", step_fn(move |_, _| {
                    j.note("composite");
                    Ok(())
                }))
                .composed_of(["Given a total of <n>", "When I add 1"]),
            )
            .expect("등록 실패");
        registry
            .register(
                StepDefinition::given("a fragile setup", step_fn(|_, _| Ok(())))
                    .composed_of(["Given step inner", "When it fails", "Given step never"]),
            )
            .expect("등록 실패");
        registry
            .register(StepDefinition::given("an endless setup", step_fn(|_, _| Ok(()))).composed_of(["Given an endless setup"]))
            .expect("등록 실패");
        registry
    }

    #[tokio::test]
    async fn composite_step_runs_its_sub_steps_in_place() {
        let journal = Journal::default();
        let scenario = Scenario::new("composite", ["Given a counted start of 4", "Then the total is 5"]);
        let (outcome, events) = run_with_registry(composite_registry(&journal), scenario, RunConfig::default()).await;
        assert_eq!(outcome, Outcome::Successful);
        assert_eq!(
            events.step_outcomes("unit.story"),
            vec![
                ("Given a counted start of 4".to_string(), Outcome::Successful),
                ("Given a total of 4".to_string(), Outcome::Successful),
                ("When I add 1".to_string(), Outcome::Successful),
                ("Then the total is 5".to_string(), Outcome::Successful),
            ]
        );
        assert_eq!(journal.entries(), vec!["before", "composite", "after"]);
    }

    #[tokio::test]
    async fn failure_inside_composite_halts_remaining_steps() {
        let journal = Journal::default();
        let scenario = Scenario::new("fragile", ["Given a fragile setup", "Given step outer"]);
        let (outcome, events) = run_with_registry(composite_registry(&journal), scenario, RunConfig::default()).await;
        assert_eq!(outcome, Outcome::Failed);
        let outcomes: Vec<Outcome> = events
            .step_outcomes("unit.story")
            .into_iter()
            .map(|(_, outcome)| outcome)
            .collect();
        assert_eq!(
            outcomes,
            vec![
                Outcome::Successful,
                Outcome::Successful,
                Outcome::Failed,
                Outcome::Skipped,
                Outcome::Skipped,
            ]
        );
        assert_eq!(journal.entries(), vec!["before", "inner", "fail", "after", "dump"]);
    }

    #[tokio::test]
    async fn self_referencing_composite_stops_at_depth_limit() {
        let journal = Journal::default();
        let scenario = Scenario::new("endless", ["Given an endless setup"]);
        let (outcome, events) = run_with_registry(composite_registry(&journal), scenario, RunConfig::default()).await;
        assert_eq!(outcome, Outcome::Failed);
        let outcomes = events.step_outcomes("unit.story");
        assert_eq!(outcomes.len(), MAX_COMPOSITE_DEPTH + 1);
        assert_eq!(outcomes.last().map(|(_, outcome)| *outcome), Some(Outcome::Failed));
        let failure = events
            .events()
            .into_iter()
            .find_map(|event| match event {
                ReportEvent::StepOutcome { step, .. } if step.outcome == Outcome::Failed => step.failure,
                _ => None,
            })
            .expect("실패 사유 없음");
        assert!(failure.contains("중첩"));
    }

    #[test]
    fn substitutes_every_step_of_a_list() {
        let row = BTreeMap::from([("width".to_string(), "5".to_string())]);
        assert_eq!(
            substitute_all(&["a <width> game".to_string(), "then <height>".to_string()], &row),
            vec!["a 5 game", "then <height>"]
        );
    }
}
