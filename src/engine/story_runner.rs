use crate::config::RunConfig;
use crate::engine::context::StepContext;
use crate::engine::events::{ReportEmitter, ReportEvent};
use crate::engine::filter::MetaFilter;
use crate::engine::state::Outcome;
use crate::error::StoryError;
use crate::steps::candidate::CandidateRegistry;
use crate::steps::hooks::HookStage;
use crate::steps::params::ParameterConverters;
use crate::steps::resolver::StepResolver;
use crate::engine::scenario_runner::substitute_all;
use crate::story::{GivenStoryRef, Story, StoryCatalog};
use crate::table::Table;
use futures::future::{BoxFuture, FutureExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

/// Story 실행기가 공유하는 불변 자원이다.
#[derive(Debug)]
pub(super) struct RunnerInner {
    pub(super) resolver: StepResolver,
    pub(super) catalog: Arc<StoryCatalog>,
    pub(super) config: RunConfig,
    pub(super) filter: MetaFilter,
}

/// Story 하나를 처음부터 끝까지 실행한다.
///
/// 복제 비용이 작아 Story 작업마다 복제해서 넘긴다.
#[derive(Debug, Clone)]
pub struct StoryRunner {
    pub(super) inner: Arc<RunnerInner>,
}

impl StoryRunner {
    /// 실행기를 생성한다.
    ///
    /// # 매개변수
    /// - `registry`: 등록이 끝난 Step 후보 등록소.
    /// - `converters`: 파라미터 변환기.
    /// - `catalog`: Given Story 참조를 해석할 Story 목록.
    /// - `config`: 실행 설정.
    ///
    /// # 반환값
    /// 설정이 잘못되었으면 오류를 반환한다.
    pub fn new(
        registry: Arc<CandidateRegistry>,
        converters: Arc<ParameterConverters>,
        catalog: Arc<StoryCatalog>,
        config: RunConfig,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let filter = config.parsed_meta_filter()?;
        let resolver = StepResolver::new(registry, converters, config.keywords.clone(), config.ranking);
        Ok(Self {
            inner: Arc::new(RunnerInner {
                resolver,
                catalog,
                config,
                filter,
            }),
        })
    }

    /// 실행 설정을 반환한다.
    pub fn config(&self) -> &RunConfig {
        &self.inner.config
    }

    /// Story를 실행하고 집계 결과를 반환한다.
    ///
    /// 메타 필터로 제외되면 `StoryExcluded` 하나만 보내고 SKIPPED를 반환한다.
    /// Given Story 그래프에 순환이나 누락이 있으면 Step을 실행하지 않고 FAILED를 반환한다.
    #[tracing::instrument(skip_all, fields(story = %story.id()))]
    pub async fn run_story(&self, story: Arc<Story>, sender: UnboundedSender<ReportEvent>) -> Outcome {
        let id = story.id();
        let emitter = ReportEmitter::new(id.clone(), sender);
        if !self.inner.filter.allows(&story.meta) {
            tracing::debug!(filter = self.inner.filter.as_str(), "메타 필터로 Story 제외");
            emitter.story_excluded(&id, false);
            return Outcome::Skipped;
        }
        if let Err(error) = self.inner.catalog.validate_given_stories(&story) {
            tracing::error!(error = %error, "Given Story 검증 실패");
            emitter.story_started(&id, false);
            emitter.story_failed(&id, error);
            emitter.story_finished(&id, false, Outcome::Failed);
            return Outcome::Failed;
        }

        let cancel = CancellationToken::new();
        let watchdog = self.inner.config.failure_strategy.story_timeout().map(|timeout| {
            let token = cancel.clone();
            let story_id = id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                tracing::warn!(story = story_id.as_str(), ?timeout, "Story 제한 시간 초과, 남은 Step을 취소합니다");
                token.cancel();
            })
        });
        let mut ctx = StepContext::new(id, cancel);
        let outcome = self.perform_story(&story, &mut ctx, &emitter, None).await;
        if let Some(handle) = watchdog {
            handle.abort();
        }
        tracing::info!(%outcome, "Story 실행 완료");
        outcome
    }

    /// Story 본문을 실행한다. Given Story도 같은 경로로 실행된다.
    ///
    /// Given Story로 실행될 때도 Story 메타 필터와 Scenario 메타 필터를 똑같이 적용하며,
    /// 참조의 Meta 앵커에 맞지 않는 Scenario는 보고 없이 건너뛴다.
    pub(super) fn perform_story<'a>(
        &'a self,
        story: &'a Story,
        ctx: &'a mut StepContext,
        emitter: &'a ReportEmitter,
        invocation: Option<&'a GivenInvocation>,
    ) -> BoxFuture<'a, Outcome> {
        async move {
            let path = story.id();
            let config = &self.inner.config;
            let given = invocation.is_some();
            if given && !self.inner.filter.allows(&story.meta) {
                tracing::debug!(story = path.as_str(), filter = self.inner.filter.as_str(), "메타 필터로 Given Story 제외");
                emitter.story_excluded(&path, true);
                return Outcome::Skipped;
            }
            let no_parameters = BTreeMap::new();
            let parameters = invocation.map_or(&no_parameters, |invocation| &invocation.parameters);
            emitter.story_started(&path, given);

            let given_outcome = self.perform_given_stories(&story.given_stories, None, ctx, emitter).await;
            let mut outcome = given_outcome;
            if given_outcome == Outcome::Failed && config.skip_story_if_given_story_failed {
                tracing::warn!(story = path.as_str(), "Given Story 실패로 Story 본문을 건너뜁니다");
            } else {
                if !given {
                    outcome = outcome.worst(self.run_hooks(HookStage::BeforeStory, outcome, ctx, emitter).await);
                }
                let before_steps = substitute_all(&story.before_steps, parameters);
                outcome = outcome.worst(self.perform_steps(&before_steps, ctx, emitter).await);
                for scenario in &story.scenarios {
                    if invocation.is_some_and(|invocation| !invocation.reference.selects(scenario)) {
                        continue;
                    }
                    let meta = scenario.meta.inherit_from(&story.meta);
                    if !self.inner.filter.allows(&meta) {
                        tracing::debug!(story = path.as_str(), title = scenario.title.as_str(), "메타 필터로 Scenario 제외");
                        outcome = outcome.worst(Outcome::Skipped);
                        continue;
                    }
                    outcome = outcome.worst(self.perform_scenario(scenario, ctx, emitter, given, parameters).await);
                }
                let after_steps = substitute_all(&story.after_steps, parameters);
                outcome = outcome.worst(self.perform_steps(&after_steps, ctx, emitter).await);
            }
            if !given {
                outcome = outcome.worst(self.run_hooks(HookStage::AfterStory, outcome, ctx, emitter).await);
            }
            emitter.story_finished(&path, given, outcome);
            outcome
        }
        .boxed()
    }

    /// Given Story 목록을 순서대로 실행하고 집계 결과를 반환한다.
    ///
    /// `examples`는 행 앵커(`경로#N`)가 가리킬 표이며 Scenario 수준 참조에서만 넘어온다.
    pub(super) async fn perform_given_stories(
        &self,
        references: &[String],
        examples: Option<&Table>,
        ctx: &mut StepContext,
        emitter: &ReportEmitter,
    ) -> Outcome {
        let mut outcome = Outcome::NotPerformed;
        for raw in references {
            let reference = GivenStoryRef::parse(raw);
            match self.inner.catalog.get(&reference.path) {
                Some(given) => {
                    let invocation = GivenInvocation {
                        parameters: reference.parameters(examples),
                        reference,
                    };
                    outcome = outcome.worst(self.perform_story(&given, ctx, emitter, Some(&invocation)).await);
                }
                None => {
                    let error = StoryError::MissingGivenStory {
                        parent: emitter.story().to_string(),
                        missing: reference.id(),
                    };
                    emitter.story_failed(raw, error);
                    outcome = Outcome::Failed;
                }
            }
        }
        outcome
    }
}

/// Given Story 한 번의 호출 정보.
#[derive(Debug)]
pub(super) struct GivenInvocation {
    reference: GivenStoryRef,
    parameters: BTreeMap<String, String>,
}
