use super::story_runner::StoryRunner;
use crate::config::RunConfig;
use crate::engine::events::{pump_events, SharedListener};
use crate::engine::failure::PendingStepPolicy;
use crate::engine::state::Outcome;
use crate::story::Story;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Story 하나의 최종 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryResult {
    pub path: String,
    pub outcome: Outcome,
}

/// 전체 실행 결과 요약이다. 입력 순서를 유지한다.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub results: Vec<StoryResult>,
}

impl RunSummary {
    /// 전체 집계 결과.
    pub fn outcome(&self) -> Outcome {
        Outcome::aggregate(self.results.iter().map(|result| result.outcome))
    }

    /// 지정한 결과를 가진 Story 수.
    pub fn count(&self, outcome: Outcome) -> usize {
        self.results
            .iter()
            .filter(|result| result.outcome == outcome)
            .count()
    }

    /// 프로세스 종료 코드를 결정한다.
    ///
    /// FAILED나 CANCELLED가 있으면 1이다. PENDING은 보류 정책이 `failing`일 때,
    /// SKIPPED는 `fail_on_skipped`일 때만 1로 본다.
    pub fn exit_code(&self, config: &RunConfig) -> i32 {
        let failing = self.results.iter().any(|result| match result.outcome {
            Outcome::Failed | Outcome::Cancelled => true,
            Outcome::Pending => config.pending_steps == PendingStepPolicy::Failing,
            Outcome::Skipped => config.fail_on_skipped,
            Outcome::NotPerformed | Outcome::Successful => false,
        });
        i32::from(failing)
    }
}

/// Story 목록을 최대 `parallelism`개씩 동시에 실행한다.
///
/// 각 Story는 별도 작업에서 실행되며 보고 이벤트는 하나의 채널로 모여 리스너에 전달된다.
/// 모든 Story가 끝나고 이벤트 전달이 마무리된 뒤 반환한다.
pub async fn run_stories(
    runner: &StoryRunner,
    stories: Vec<Arc<Story>>,
    listeners: Vec<SharedListener>,
) -> RunSummary {
    let (sender, receiver) = mpsc::unbounded_channel();
    let pump = tokio::spawn(pump_events(receiver, listeners));
    let parallelism = runner.config().parallelism.max(1);
    tracing::info!(stories = stories.len(), parallelism, "Story 실행 시작");

    let mut results: Vec<(usize, StoryResult)> = stream::iter(stories.into_iter().enumerate())
        .map(|(index, story)| {
            let runner = runner.clone();
            let sender = sender.clone();
            async move {
                let path = story.id();
                let handle = tokio::spawn(async move { runner.run_story(story, sender).await });
                let outcome = match handle.await {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        tracing::error!(story = path.as_str(), error = %err, "Story 작업이 비정상 종료되었습니다");
                        Outcome::Failed
                    }
                };
                (index, StoryResult { path, outcome })
            }
        })
        .buffer_unordered(parallelism)
        .collect()
        .await;
    drop(sender);
    if let Err(err) = pump.await {
        tracing::error!(error = %err, "보고 이벤트 전달 작업 실패");
    }

    results.sort_by_key(|(index, _)| *index);
    let summary = RunSummary {
        results: results.into_iter().map(|(_, result)| result).collect(),
    };
    tracing::info!(
        outcome = %summary.outcome(),
        failed = summary.count(Outcome::Failed),
        pending = summary.count(Outcome::Pending),
        "Story 실행 종료"
    );
    summary
}
