use crate::engine::failure::{FailureStrategy, PendingStepPolicy};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::time::{Duration, Instant};

/// Step, Scenario, Story의 실행 결과이다.
///
/// 집계 시에는 심각도가 가장 높은 값이 이긴다.
/// 심각도: NOT_PERFORMED < SUCCESSFUL < SKIPPED < CANCELLED < PENDING < FAILED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    NotPerformed,
    Successful,
    Skipped,
    Cancelled,
    Pending,
    Failed,
}

impl Outcome {
    fn severity(self) -> u8 {
        match self {
            Outcome::NotPerformed => 0,
            Outcome::Successful => 1,
            Outcome::Skipped => 2,
            Outcome::Cancelled => 3,
            Outcome::Pending => 4,
            Outcome::Failed => 5,
        }
    }

    /// 두 결과 중 더 심각한 값을 반환한다.
    pub fn worst(self, other: Outcome) -> Outcome {
        self.max(other)
    }

    /// 결과 목록을 집계한다. 비어 있으면 NOT_PERFORMED이다.
    pub fn aggregate<I>(outcomes: I) -> Outcome
    where
        I: IntoIterator<Item = Outcome>,
    {
        outcomes
            .into_iter()
            .fold(Outcome::NotPerformed, Outcome::worst)
    }
}

impl Ord for Outcome {
    fn cmp(&self, other: &Self) -> Ordering {
        self.severity().cmp(&other.severity())
    }
}

impl PartialOrd for Outcome {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Outcome::NotPerformed => "NOT_PERFORMED",
            Outcome::Successful => "SUCCESSFUL",
            Outcome::Skipped => "SKIPPED",
            Outcome::Cancelled => "CANCELLED",
            Outcome::Pending => "PENDING",
            Outcome::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

/// 다음 Step을 어떻게 처리할지에 대한 결정이다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// 해석 후 실행한다.
    Perform,
    /// 실행하지 않고 SKIPPED로 기록한다.
    Skip,
    /// 실행하지 않고 CANCELLED로 기록한다.
    Cancel,
}

/// Scenario(또는 Examples 한 행) 실행 중 상태 전이를 관리한다.
///
/// 전이 규칙:
/// - 취소된 이후에는 모든 Step이 CANCELLED가 된다.
/// - 중단 조건을 만족한 이후에는 모든 Step이 SKIPPED가 된다.
/// - 결과는 기록된 값 중 가장 심각한 값이다.
#[derive(Debug, Clone)]
pub struct ScenarioRuntime {
    strategy: FailureStrategy,
    pending: PendingStepPolicy,
    halted: bool,
    cancelled: bool,
    outcome: Outcome,
}

impl ScenarioRuntime {
    /// 초기 상태를 생성한다.
    pub fn new(strategy: FailureStrategy, pending: PendingStepPolicy) -> Self {
        Self {
            strategy,
            pending,
            halted: false,
            cancelled: false,
            outcome: Outcome::NotPerformed,
        }
    }

    /// 다음 Step의 처리 방법을 결정한다.
    ///
    /// # 매개변수
    /// - `cancel_requested`: Story 취소 토큰 상태.
    pub fn next_disposition(&mut self, cancel_requested: bool) -> Disposition {
        if cancel_requested {
            self.cancelled = true;
        }
        if self.cancelled {
            Disposition::Cancel
        } else if self.halted {
            Disposition::Skip
        } else {
            Disposition::Perform
        }
    }

    /// Step, 훅, Given Story 결과를 집계에 반영하고 중단 여부를 갱신한다.
    pub fn absorb(&mut self, outcome: Outcome) {
        self.outcome = self.outcome.worst(outcome);
        if outcome == Outcome::Cancelled {
            self.cancelled = true;
        }
        if self.strategy.halts_after(outcome, self.pending) {
            self.halted = true;
        }
    }

    /// 남은 Step을 명시적으로 건너뛰게 한다.
    pub fn halt(&mut self) {
        self.halted = true;
    }

    /// 현재까지의 집계 결과.
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// 취소가 관찰되었는지 여부.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Step 실행 시간을 재기 위한 도우미이다.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StepTimer(Instant);

impl StepTimer {
    pub(crate) fn start() -> Self {
        Self(Instant::now())
    }

    pub(crate) fn elapsed(self) -> Duration {
        self.0.elapsed()
    }
}
