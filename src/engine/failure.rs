use crate::engine::state::Outcome;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use std::time::Duration;

/// 시간 초과 전략의 기본 제한 시간(초).
const DEFAULT_STORY_TIMEOUT_SECS: u64 = 300;

/// Step 실패 이후 실행을 어떻게 이어갈지 정하는 전략이다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureStrategy {
    /// 첫 실패 이후 같은 Scenario의 남은 Step을 건너뛴다.
    #[default]
    FailFast,
    /// 실패와 무관하게 모든 Step을 실행한다.
    CollectAll,
    /// Story 제한 시간이 지나면 시작 전 Step을 모두 취소한다.
    CancelOnTimeout {
        /// Story 제한 시간.
        timeout: Duration,
        /// 제한 시간 전에는 CollectAll처럼 동작할지 여부.
        collect_all: bool,
    },
}

impl FailureStrategy {
    /// 이 결과 이후 남은 Step을 건너뛰어야 하는지 판단한다.
    pub fn halts_after(self, outcome: Outcome, pending: PendingStepPolicy) -> bool {
        let failing = outcome == Outcome::Failed
            || (outcome == Outcome::Pending && pending == PendingStepPolicy::Failing);
        match self {
            FailureStrategy::FailFast => failing,
            FailureStrategy::CollectAll => false,
            FailureStrategy::CancelOnTimeout { collect_all, .. } => failing && !collect_all,
        }
    }

    /// Story 제한 시간을 반환한다.
    pub fn story_timeout(self) -> Option<Duration> {
        match self {
            FailureStrategy::CancelOnTimeout { timeout, .. } => Some(timeout),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for FailureStrategy {
    /// 문자열 또는 구조체 형태의 설정을 모두 지원하도록 역직렬화한다.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Helper {
            Simple(String),
            Detailed {
                #[serde(rename = "type")]
                strategy_type: String,
                timeout_secs: Option<u64>,
                timeout_ms: Option<u64>,
                #[serde(default)]
                collect_all: bool,
            },
        }

        let (strategy_type, timeout, collect_all) = match Helper::deserialize(deserializer)? {
            Helper::Simple(value) => (value, None, false),
            Helper::Detailed {
                strategy_type,
                timeout_secs,
                timeout_ms,
                collect_all,
            } => (
                strategy_type,
                timeout_ms
                    .map(Duration::from_millis)
                    .or(timeout_secs.map(Duration::from_secs)),
                collect_all,
            ),
        };
        match strategy_type.as_str() {
            "fail_fast" => Ok(FailureStrategy::FailFast),
            "collect_all" => Ok(FailureStrategy::CollectAll),
            "cancel_on_timeout" => Ok(FailureStrategy::CancelOnTimeout {
                timeout: timeout.unwrap_or(Duration::from_secs(DEFAULT_STORY_TIMEOUT_SECS)),
                collect_all,
            }),
            other => Err(de::Error::custom(format!(
                "알 수 없는 failure strategy: {other}"
            ))),
        }
    }
}

/// 일치하는 후보가 없는 Step을 어떻게 취급할지 정한다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingStepPolicy {
    /// PENDING은 실패로 보지 않는다.
    #[default]
    Passing,
    /// PENDING을 실패처럼 취급해 FailFast를 멈추고 종료 코드에 반영한다.
    Failing,
}
