use crate::engine::failure::{FailureStrategy, PendingStepPolicy};
use crate::engine::filter::MetaFilter;
use crate::steps::keywords::Keywords;
use crate::steps::resolver::RankingOrder;
use anyhow::Context;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// 메타 필터를 덮어쓰는 환경 변수 이름.
pub const META_FILTER_ENV: &str = "BEHAVE_META_FILTER";
/// 동시 실행 Story 수를 덮어쓰는 환경 변수 이름.
pub const PARALLELISM_ENV: &str = "BEHAVE_PARALLELISM";

/// 실행 설정이다. YAML에서 빠진 항목은 기본값을 사용한다.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Step 실패 이후 진행 전략.
    pub failure_strategy: FailureStrategy,
    /// 일치 후보가 없는 Step 처리 정책.
    pub pending_steps: PendingStepPolicy,
    /// `+이름 값 -이름` 형식의 메타 필터.
    pub meta_filter: String,
    /// 동시에 실행할 Story 수.
    pub parallelism: usize,
    /// 후보 순위 비교 순서.
    pub ranking: RankingOrder,
    /// true면 Step을 해석만 하고 실행하지 않는다.
    pub dry_run: bool,
    /// true면 SKIPPED 결과도 실패 종료 코드로 본다.
    pub fail_on_skipped: bool,
    /// Given Story가 실패하면 포함한 Story/Scenario의 Step을 건너뛴다.
    pub skip_story_if_given_story_failed: bool,
    /// Given Story 안에서는 Scenario 전후 훅을 실행하지 않는다.
    pub skip_before_and_after_scenario_hooks_in_given_stories: bool,
    /// Step 시작 키워드.
    pub keywords: Keywords,
    /// 실행할 Story 파일 glob 패턴 목록.
    pub story_paths: Vec<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            failure_strategy: FailureStrategy::default(),
            pending_steps: PendingStepPolicy::default(),
            meta_filter: String::new(),
            parallelism: 1,
            ranking: RankingOrder::default(),
            dry_run: false,
            fail_on_skipped: false,
            skip_story_if_given_story_failed: false,
            skip_before_and_after_scenario_hooks_in_given_stories: false,
            keywords: Keywords::default(),
            story_paths: vec!["stories/**/*.yaml".to_string()],
        }
    }
}

impl RunConfig {
    /// 환경 변수 값으로 일부 항목을 덮어쓴다.
    pub fn with_env_overrides(self) -> anyhow::Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// 조회 함수가 돌려주는 값으로 일부 항목을 덮어쓴다.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(filter) = lookup(META_FILTER_ENV) {
            self.meta_filter = filter;
        }
        if let Some(value) = lookup(PARALLELISM_ENV) {
            self.parallelism = value
                .trim()
                .parse()
                .with_context(|| format!("{PARALLELISM_ENV} 값이 숫자가 아닙니다: {value}"))?;
        }
        Ok(self)
    }

    /// 메타 필터를 파싱한다.
    pub fn parsed_meta_filter(&self) -> anyhow::Result<MetaFilter> {
        MetaFilter::parse(&self.meta_filter)
            .with_context(|| format!("메타 필터를 해석할 수 없습니다: {}", self.meta_filter))
    }

    /// 실행 전에 설정 값을 검증한다.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.parallelism == 0 {
            anyhow::bail!("parallelism은 1 이상이어야 합니다.");
        }
        self.parsed_meta_filter()?;
        Ok(())
    }
}

/// YAML 파일에서 실행 설정을 로드한다.
pub fn load_run_config_from_file(path: &Path) -> anyhow::Result<RunConfig> {
    let mut file = File::open(path)
        .with_context(|| format!("실행 설정 파일을 열 수 없습니다: {}", path.display()))?;
    load_run_config_from_reader(&mut file)
        .with_context(|| format!("실행 설정 파일을 해석할 수 없습니다: {}", path.display()))
}

/// Reader에서 실행 설정을 로드한다.
pub fn load_run_config_from_reader<R: Read>(reader: &mut R) -> anyhow::Result<RunConfig> {
    let mut buf = String::new();
    reader
        .read_to_string(&mut buf)
        .context("실행 설정 읽기 실패")?;
    if buf.trim().is_empty() {
        return Ok(RunConfig::default());
    }
    let config: RunConfig = serde_yaml::from_str(&buf).context("실행 설정 YAML 파싱 실패")?;
    config.validate()?;
    Ok(config)
}
