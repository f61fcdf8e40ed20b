mod gameoflife;

use anyhow::Context;
use clap::Parser;
use rust_behave::engine::{SharedListener, TracingListener};
use rust_behave::story::load_story_from_file;
use rust_behave::{
    load_run_config_from_file, run_stories, CandidateRegistry, ParameterConverters, RunConfig,
    Story, StoryCatalog, StoryRunner,
};
use std::path::PathBuf;
use std::sync::Arc;

/// BDD Story 실행기.
#[derive(Debug, Parser)]
#[command(name = "rust-behave")]
#[command(about = "YAML Story를 찾아 Step을 실행합니다", long_about = None)]
struct Cli {
    /// 실행 설정 파일(run.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Story 파일 glob 패턴. 지정하면 설정의 story_paths를 대신한다.
    patterns: Vec<String>,
}

/// glob 패턴에 맞는 Story 파일을 읽는다. 같은 파일은 한 번만 읽는다.
fn discover_stories(patterns: &[String]) -> anyhow::Result<Vec<Story>> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for pattern in patterns {
        for entry in glob::glob(pattern).with_context(|| format!("glob 패턴 파싱 실패: {pattern}"))? {
            let path = entry.context("Story 경로 확인 실패")?;
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }
    paths.sort();
    paths.iter().map(|path| load_story_from_file(path)).collect()
}

/// 데모 Step을 등록하고 Story를 실행한 뒤 결과에 맞는 종료 코드로 끝낸다.
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Cli::parse();
    let config = match &args.config {
        Some(path) => load_run_config_from_file(path)?,
        None => RunConfig::default(),
    };
    let mut config = config.with_env_overrides()?;
    if !args.patterns.is_empty() {
        config.story_paths = args.patterns.clone();
    }

    let stories = discover_stories(&config.story_paths)?;
    if stories.is_empty() {
        tracing::warn!(patterns = ?config.story_paths, "실행할 Story가 없습니다");
    }
    let mut registry = CandidateRegistry::new();
    registry
        .register_provider(&gameoflife::GameSteps)
        .context("Step 정의 등록 실패")?;
    let mut catalog = StoryCatalog::new();
    let roots: Vec<Arc<Story>> = stories.into_iter().map(|story| catalog.insert(story)).collect();

    let runner = StoryRunner::new(
        Arc::new(registry),
        Arc::new(ParameterConverters::new()),
        Arc::new(catalog),
        config.clone(),
    )?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("tokio 런타임 생성 실패")?;
    let listeners: Vec<SharedListener> = vec![Arc::new(TracingListener)];
    let summary = runtime.block_on(run_stories(&runner, roots, listeners));

    for result in &summary.results {
        println!("{:<48} {}", result.path, result.outcome);
    }
    std::process::exit(summary.exit_code(&config));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_config_flag_and_patterns() {
        let args = Cli::try_parse_from(["rust-behave", "--config", "run.yaml", "stories/*.yaml"])
            .expect("인자 파싱 실패");
        assert_eq!(args.config, Some(PathBuf::from("run.yaml")));
        assert_eq!(args.patterns, vec!["stories/*.yaml"]);
        assert!(Cli::try_parse_from(["rust-behave", "--config"]).is_err());

        let bare = Cli::try_parse_from(["rust-behave"]).expect("인자 파싱 실패");
        assert!(bare.config.is_none());
        assert!(bare.patterns.is_empty());
    }
}
