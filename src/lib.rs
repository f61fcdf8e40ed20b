//! 행위 주도 테스트용 Story 실행 엔진.
//!
//! 자유 문장 Step(`Given a 5 by 6 game`)을 등록된 액션 호출로 바꾸고,
//! Story → Scenario → Step 순서로 실행하며 결과를 리스너에 보고한다.

pub mod config;
pub mod engine;
pub mod error;
pub mod steps;
pub mod story;
pub mod table;

pub use config::{load_run_config_from_file, RunConfig};
pub use engine::{run_stories, Outcome, RunSummary, StepContext, StoryRunner};
pub use error::{CompileError, StepError, StoryError};
pub use steps::{
    step_fn, CandidateRegistry, LifecycleHook, ParameterConverters, StepArgs, StepDefinition,
    StepProvider,
};
pub use story::{load_story_from_file, Scenario, Story, StoryCatalog};
pub use table::Table;
