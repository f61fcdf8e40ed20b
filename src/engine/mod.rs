pub mod batch;
pub mod context;
pub mod events;
pub mod failure;
pub mod filter;
mod scenario_runner;
pub mod state;
mod story_runner;

pub use batch::{run_stories, RunSummary, StoryResult};
pub use context::StepContext;
pub use events::{
    pump_events, EventCollector, ReportEmitter, ReportEvent, SharedListener, StepReport,
    StoryListener, TracingListener,
};
pub use failure::{FailureStrategy, PendingStepPolicy};
pub use filter::MetaFilter;
pub use state::{Disposition, Outcome, ScenarioRuntime};
pub use story_runner::StoryRunner;
