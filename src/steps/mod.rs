//! Step 문구를 등록된 액션에 연결하는 계층이다.
//!
//! - `pattern`: `$이름` 패턴 컴파일
//! - `params`: 타입 태그별 파라미터 변환
//! - `candidate`: Step 후보 등록소와 제공자 계약
//! - `keywords`: 시작 키워드 인식
//! - `hooks`: 코드 생명주기 훅
//! - `resolver`: 문구를 후보 하나에 바인딩

pub mod candidate;
pub mod hooks;
pub mod keywords;
pub mod params;
pub mod pattern;
pub mod resolver;

pub use candidate::{
    step_fn, CandidateRegistry, SharedAction, StepAction, StepCandidate, StepDefinition,
    StepProvider,
};
pub use hooks::{HookOutcome, HookStage, LifecycleHook};
pub use keywords::Keywords;
pub use params::{EnumConverter, ParamValue, ParameterConverter, ParameterConverters, StepArgs};
pub use pattern::StepPattern;
pub use resolver::{RankingOrder, Resolution, ResolvedStep, StepResolver};
