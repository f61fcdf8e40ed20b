//! Step 문구를 등록된 후보 하나에 바인딩한다.

use crate::error::StepError;
use crate::steps::candidate::{CandidateRegistry, SharedAction, StepCandidate};
use crate::steps::keywords::{Keywords, StepLine};
use crate::steps::params::{substitute_named, ParameterConverters, StepArgs, STRING};
use serde::Deserialize;
use std::cmp::{Ordering, Reverse};
use std::collections::BTreeMap;
use std::sync::Arc;

/// 구체성과 명시적 우선순위 중 무엇을 먼저 비교할지 정한다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingOrder {
    /// 구체성이 같을 때만 우선순위를 비교한다.
    #[default]
    SpecificityFirst,
    /// 우선순위가 같을 때만 구체성을 비교한다.
    PriorityFirst,
}

/// 후보의 순위 점수이다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Score {
    literal_len: usize,
    placeholders: Reverse<usize>,
    priority: i32,
}

impl Score {
    fn of(candidate: &StepCandidate) -> Self {
        Self {
            literal_len: candidate.pattern().literal_len(),
            placeholders: Reverse(candidate.pattern().placeholder_count()),
            priority: candidate.priority(),
        }
    }

    fn compare(&self, other: &Self, order: RankingOrder) -> Ordering {
        let specificity = (self.literal_len, self.placeholders).cmp(&(other.literal_len, other.placeholders));
        let priority = self.priority.cmp(&other.priority);
        match order {
            RankingOrder::SpecificityFirst => specificity.then(priority),
            RankingOrder::PriorityFirst => priority.then(specificity),
        }
    }
}

/// 후보에 바인딩된 Step이다.
#[derive(Debug, Clone)]
pub struct ResolvedStep {
    text: String,
    candidate: Arc<StepCandidate>,
    args: StepArgs,
    /// 변환 전 캡처 원문.
    captured: BTreeMap<String, String>,
}

impl ResolvedStep {
    /// 원문 Step 문구.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// 일치한 후보.
    pub fn candidate(&self) -> &Arc<StepCandidate> {
        &self.candidate
    }

    /// 변환된 파라미터.
    pub fn args(&self) -> &StepArgs {
        &self.args
    }

    /// 실행할 액션.
    pub fn action(&self) -> &SharedAction {
        self.candidate.action()
    }

    /// Composite Step이면 캡처 원문을 채운 하위 Step 문구를 반환한다.
    pub fn composed_steps(&self) -> Vec<String> {
        self.candidate
            .composed_steps()
            .iter()
            .map(|step| substitute_named(step, &self.captured))
            .collect()
    }
}

/// 해석 결과이다.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// 후보 하나에 바인딩되었다.
    Bound(ResolvedStep),
    /// 일치하는 후보가 없다.
    Pending { text: String },
    /// 무시 표식이 붙은 줄이다.
    Comment { text: String },
}

/// Step 문구를 후보에 바인딩하는 해석기이다.
///
/// 등록소와 변환기를 공유 참조로 들고 있으므로 여러 Story 작업자가 복제해 써도 된다.
#[derive(Debug, Clone)]
pub struct StepResolver {
    registry: Arc<CandidateRegistry>,
    converters: Arc<ParameterConverters>,
    keywords: Arc<Keywords>,
    ranking: RankingOrder,
}

impl StepResolver {
    /// 해석기를 생성한다.
    pub fn new(
        registry: Arc<CandidateRegistry>,
        converters: Arc<ParameterConverters>,
        keywords: Keywords,
        ranking: RankingOrder,
    ) -> Self {
        Self {
            registry,
            converters,
            keywords: Arc::new(keywords),
            ranking,
        }
    }

    /// 사용 중인 키워드 집합.
    pub fn keywords(&self) -> &Keywords {
        &self.keywords
    }

    /// 사용 중인 등록소.
    pub fn registry(&self) -> &Arc<CandidateRegistry> {
        &self.registry
    }

    /// Step 문구 하나를 해석한다.
    ///
    /// # 매개변수
    /// - `line`: 키워드를 포함한 Step 문구.
    /// - `previous`: 같은 Scenario에서 직전에 쓰인 `And`가 아닌 키워드.
    ///
    /// # 반환값
    /// 일치 후보가 없으면 [`Resolution::Pending`]을 반환하며 오류로 보지 않는다.
    /// 최고 점수 후보가 둘 이상이거나 파라미터 변환에 실패하면 [`StepError`]를 반환한다.
    pub fn resolve(&self, line: &str, previous: Option<&str>) -> Result<Resolution, StepError> {
        let (keyword, body) = match self.keywords.split(line, previous) {
            StepLine::Comment(text) => {
                return Ok(Resolution::Comment {
                    text: text.to_string(),
                });
            }
            StepLine::Unknown(text) => {
                return Ok(Resolution::Pending {
                    text: text.to_string(),
                });
            }
            StepLine::Step { keyword, body, .. } => (keyword, body),
        };

        let matching: Vec<(&Arc<StepCandidate>, Score)> = self
            .registry
            .all_candidates()
            .iter()
            .filter(|candidate| candidate.keyword() == keyword && candidate.pattern().is_match(body))
            .map(|candidate| (candidate, Score::of(candidate)))
            .collect();

        let Some(best) = matching
            .iter()
            .map(|(_, score)| *score)
            .max_by(|a, b| a.compare(b, self.ranking))
        else {
            tracing::debug!(step = line, "일치하는 Step 후보 없음");
            return Ok(Resolution::Pending {
                text: line.trim().to_string(),
            });
        };

        let top: Vec<&Arc<StepCandidate>> = matching
            .iter()
            .filter(|(_, score)| score.compare(&best, self.ranking) == Ordering::Equal)
            .map(|(candidate, _)| *candidate)
            .collect();
        if top.len() > 1 {
            return Err(StepError::AmbiguousMatch {
                step: line.trim().to_string(),
                candidates: top.iter().map(|candidate| candidate.describe()).collect(),
            });
        }
        let candidate = top[0].clone();
        let (args, captured) = self.bind(&candidate, body)?;
        Ok(Resolution::Bound(ResolvedStep {
            text: line.trim().to_string(),
            candidate,
            args,
            captured,
        }))
    }

    fn bind(
        &self,
        candidate: &StepCandidate,
        body: &str,
    ) -> Result<(StepArgs, BTreeMap<String, String>), StepError> {
        let captures = candidate.pattern().captures(body).unwrap_or_default();
        let mut args = StepArgs::new();
        let mut captured = BTreeMap::new();
        for (name, raw) in candidate.pattern().parameter_names().iter().zip(captures) {
            let raw = raw.trim();
            let type_tag = candidate.param_type(name).unwrap_or(STRING);
            let value = self.converters.convert(type_tag, raw)?;
            args.push(name.clone(), value);
            captured.insert(name.clone(), raw.to_string());
        }
        Ok((args, captured))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::candidate::{step_fn, StepDefinition};
    use crate::steps::params::INT;

    fn resolver_with(definitions: Vec<StepDefinition>, ranking: RankingOrder) -> StepResolver {
        let mut registry = CandidateRegistry::new();
        for definition in definitions {
            registry.register(definition).expect("등록 실패");
        }
        StepResolver::new(
            Arc::new(registry),
            Arc::new(ParameterConverters::new()),
            Keywords::default(),
            ranking,
        )
    }

    fn noop() -> SharedAction {
        step_fn(|_, _| Ok(()))
    }

    fn bound(resolution: Resolution) -> ResolvedStep {
        match resolution {
            Resolution::Bound(step) => step,
            other => panic!("바인딩되지 않음: {other:?}"),
        }
    }

    #[test]
    fn binds_typed_parameters() {
        let resolver = resolver_with(
            vec![StepDefinition::given("a $width by $height game", noop())
                .param("width", INT)
                .param("height", INT)],
            RankingOrder::default(),
        );
        let step = bound(resolver.resolve("Given a 5 by 6 game", None).expect("해석 실패"));
        assert_eq!(step.args().get::<i64>("width").expect("width"), 5);
        assert_eq!(step.args().get::<i64>("height").expect("height"), 6);
        assert_eq!(step.text(), "Given a 5 by 6 game");
    }

    #[test]
    fn alias_and_main_pattern_match_their_own_text() {
        let resolver = resolver_with(
            vec![StepDefinition::then("the grid should be $grid", noop())
                .alias("the grid should look like $grid")],
            RankingOrder::default(),
        );
        let main = bound(resolver.resolve("Then the grid should be ..X", None).expect("해석 실패"));
        assert_eq!(main.candidate().pattern().as_str(), "the grid should be $grid");
        assert_eq!(main.args().get::<String>("grid").expect("grid"), "..X");

        let alias = bound(
            resolver
                .resolve("Then the grid should look like\n...\n.X.", None)
                .expect("해석 실패"),
        );
        assert_eq!(alias.candidate().pattern().as_str(), "the grid should look like $grid");
        assert_eq!(alias.args().get::<String>("grid").expect("grid"), "...\n.X.");
    }

    #[test]
    fn unmatched_step_is_pending_not_error() {
        let resolver = resolver_with(vec![StepDefinition::given("a game", noop())], RankingOrder::default());
        assert!(matches!(
            resolver.resolve("Given a chessboard", None),
            Ok(Resolution::Pending { .. })
        ));
        assert!(matches!(
            resolver.resolve("When a game", None),
            Ok(Resolution::Pending { .. })
        ));
        assert!(matches!(
            resolver.resolve("Something else", None),
            Ok(Resolution::Pending { .. })
        ));
    }

    #[test]
    fn more_literal_text_wins() {
        let resolver = resolver_with(
            vec![
                StepDefinition::given("a $thing game", noop()),
                StepDefinition::given("a $width by $height game", noop()),
            ],
            RankingOrder::default(),
        );
        let step = bound(resolver.resolve("Given a 5 by 6 game", None).expect("해석 실패"));
        assert_eq!(step.candidate().pattern().as_str(), "a $width by $height game");
    }

    #[test]
    fn fewer_placeholders_win_on_equal_literals() {
        let resolver = resolver_with(
            vec![
                StepDefinition::when("$who toggles $what", noop()),
                StepDefinition::when("Bob $verb lamp", noop()),
            ],
            RankingOrder::default(),
        );
        let step = bound(resolver.resolve("When Bob toggles lamp", None).expect("해석 실패"));
        assert_eq!(step.candidate().pattern().as_str(), "Bob $verb lamp");
    }

    #[test]
    fn priority_breaks_specificity_ties() {
        let resolver = resolver_with(
            vec![
                StepDefinition::given("a $kind game", noop()),
                StepDefinition::given("a $mode game", noop()).priority(2),
            ],
            RankingOrder::default(),
        );
        let step = bound(resolver.resolve("Given a quick game", None).expect("해석 실패"));
        assert_eq!(step.candidate().priority(), 2);
    }

    #[test]
    fn priority_first_ranking_prefers_explicit_priority() {
        let definitions = || {
            vec![
                StepDefinition::given("a $width by $height game", noop()),
                StepDefinition::given("a $anything game", noop()).priority(1),
            ]
        };
        let specificity = resolver_with(definitions(), RankingOrder::SpecificityFirst);
        let step = bound(specificity.resolve("Given a 1 by 2 game", None).expect("해석 실패"));
        assert_eq!(step.candidate().priority(), 0);

        let priority = resolver_with(definitions(), RankingOrder::PriorityFirst);
        let step = bound(priority.resolve("Given a 1 by 2 game", None).expect("해석 실패"));
        assert_eq!(step.candidate().priority(), 1);
    }

    #[test]
    fn equal_top_scores_are_ambiguous() {
        let resolver = resolver_with(
            vec![
                StepDefinition::given("a $kind game", noop()),
                StepDefinition::given("a $mode game", noop()),
            ],
            RankingOrder::default(),
        );
        match resolver.resolve("Given a quick game", None) {
            Err(StepError::AmbiguousMatch { candidates, .. }) => {
                assert_eq!(candidates, vec!["Given a $kind game", "Given a $mode game"]);
            }
            other => panic!("모호성 오류가 아님: {other:?}"),
        }
    }

    #[test]
    fn conversion_failure_is_step_error() {
        let resolver = resolver_with(
            vec![StepDefinition::given("a $width by $height game", noop())
                .param("width", INT)
                .param("height", INT)],
            RankingOrder::default(),
        );
        assert!(matches!(
            resolver.resolve("Given a five by 6 game", None),
            Err(StepError::ParameterConversion { ref text, .. }) if text == "five"
        ));
    }

    #[test]
    fn composite_steps_receive_captured_text() {
        let resolver = resolver_with(
            vec![StepDefinition::given("a blinker in a $size grid", noop())
                .param("size", INT)
                .composed_of([
                    "Given a <size> by <size> game",
                    "When I toggle the cell at (1, <row>)",
                ])],
            RankingOrder::default(),
        );
        let step = bound(resolver.resolve("Given a blinker in a 3 grid", None).expect("해석 실패"));
        assert_eq!(
            step.composed_steps(),
            vec!["Given a 3 by 3 game", "When I toggle the cell at (1, <row>)"]
        );
        let plain = resolver_with(vec![StepDefinition::given("a game", noop())], RankingOrder::default());
        let step = bound(plain.resolve("Given a game", None).expect("해석 실패"));
        assert!(step.composed_steps().is_empty());
    }

    #[test]
    fn localized_keywords_bind_to_role_based_definitions() {
        let mut registry = CandidateRegistry::new();
        registry
            .register(StepDefinition::given("a game", noop()))
            .expect("등록 실패");
        registry
            .register(StepDefinition::then("it is over", noop()))
            .expect("등록 실패");
        let keywords: Keywords =
            serde_yaml::from_str("given: Dado\nthen: Entonces\nand: Y\n").expect("키워드 파싱 실패");
        let resolver = StepResolver::new(
            Arc::new(registry),
            Arc::new(ParameterConverters::new()),
            keywords,
            RankingOrder::default(),
        );
        let step = bound(resolver.resolve("Dado a game", None).expect("해석 실패"));
        assert_eq!(step.candidate().keyword(), "Given");
        let step = bound(resolver.resolve("Y it is over", Some("Then")).expect("해석 실패"));
        assert_eq!(step.candidate().pattern().as_str(), "it is over");
        assert!(matches!(
            resolver.resolve("Given a game", None),
            Ok(Resolution::Pending { .. })
        ));
    }

    #[test]
    fn and_uses_previous_keyword_and_comments_are_skipped() {
        let resolver = resolver_with(
            vec![StepDefinition::when("I toggle the cell at ($column, $row)", noop())
                .param("column", INT)
                .param("row", INT)],
            RankingOrder::default(),
        );
        let step = bound(
            resolver
                .resolve("And I toggle the cell at (3, 4)", Some("When"))
                .expect("해석 실패"),
        );
        assert_eq!(step.args().get::<i64>("column").expect("column"), 3);
        assert!(matches!(
            resolver.resolve("And I toggle the cell at (3, 4)", Some("Given")),
            Ok(Resolution::Pending { .. })
        ));
        assert!(matches!(
            resolver.resolve("When I toggle the cell at (3,4,5)", None),
            Ok(Resolution::Pending { .. })
        ));
        assert!(matches!(
            resolver.resolve("!-- When I toggle the cell at (3, 4)", None),
            Ok(Resolution::Comment { .. })
        ));
    }
}
