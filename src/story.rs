use crate::error::StoryError;
use crate::table::Table;
use anyhow::Context;
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// Story 또는 Scenario에 붙는 `이름: 값` 태그 집합이다.
///
/// 값이 없는 태그는 빈 문자열 값을 가진다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Meta {
    /// 이름순으로 정렬된 속성 맵.
    properties: BTreeMap<String, String>,
}

impl Meta {
    /// 비어 있는 Meta를 생성한다.
    pub fn new() -> Self {
        Self::default()
    }

    /// `"이름 값"` 형태의 문자열 목록에서 Meta를 생성한다.
    pub fn from_properties<I, S>(properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut meta = Self::new();
        for property in properties {
            let property = property.as_ref().trim().trim_start_matches('@');
            if property.is_empty() {
                continue;
            }
            let (name, value) = match property.split_once(char::is_whitespace) {
                Some((name, value)) => (name, value.trim()),
                None => (property, ""),
            };
            meta.insert(name, value);
        }
        meta
    }

    /// 속성을 추가하거나 덮어쓴다.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(name.into(), value.into());
    }

    /// 속성 존재 여부를 확인한다.
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// 속성 값을 조회한다.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// 속성이 비었는지 여부를 확인한다.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// 부모 Meta를 상속한 새 Meta를 반환한다. 충돌 시 자신의 값이 우선한다.
    pub fn inherit_from(&self, parent: &Meta) -> Meta {
        let mut merged = parent.properties.clone();
        for (name, value) in &self.properties {
            merged.insert(name.clone(), value.clone());
        }
        Meta { properties: merged }
    }

    /// 속성 이름과 값을 순회한다.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

impl<'de> Deserialize<'de> for Meta {
    /// 맵 형태와 `"이름 값"` 문자열 목록 형태를 모두 지원하도록 역직렬화한다.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Helper {
            List(Vec<String>),
            Map(BTreeMap<String, Option<serde_yaml::Value>>),
        }

        match Helper::deserialize(deserializer)? {
            Helper::List(items) => Ok(Meta::from_properties(items)),
            Helper::Map(map) => {
                let mut meta = Meta::new();
                for (name, value) in map {
                    let text = match value {
                        None | Some(serde_yaml::Value::Null) => String::new(),
                        Some(serde_yaml::Value::String(s)) => s,
                        Some(serde_yaml::Value::Bool(b)) => b.to_string(),
                        Some(serde_yaml::Value::Number(n)) => n.to_string(),
                        Some(other) => {
                            return Err(serde::de::Error::custom(format!(
                                "Meta 값은 스칼라여야 합니다: {name} = {other:?}"
                            )));
                        }
                    };
                    meta.insert(name, text);
                }
                Ok(meta)
            }
        }
    }
}

/// Scenario는 하나의 행위 예시를 이루는 Step 텍스트 목록이다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenario {
    /// 시나리오 제목.
    #[serde(default)]
    pub title: String,
    /// 시나리오 Meta.
    #[serde(default)]
    pub meta: Meta,
    /// 시나리오 실행 전에 수행할 Given Story 경로 목록.
    #[serde(default)]
    pub given_stories: Vec<String>,
    /// 선언 순서대로 실행할 Step 텍스트 목록.
    #[serde(default)]
    pub steps: Vec<String>,
    /// `<열 이름>` 치환에 사용할 Examples 표.
    #[serde(default)]
    pub examples: Option<Table>,
}

impl Scenario {
    /// 제목과 Step 목록으로 시나리오를 생성한다.
    pub fn new<I, S>(title: impl Into<String>, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            title: title.into(),
            steps: steps.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Meta를 지정한다.
    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    /// Given Story 경로를 추가한다.
    pub fn with_given_story(mut self, path: impl Into<String>) -> Self {
        self.given_stories.push(path.into());
        self
    }

    /// Examples 표를 지정한다.
    pub fn with_examples(mut self, table: Table) -> Self {
        self.examples = Some(table);
        self
    }
}

/// Story는 Scenario 목록과 전후 Step, Given Story 참조를 묶은 최상위 실행 단위다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Story {
    /// Story 경로 또는 식별자.
    #[serde(default)]
    pub path: String,
    /// 사람이 읽는 설명.
    #[serde(default)]
    pub description: String,
    /// Story Meta.
    #[serde(default)]
    pub meta: Meta,
    /// 자신의 시나리오보다 먼저 실행할 Given Story 경로 목록.
    #[serde(default)]
    pub given_stories: Vec<String>,
    /// 시나리오 실행 전에 한 번 수행할 Step 텍스트.
    #[serde(default)]
    pub before_steps: Vec<String>,
    /// 시나리오 실행 후 한 번 수행할 Step 텍스트.
    #[serde(default)]
    pub after_steps: Vec<String>,
    /// 시나리오 목록.
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
}

impl Story {
    /// 경로와 시나리오 목록으로 Story를 생성한다.
    pub fn new(path: impl Into<String>, scenarios: Vec<Scenario>) -> Self {
        Self {
            path: path.into(),
            scenarios,
            ..Self::default()
        }
    }

    /// 정규화된 Story ID를 반환한다.
    pub fn id(&self) -> String {
        canonical_story_id(&self.path)
    }

    /// Meta를 지정한다.
    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    /// Given Story 경로를 추가한다.
    pub fn with_given_story(mut self, path: impl Into<String>) -> Self {
        self.given_stories.push(path.into());
        self
    }

    /// 전체 시나리오 수를 반환한다.
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    /// 시나리오가 비었는지 여부를 확인한다.
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

/// Story 경로를 비교 가능한 형태로 정규화한다.
///
/// 구분자를 `/`로 통일하고 `.` 세그먼트를 제거하며 `..`는 앞 세그먼트와 상쇄한다.
pub fn canonical_story_id(path: &str) -> String {
    let unified = path.trim().replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if matches!(segments.last(), Some(last) if *last != "..") {
                    segments.pop();
                } else {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Given Story 참조 뒤에 붙는 `#` 앵커이다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GivenStoryAnchor {
    /// 앵커 없음. 모든 Scenario를 실행한다.
    #[default]
    None,
    /// `경로#N`. 참조한 Scenario의 Examples N번째 행을 파라미터로 넘긴다.
    Row(usize),
    /// `경로#{이름:값;...}`. Meta가 모두 일치하는 Scenario만 실행한다.
    Meta(BTreeMap<String, String>),
}

/// 앵커를 분리한 Given Story 참조이다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GivenStoryRef {
    /// 앵커를 뗀 Story 경로.
    pub path: String,
    /// 시나리오 선택 또는 파라미터 앵커.
    pub anchor: GivenStoryAnchor,
}

impl GivenStoryRef {
    /// `경로`, `경로#N`, `경로#{이름:값;...}` 형식의 참조를 해석한다.
    ///
    /// 숫자도 `{...}`도 아닌 앵커는 무시한다.
    pub fn parse(reference: &str) -> Self {
        let (path, anchor) = match reference.split_once('#') {
            Some((path, anchor)) => (path, parse_anchor(anchor.trim())),
            None => (reference, GivenStoryAnchor::None),
        };
        Self {
            path: path.trim().to_string(),
            anchor,
        }
    }

    /// 정규화된 Story ID.
    pub fn id(&self) -> String {
        canonical_story_id(&self.path)
    }

    /// Meta 앵커가 있으면 모든 속성이 같은 값으로 있는 Scenario만 선택한다.
    pub fn selects(&self, scenario: &Scenario) -> bool {
        match &self.anchor {
            GivenStoryAnchor::Meta(wanted) => wanted
                .iter()
                .all(|(name, value)| scenario.meta.property(name) == Some(value.as_str())),
            GivenStoryAnchor::None | GivenStoryAnchor::Row(_) => true,
        }
    }

    /// 행 앵커가 가리키는 Examples 행을 파라미터 맵으로 반환한다.
    pub fn parameters(&self, examples: Option<&Table>) -> BTreeMap<String, String> {
        match (&self.anchor, examples) {
            (GivenStoryAnchor::Row(index), Some(table)) => table.row_as_map(*index).unwrap_or_default(),
            _ => BTreeMap::new(),
        }
    }
}

fn parse_anchor(anchor: &str) -> GivenStoryAnchor {
    if let Some(inner) = anchor.strip_prefix('{').and_then(|rest| rest.strip_suffix('}')) {
        let wanted = inner
            .split(';')
            .filter_map(|pair| pair.split_once(':'))
            .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
            .filter(|(name, _)| !name.is_empty())
            .collect();
        GivenStoryAnchor::Meta(wanted)
    } else if let Ok(index) = anchor.parse() {
        GivenStoryAnchor::Row(index)
    } else {
        GivenStoryAnchor::None
    }
}

/// Given Story 참조를 해석하기 위한 Story 조회 맵이다.
#[derive(Debug, Clone, Default)]
pub struct StoryCatalog {
    /// 정규화된 ID별 Story.
    stories: HashMap<String, Arc<Story>>,
}

impl StoryCatalog {
    /// 비어 있는 카탈로그를 생성한다.
    pub fn new() -> Self {
        Self::default()
    }

    /// Story 목록으로 카탈로그를 구성한다.
    pub fn from_stories(stories: impl IntoIterator<Item = Story>) -> Self {
        let mut catalog = Self::new();
        for story in stories {
            catalog.insert(story);
        }
        catalog
    }

    /// Story를 추가하고 공유 포인터를 반환한다.
    pub fn insert(&mut self, story: Story) -> Arc<Story> {
        let story = Arc::new(story);
        self.stories.insert(story.id(), story.clone());
        story
    }

    /// 경로로 Story를 조회한다. `#` 앵커는 무시한다.
    pub fn get(&self, path: &str) -> Option<Arc<Story>> {
        self.stories.get(&GivenStoryRef::parse(path).id()).cloned()
    }

    /// 등록된 Story 수를 반환한다.
    pub fn len(&self) -> usize {
        self.stories.len()
    }

    /// 카탈로그가 비었는지 여부를 확인한다.
    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }

    /// Story에서 도달 가능한 Given Story 그래프를 검증한다.
    ///
    /// Story 자체와 모든 시나리오의 Given Story를 깊이 우선으로 따라가며
    /// 순환 또는 누락된 참조를 찾는다.
    pub fn validate_given_stories(&self, story: &Story) -> Result<(), StoryError> {
        let mut chain = vec![story.id()];
        let mut verified = HashSet::new();
        self.visit(story, &mut chain, &mut verified)
    }

    fn visit(
        &self,
        story: &Story,
        chain: &mut Vec<String>,
        verified: &mut HashSet<String>,
    ) -> Result<(), StoryError> {
        let references = story
            .given_stories
            .iter()
            .chain(story.scenarios.iter().flat_map(|s| s.given_stories.iter()));
        for reference in references {
            let id = GivenStoryRef::parse(reference).id();
            if chain.contains(&id) {
                let mut cycle = chain.clone();
                cycle.push(id);
                return Err(StoryError::CyclicGivenStory { chain: cycle });
            }
            if verified.contains(&id) {
                continue;
            }
            let given = self.get(&id).ok_or_else(|| StoryError::MissingGivenStory {
                parent: story.id(),
                missing: id.clone(),
            })?;
            chain.push(id.clone());
            self.visit(&given, chain, verified)?;
            chain.pop();
            verified.insert(id);
        }
        Ok(())
    }
}

/// YAML 파일을 읽어 Story로 역직렬화한다.
///
/// 파일에 `path`가 없으면 파일 경로를 Story 경로로 사용한다.
pub fn load_story_from_file(path: &Path) -> anyhow::Result<Story> {
    let mut file =
        File::open(path).with_context(|| format!("Story 파일 열기 실패: {}", path.display()))?;
    let mut story = load_story_from_reader(&mut file)
        .with_context(|| format!("Story 파일 파싱 실패: {}", path.display()))?;
    if story.path.trim().is_empty() {
        story.path = path.to_string_lossy().to_string();
    }
    Ok(story)
}

/// Reader에서 YAML을 읽어 Story 구조체로 파싱한다.
pub fn load_story_from_reader<R: Read>(reader: &mut R) -> anyhow::Result<Story> {
    let mut buf = String::new();
    reader.read_to_string(&mut buf)?;
    let story: Story = serde_yaml::from_str(&buf)?;
    Ok(story)
}
