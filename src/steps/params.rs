//! 캡처한 문자열을 타입 태그별 변환기로 값으로 바꾼다.

use crate::error::StepError;
use crate::table::Table;
use once_cell::sync::Lazy;
use regex::Regex;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// 기본 타입 태그. 선언되지 않은 파라미터에 사용한다.
pub const STRING: &str = "string";
/// 부호 있는 정수 타입 태그.
pub const INT: &str = "int";
/// 실수 타입 태그.
pub const FLOAT: &str = "float";
/// 불리언 타입 태그.
pub const BOOL: &str = "bool";
/// 쉼표로 구분된 문자열 목록 타입 태그.
pub const LIST: &str = "list";
/// 쉼표로 구분된 정수 목록 타입 태그.
pub const INT_LIST: &str = "int_list";
/// 파이프 구분 표 타입 태그.
pub const TABLE: &str = "table";

/// 변환된 파라미터 값이다.
#[derive(Debug, Clone)]
pub enum ParamValue {
    /// 원문 문자열.
    Text(String),
    /// 정수.
    Int(i64),
    /// 실수.
    Float(f64),
    /// 불리언.
    Bool(bool),
    /// 값 목록.
    List(Vec<ParamValue>),
    /// 표.
    Table(Table),
    /// 사용자 정의 변환기가 만든 값.
    Custom(Arc<dyn Any + Send + Sync>),
}

/// 문자열을 [`ParamValue`]로 바꾸는 변환기이다.
pub trait ParameterConverter: Send + Sync {
    /// 원문을 변환한다. 실패 시 사람이 읽을 수 있는 사유를 반환한다.
    fn convert(&self, raw: &str) -> Result<ParamValue, String>;
}

impl<F> ParameterConverter for F
where
    F: Fn(&str) -> Result<ParamValue, String> + Send + Sync,
{
    fn convert(&self, raw: &str) -> Result<ParamValue, String> {
        self(raw)
    }
}

/// 변환기를 공유하기 위한 Arc 타입 별칭이다.
pub type SharedConverter = Arc<dyn ParameterConverter>;

/// 타입 태그별 변환기 레지스트리이다.
///
/// 실행 준비 단계에서만 수정하고 이후에는 여러 Story 작업자가 잠금 없이 읽는다.
#[derive(Clone)]
pub struct ParameterConverters {
    /// 태그별 변환기 맵.
    converters: HashMap<String, SharedConverter>,
}

impl ParameterConverters {
    /// 기본 변환기가 등록된 레지스트리를 생성한다.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_fn(STRING, |raw: &str| Ok(ParamValue::Text(raw.to_string())));
        registry.register_fn(INT, |raw: &str| parse_int(raw).map(ParamValue::Int));
        registry.register_fn(FLOAT, |raw: &str| {
            raw.trim()
                .parse::<f64>()
                .map(ParamValue::Float)
                .map_err(|err| err.to_string())
        });
        registry.register_fn(BOOL, |raw: &str| parse_bool(raw).map(ParamValue::Bool));
        registry.register_fn(LIST, |raw: &str| {
            Ok(ParamValue::List(
                split_list(raw)
                    .map(|item| ParamValue::Text(item.to_string()))
                    .collect(),
            ))
        });
        registry.register_fn(INT_LIST, |raw: &str| {
            split_list(raw)
                .map(|item| parse_int(item).map(ParamValue::Int))
                .collect::<Result<Vec<_>, _>>()
                .map(ParamValue::List)
        });
        registry.register_fn(TABLE, |raw: &str| Table::parse(raw).map(ParamValue::Table));
        registry
    }

    /// 클로저를 변환기로 등록한다.
    pub fn register_fn<F>(&mut self, type_tag: impl Into<String>, converter: F)
    where
        F: Fn(&str) -> Result<ParamValue, String> + Send + Sync + 'static,
    {
        self.register(type_tag, converter);
    }

    /// 변환기가 하나도 없는 레지스트리를 생성한다.
    pub fn empty() -> Self {
        Self {
            converters: HashMap::new(),
        }
    }

    /// 타입 태그에 변환기를 등록한다. 같은 태그는 덮어쓴다.
    pub fn register<C>(&mut self, type_tag: impl Into<String>, converter: C)
    where
        C: ParameterConverter + 'static,
    {
        self.converters.insert(type_tag.into(), Arc::new(converter));
    }

    /// 태그 등록 여부를 확인한다.
    pub fn supports(&self, type_tag: &str) -> bool {
        self.converters.contains_key(type_tag)
    }

    /// 원문을 지정한 태그의 값으로 변환한다.
    pub fn convert(&self, type_tag: &str, raw: &str) -> Result<ParamValue, StepError> {
        let converter = self
            .converters
            .get(type_tag)
            .ok_or_else(|| StepError::UnknownConverter(type_tag.to_string()))?;
        converter
            .convert(raw)
            .map_err(|reason| StepError::ParameterConversion {
                text: raw.to_string(),
                type_tag: type_tag.to_string(),
                reason,
            })
    }
}

impl Default for ParameterConverters {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ParameterConverters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tags: Vec<&String> = self.converters.keys().collect();
        tags.sort();
        f.debug_struct("ParameterConverters")
            .field("tags", &tags)
            .finish()
    }
}

/// 허용된 열거 값 중 하나로 변환하는 변환기이다.
///
/// 대소문자를 무시하고 공백·하이픈을 `_`로 취급하므로 `"stop loss"`는 `STOP_LOSS`와 일치한다.
#[derive(Debug, Clone)]
pub struct EnumConverter {
    /// 허용된 값 목록.
    variants: Vec<String>,
}

impl EnumConverter {
    /// 허용 값 목록으로 변환기를 생성한다.
    pub fn new<I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            variants: variants.into_iter().map(Into::into).collect(),
        }
    }
}

impl ParameterConverter for EnumConverter {
    fn convert(&self, raw: &str) -> Result<ParamValue, String> {
        let wanted = fluent_key(raw);
        self.variants
            .iter()
            .find(|variant| fluent_key(variant) == wanted)
            .map(|variant| ParamValue::Text(variant.clone()))
            .ok_or_else(|| format!("허용 값이 아닙니다 (허용: {})", self.variants.join(", ")))
    }
}

fn fluent_key(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect()
}

fn parse_int(raw: &str) -> Result<i64, String> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != '_').collect();
    cleaned.parse::<i64>().map_err(|err| err.to_string())
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "y" => Ok(true),
        "false" | "no" | "off" | "n" => Ok(false),
        other => Err(format!("불리언 값이 아닙니다: {other}")),
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|item| !item.is_empty())
}

/// [`ParamValue`]에서 Rust 값을 꺼내는 변환 규칙이다.
pub trait FromParam: Sized {
    /// 값의 형태가 맞으면 변환한다.
    fn from_param(value: &ParamValue) -> Option<Self>;
}

impl FromParam for String {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Text(text) => Some(text.clone()),
            ParamValue::Int(n) => Some(n.to_string()),
            ParamValue::Float(n) => Some(n.to_string()),
            ParamValue::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

impl FromParam for i64 {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Int(n) => Some(*n),
            _ => None,
        }
    }
}

impl FromParam for i32 {
    fn from_param(value: &ParamValue) -> Option<Self> {
        i64::from_param(value).and_then(|n| i32::try_from(n).ok())
    }
}

impl FromParam for usize {
    fn from_param(value: &ParamValue) -> Option<Self> {
        i64::from_param(value).and_then(|n| usize::try_from(n).ok())
    }
}

impl FromParam for f64 {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Float(n) => Some(*n),
            ParamValue::Int(n) => Some(*n as f64),
            _ => None,
        }
    }
}

impl FromParam for bool {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromParam for Table {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Table(table) => Some(table.clone()),
            _ => None,
        }
    }
}

impl<T: FromParam> FromParam for Vec<T> {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::List(items) => items.iter().map(T::from_param).collect(),
            _ => None,
        }
    }
}

/// 해석된 Step에 바인딩된 파라미터 목록이다. 선언 순서를 유지한다.
#[derive(Debug, Clone, Default)]
pub struct StepArgs {
    /// 이름과 값 쌍.
    entries: Vec<(String, ParamValue)>,
}

impl StepArgs {
    /// 비어 있는 인자 목록을 생성한다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 인자를 추가한다.
    pub fn push(&mut self, name: impl Into<String>, value: ParamValue) {
        self.entries.push((name.into(), value));
    }

    /// 인자 수를 반환한다.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 인자가 비었는지 여부를 확인한다.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 이름으로 원시 값을 조회한다.
    pub fn value(&self, name: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, value)| value)
    }

    /// 이름으로 값을 꺼내 지정한 타입으로 변환한다.
    pub fn get<T: FromParam>(&self, name: &str) -> anyhow::Result<T> {
        let value = self
            .value(name)
            .ok_or_else(|| anyhow::anyhow!("파라미터 '{name}'가 없습니다."))?;
        T::from_param(value).ok_or_else(|| {
            anyhow::anyhow!(
                "파라미터 '{name}'를 {}로 꺼낼 수 없습니다: {value:?}",
                std::any::type_name::<T>()
            )
        })
    }

    /// 위치로 값을 꺼내 지정한 타입으로 변환한다.
    pub fn at<T: FromParam>(&self, index: usize) -> anyhow::Result<T> {
        let (name, _) = self
            .entries
            .get(index)
            .ok_or_else(|| anyhow::anyhow!("{index}번째 파라미터가 없습니다."))?;
        self.get(name)
    }

    /// 사용자 정의 값을 꺼낸다.
    pub fn custom<T: Any + Send + Sync>(&self, name: &str) -> anyhow::Result<Arc<T>> {
        match self.value(name) {
            Some(ParamValue::Custom(value)) => value.clone().downcast::<T>().map_err(|_| {
                anyhow::anyhow!(
                    "파라미터 '{name}'는 {} 타입이 아닙니다.",
                    std::any::type_name::<T>()
                )
            }),
            Some(other) => Err(anyhow::anyhow!(
                "파라미터 '{name}'는 사용자 정의 값이 아닙니다: {other:?}"
            )),
            None => Err(anyhow::anyhow!("파라미터 '{name}'가 없습니다.")),
        }
    }

    /// 이름과 값을 순회한다.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }
}

/// 문구의 `<이름>`을 값 맵으로 치환한다. 맵에 없는 이름은 그대로 둔다.
///
/// Examples 행과 Composite Step 파라미터 전달에 쓰인다.
pub fn substitute_named(text: &str, values: &BTreeMap<String, String>) -> String {
    static NAMED: Lazy<Regex> = Lazy::new(|| Regex::new(r"<([^<>\r\n]+)>").expect("정규식 컴파일 실패"));
    if values.is_empty() {
        return text.to_string();
    }
    NAMED
        .replace_all(text, |caps: &regex::Captures| match values.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}
