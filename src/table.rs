use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 파이프(`|`)로 구분된 표 형식 데이터를 표현한다.
///
/// 첫 행은 헤더이며 이후 행은 헤더와 같은 수의 셀을 가져야 한다.
/// Examples 표와 `table` 파라미터 타입이 같은 구조를 공유한다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Table {
    /// 헤더 이름 목록.
    headers: Vec<String>,
    /// 데이터 행 목록.
    rows: Vec<Vec<String>>,
}

impl Table {
    /// 헤더와 행으로 표를 생성한다. 셀 수가 다르면 오류를 반환한다.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, String> {
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != headers.len() {
                return Err(format!(
                    "{}번째 행의 셀 수({})가 헤더 수({})와 다릅니다.",
                    idx + 1,
                    row.len(),
                    headers.len()
                ));
            }
        }
        Ok(Self { headers, rows })
    }

    /// 텍스트 표를 파싱한다.
    ///
    /// 빈 줄과 `!--`로 시작하는 주석 줄은 무시한다.
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut lines = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with("!--"));
        let headers = match lines.next() {
            Some(line) => split_row(line)?,
            None => return Ok(Self::default()),
        };
        let mut rows = Vec::new();
        for line in lines {
            rows.push(split_row(line)?);
        }
        Self::new(headers, rows)
    }

    /// 헤더 목록을 반환한다.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// 데이터 행 목록을 반환한다.
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// 데이터 행 수를 반환한다.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 데이터 행이 비었는지 여부를 확인한다.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 지정한 행을 헤더 이름 기준 맵으로 반환한다.
    pub fn row_as_map(&self, index: usize) -> Option<BTreeMap<String, String>> {
        let row = self.rows.get(index)?;
        Some(
            self.headers
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect(),
        )
    }

    /// 지정한 헤더의 열 값을 모두 반환한다.
    pub fn column(&self, header: &str) -> Option<Vec<&str>> {
        let idx = self.headers.iter().position(|h| h == header)?;
        Some(self.rows.iter().map(|row| row[idx].as_str()).collect())
    }
}

fn split_row(line: &str) -> Result<Vec<String>, String> {
    let inner = line
        .strip_prefix('|')
        .ok_or_else(|| format!("표 행은 '|'로 시작해야 합니다: {line}"))?;
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    Ok(inner.split('|').map(|cell| cell.trim().to_string()).collect())
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "|{}|", self.headers.join("|"))?;
        for row in &self.rows {
            writeln!(f, "|{}|", row.join("|"))?;
        }
        Ok(())
    }
}

impl TryFrom<String> for Table {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Table::parse(&value)
    }
}

impl From<Table> for String {
    fn from(table: Table) -> Self {
        table.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_rows_ignoring_comments() {
        let table = Table::parse(
            "|symbol|threshold|\n!-- 주석 줄\n|STK1|10.0|\n| STK2 | 5 |\n",
        )
        .expect("표 파싱 실패");
        assert_eq!(table.headers(), ["symbol", "threshold"]);
        assert_eq!(table.len(), 2);
        let second = table.row_as_map(1).expect("행 없음");
        assert_eq!(second["symbol"], "STK2");
        assert_eq!(second["threshold"], "5");
        assert_eq!(table.column("symbol"), Some(vec!["STK1", "STK2"]));
    }

    #[test]
    fn rejects_rows_with_wrong_cell_count() {
        let err = Table::parse("|a|b|\n|1|\n").unwrap_err();
        assert!(err.contains("1번째 행"));
    }

    #[test]
    fn rejects_lines_without_leading_pipe() {
        assert!(Table::parse("a|b").is_err());
    }

    #[test]
    fn empty_text_yields_empty_table() {
        let table = Table::parse("  \n").expect("빈 표 파싱 실패");
        assert!(table.is_empty());
        assert!(table.headers().is_empty());
    }
}
