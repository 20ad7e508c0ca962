//! Conditional row highlighting over the candidate table.
//!
//! Only the predicate side lives here; colours are passed through as the
//! opaque strings stored in `rules.json`.
use std::collections::HashMap;

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

use crate::error::CrossError;
use crate::table::{self, NumericCell};

pub const DEFAULT_COLOR: &str = "#FFEB3B";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    /// Original CSV header, not the display name.
    #[serde(default)]
    pub column: String,
    #[serde(default)]
    pub op: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightRule {
    #[serde(default)]
    pub name: String,
    /// `AND` (case-insensitive) requires every clause; anything else reads as `OR`.
    #[serde(default = "default_logic")]
    pub logic: String,
    #[serde(default)]
    pub clauses: Vec<Clause>,
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_logic() -> String {
    "AND".to_string()
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
    Contains,
    NotContains,
}

impl Operator {
    pub fn parse(op: &str) -> Option<Self> {
        Some(match op.trim() {
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            "==" => Operator::Eq,
            "!=" => Operator::Ne,
            "contains" => Operator::Contains,
            "not contains" => Operator::NotContains,
            _ => return None,
        })
    }
}

/// Evaluate one clause against a cell.
///
/// Comparisons are numeric when both sides parse; `==` and `!=` then fall
/// back to exact text. Unknown operators never match.
pub fn value_matches(cell: &str, op: &str, target: &str) -> bool {
    let (cell, target) = (cell.trim(), target.trim());
    let Some(op) = Operator::parse(op) else {
        return false;
    };
    match op {
        Operator::Contains => cell.to_lowercase().contains(&target.to_lowercase()),
        Operator::NotContains => !cell.to_lowercase().contains(&target.to_lowercase()),
        _ => match (table::parse_number(cell), table::parse_number(target)) {
            (NumericCell::Number(a), NumericCell::Number(b)) => match op {
                Operator::Gt => a > b,
                Operator::Ge => a >= b,
                Operator::Lt => a < b,
                Operator::Le => a <= b,
                Operator::Eq => a == b,
                Operator::Ne => a != b,
                Operator::Contains | Operator::NotContains => false,
            },
            _ => match op {
                Operator::Eq => cell == target,
                Operator::Ne => cell != target,
                _ => false,
            },
        },
    }
}

impl HighlightRule {
    fn is_and(&self) -> bool {
        self.logic.trim().eq_ignore_ascii_case("AND")
    }

    /// `row` maps original header to cell text. A rule without clauses
    /// never matches; a clause on an unknown column is false.
    pub fn matches(&self, row: &HashMap<&str, &str>) -> bool {
        if self.clauses.is_empty() {
            return false;
        }
        let mut results = self.clauses.iter().map(|c| match row.get(c.column.as_str()) {
            Some(cell) => value_matches(cell, &c.op, &c.value),
            None => false,
        });
        if self.is_and() {
            results.all(|r| r)
        } else {
            results.any(|r| r)
        }
    }
}

/// Colour per row: the last matching rule wins, `None` when nothing matches.
pub fn evaluate(df: &DataFrame, rules: &[HighlightRule]) -> Result<Vec<Option<String>>, CrossError> {
    if rules.is_empty() {
        return Ok(vec![None; df.height()]);
    }
    let names = table::column_names(df);
    let mut columns = Vec::with_capacity(names.len());
    for name in &names {
        columns.push(table::string_cells(df, name)?);
    }

    let mut colors = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let row: HashMap<&str, &str> = names
            .iter()
            .zip(&columns)
            .map(|(name, cells)| (name.as_str(), cells[i].as_str()))
            .collect();
        let color = rules
            .iter()
            .rev()
            .find(|rule| rule.matches(&row))
            .map(|rule| rule.color.clone());
        colors.push(color);
    }
    Ok(colors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn rule(logic: &str, clauses: &[(&str, &str, &str)], color: &str) -> HighlightRule {
        HighlightRule {
            name: String::new(),
            logic: logic.to_string(),
            clauses: clauses
                .iter()
                .map(|(column, op, value)| Clause {
                    column: column.to_string(),
                    op: op.to_string(),
                    value: value.to_string(),
                })
                .collect(),
            color: color.to_string(),
        }
    }

    #[test]
    fn numeric_comparison_strips_separators() {
        assert!(value_matches("1,200", ">", "1000"));
        assert!(value_matches("0.15", ">=", "0.15"));
        assert!(!value_matches("0.1", ">", "0.15"));
        assert!(value_matches("2.0", "==", "2"));
    }

    #[test]
    fn equality_falls_back_to_text() {
        assert!(value_matches(" Q208 ", "==", "Q208"));
        assert!(value_matches("Q208", "!=", "Q209"));
        assert!(!value_matches("abc", ">", "1"));
        assert!(!value_matches("abc", "~", "abc"));
    }

    #[test]
    fn contains_is_case_insensitive() {
        assert!(value_matches("KQ228", "contains", "q22"));
        assert!(value_matches("KQ228", "not contains", "x"));
        assert!(!value_matches("KQ228", "not contains", "kq"));
    }

    #[test]
    fn last_matching_rule_wins() {
        let df = df!(
            "KINSHIP" => &["0.3", "0.05", ""],
            "FEMALE_STD" => &["KX100", "Q208", "Q208"]
        )
        .unwrap();
        let rules = vec![
            rule("AND", &[("KINSHIP", ">=", "0.15")], "red"),
            rule("OR", &[("FEMALE_STD", "contains", "q2"), ("MISSING", "==", "x")], "blue"),
            rule("AND", &[], "never"),
        ];
        let colors = evaluate(&df, &rules).unwrap();
        assert_eq!(
            colors,
            vec![Some("red".into()), Some("blue".into()), Some("blue".into())]
        );

        let colors = evaluate(&df, &rules[..1]).unwrap();
        assert_eq!(colors, vec![Some("red".into()), None, None]);
    }

    #[test]
    fn unknown_column_fails_an_and_rule() {
        let df = df!("KINSHIP" => &["0.3"]).unwrap();
        let rules = vec![rule("and", &[("KINSHIP", ">", "0"), ("NOPE", "==", "")], "red")];
        assert_eq!(evaluate(&df, &rules).unwrap(), vec![None]);
    }

    #[test]
    fn logic_other_than_and_reads_as_or() {
        let df = df!("KINSHIP" => &["0.3"], "FEMALE_STD" => &["Q208"]).unwrap();
        let clauses = [("KINSHIP", ">", "0.5"), ("FEMALE_STD", "==", "Q208")];
        for logic in ["OR", "any", ""] {
            let rules = vec![rule(logic, &clauses, "red")];
            assert_eq!(evaluate(&df, &rules).unwrap(), vec![Some("red".into())]);
        }
        let rules = vec![rule(" and ", &clauses, "red")];
        assert_eq!(evaluate(&df, &rules).unwrap(), vec![None]);
    }

    #[test]
    fn rules_deserialize_with_defaults() {
        let rules: Vec<HighlightRule> =
            serde_json::from_str(r#"[{"clauses":[{"column":"KINSHIP","op":">=","value":"0.15"}]}]"#)
                .unwrap();
        assert_eq!(rules[0].logic, "AND");
        assert_eq!(rules[0].color, DEFAULT_COLOR);
    }
}
