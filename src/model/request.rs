use serde::{Deserialize, Serialize};

use super::DatabaseDescriptor;
use crate::value::CastType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
    Like,
    In,
    NotIn,
    Between,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
}

impl Default for LogicalOperator {
    fn default() -> Self {
        LogicalOperator::And
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinType {
    Inner,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl Default for OrderDirection {
    fn default() -> Self {
        OrderDirection::Asc
    }
}

/// One filter predicate. `logical_operator` joins this filter to the *next*
/// one in the list (see combining rule in the predicate builder); the last
/// filter's operator is never consulted.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Search {
    pub column: String,
    #[serde(default)]
    pub value: serde_json::Value,
    pub filter_operator: FilterOperator,
    #[serde(default)]
    pub logical_operator: LogicalOperator,
    #[serde(default)]
    pub cast_type: Option<CastType>,
    #[serde(default)]
    pub cast_format: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub join_type: JoinType,
    pub table: String,
    #[serde(default)]
    pub alias: Option<String>,
    pub on_left: Vec<String>,
    pub on_right: Vec<String>,
}

impl JoinRequest {
    pub fn effective_alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    #[serde(default)]
    pub config_id: Option<String>,
    #[serde(default)]
    pub direct_config: Option<DatabaseDescriptor>,
    pub table: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub select_fields: Vec<String>,
    #[serde(default)]
    pub filters: Vec<Search>,
    #[serde(default)]
    pub joins: Vec<JoinRequest>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub order_by: Option<String>,
    #[serde(default)]
    pub order_direction: OrderDirection,
    #[serde(default)]
    pub distinct: bool,
    #[serde(default)]
    pub pretty: bool,
}

impl QueryRequest {
    pub fn effective_alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }
}

/// Splits a `qualifier.column` or bare `column` reference.
pub fn split_qualified(path: &str) -> (Option<&str>, &str) {
    match path.split_once('.') {
        Some((qualifier, column)) => (Some(qualifier), column),
        None => (None, path),
    }
}
