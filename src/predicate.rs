//! Component B — Predicate Builder.
//!
//! Turns a single [`Search`] into a SQL condition fragment and combines a
//! list of them under the left-associative logical chain described in
//! §4.2 of the spec.

use std::collections::HashMap;

use crate::dialect;
use crate::error::{AppError, AppResult};
use crate::model::{split_qualified, DbType, FilterOperator, LogicalOperator, Search, SchemaMap};
use crate::value::{coerce, coerce_list, CanonicalType, TypedValue};

/// Everything the predicate builder needs to resolve and type a column
/// reference: which qualifiers are in scope, and the schema (when known)
/// for each of them, keyed by lowercased qualifier.
pub struct PredicateContext<'a> {
    pub db_type: DbType,
    pub base_alias: &'a str,
    pub join_aliases: &'a [String],
    pub schemas: &'a HashMap<String, SchemaMap>,
}

impl<'a> PredicateContext<'a> {
    fn is_qualifier_in_scope(&self, qualifier: &str) -> bool {
        qualifier.eq_ignore_ascii_case(self.base_alias)
            || self
                .join_aliases
                .iter()
                .any(|a| a.eq_ignore_ascii_case(qualifier))
    }

    fn data_class_for(&self, qualifier: &str, column: &str) -> AppResult<CanonicalType> {
        self.schemas
            .get(&qualifier.to_ascii_lowercase())
            .and_then(|schema| schema.get(column))
            .map(|handle| handle.data_class)
            .ok_or_else(|| {
                AppError::invalid(format!("unknown column: {qualifier}.{column}"))
            })
    }
}

/// A rendered condition fragment plus its positional bind parameters, in
/// the order they appear in `sql`.
#[derive(Debug, Clone, Default)]
pub struct BuiltPredicate {
    pub sql: String,
    pub params: Vec<TypedValue>,
}

impl BuiltPredicate {
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// Builds the combined WHERE fragment for an ordered filter list (§4.2).
/// Returns an empty [`BuiltPredicate`] for an empty list.
pub fn build_predicate(filters: &[Search], ctx: &PredicateContext) -> AppResult<BuiltPredicate> {
    if filters.is_empty() {
        return Ok(BuiltPredicate::default());
    }

    let mut counter = 1usize;
    let mut parts = Vec::with_capacity(filters.len());
    for search in filters {
        parts.push(build_single(search, ctx, &mut counter)?);
    }

    let mut acc_sql = parts[0].0.clone();
    let mut acc_params = parts[0].1.clone();
    for i in 1..parts.len() {
        let connective = match filters[i - 1].logical_operator {
            LogicalOperator::And => "AND",
            LogicalOperator::Or => "OR",
        };
        acc_sql = format!("({acc_sql} {connective} {})", parts[i].0);
        acc_params.extend(parts[i].1.clone());
    }

    Ok(BuiltPredicate {
        sql: acc_sql,
        params: acc_params,
    })
}

fn resolve_field(
    search: &Search,
    ctx: &PredicateContext,
) -> AppResult<(String, String, String, CanonicalType)> {
    let (qualifier, column) = split_qualified(&search.column);
    let qualifier = qualifier.unwrap_or(ctx.base_alias);

    if !ctx.is_qualifier_in_scope(qualifier) {
        return Err(AppError::invalid(format!(
            "column qualifier '{qualifier}' is not in scope for this query"
        )));
    }

    let target = match search.cast_type {
        Some(cast) => cast.canonical(),
        None => ctx.data_class_for(qualifier, column)?,
    };

    let field_ref = format!(
        "{}.{}",
        dialect::quote_ident(ctx.db_type, qualifier)?,
        dialect::quote_ident(ctx.db_type, column)?
    );

    let field_sql = match search.cast_type {
        Some(cast) => format!("CAST({field_ref} AS {})", cast.canonical().cast_keyword()),
        None => field_ref,
    };

    Ok((qualifier.to_string(), column.to_string(), field_sql, target))
}

fn next_placeholder(ctx: &PredicateContext, counter: &mut usize) -> String {
    let ph = dialect::placeholder(ctx.db_type, *counter);
    *counter += 1;
    ph
}

fn build_single(
    search: &Search,
    ctx: &PredicateContext,
    counter: &mut usize,
) -> AppResult<(String, Vec<TypedValue>)> {
    let (_, _, field_sql, target) = resolve_field(search, ctx)?;

    if search.value.is_null() {
        return match search.filter_operator {
            FilterOperator::Equals => Ok((format!("{field_sql} IS NULL"), vec![])),
            FilterOperator::NotEquals => Ok((format!("{field_sql} IS NOT NULL"), vec![])),
            other => Err(AppError::invalid(format!(
                "operator {other:?} does not support a null value"
            ))),
        };
    }

    match search.filter_operator {
        FilterOperator::Equals | FilterOperator::NotEquals => {
            let value = coerce(&search.value, target, search.cast_format.as_deref())?;
            build_equality(&field_sql, search.filter_operator, value, ctx, counter)
        }
        FilterOperator::GreaterThan
        | FilterOperator::GreaterThanEqual
        | FilterOperator::LessThan
        | FilterOperator::LessThanEqual => {
            let mut value = coerce(&search.value, target, search.cast_format.as_deref())?;
            value = value.truncate_to_seconds();
            let op = comparison_operator(search.filter_operator);
            let ph = next_placeholder(ctx, counter);
            Ok((format!("{field_sql} {op} {ph}"), vec![value]))
        }
        FilterOperator::Like => {
            if !search.value.is_string() {
                return Err(AppError::invalid("LIKE requires a string value"));
            }
            let value = coerce(&search.value, CanonicalType::Varchar, None)?;
            let ph = next_placeholder(ctx, counter);
            Ok((dialect::like_fragment(ctx.db_type, &field_sql, &ph), vec![value]))
        }
        FilterOperator::In | FilterOperator::NotIn => {
            let values = coerce_list(&search.value, target, search.cast_format.as_deref())?;
            if values.is_empty() {
                return Err(AppError::invalid("IN/NOT_IN requires at least one value"));
            }
            let placeholders: Vec<String> = values
                .iter()
                .map(|_| next_placeholder(ctx, counter))
                .collect();
            let kw = if search.filter_operator == FilterOperator::In {
                "IN"
            } else {
                "NOT IN"
            };
            Ok((
                format!("{field_sql} {kw} ({})", placeholders.join(", ")),
                values,
            ))
        }
        FilterOperator::Between => {
            let array = search
                .value
                .as_array()
                .ok_or_else(|| AppError::invalid("BETWEEN requires a 2-element array value"))?;
            if array.len() != 2 {
                return Err(AppError::invalid("BETWEEN requires exactly 2 values"));
            }
            let low = coerce(&array[0], target, search.cast_format.as_deref())?;
            let high = coerce(&array[1], target, search.cast_format.as_deref())?;
            let ph_low = next_placeholder(ctx, counter);
            let ph_high = next_placeholder(ctx, counter);
            Ok((
                format!("{field_sql} BETWEEN {ph_low} AND {ph_high}"),
                vec![low, high],
            ))
        }
    }
}

fn comparison_operator(op: FilterOperator) -> &'static str {
    match op {
        FilterOperator::GreaterThan => ">",
        FilterOperator::GreaterThanEqual => ">=",
        FilterOperator::LessThan => "<",
        FilterOperator::LessThanEqual => "<=",
        _ => unreachable!("comparison_operator called with non-comparison operator"),
    }
}

/// EQUALS/NOT_EQUALS on a LOCALDATETIME expands to a one-second range per
/// the mandatory datetime equality policy in §4.2.
fn build_equality(
    field_sql: &str,
    op: FilterOperator,
    value: TypedValue,
    ctx: &PredicateContext,
    counter: &mut usize,
) -> AppResult<(String, Vec<TypedValue>)> {
    if let TypedValue::LocalDateTime(_) = value {
        let truncated = match value.truncate_to_seconds() {
            TypedValue::LocalDateTime(dt) => dt,
            _ => unreachable!(),
        };
        let upper = truncated + chrono::Duration::seconds(1);
        let ph_low = next_placeholder(ctx, counter);
        let ph_high = next_placeholder(ctx, counter);
        let kw = if op == FilterOperator::Equals {
            "BETWEEN"
        } else {
            "NOT BETWEEN"
        };
        return Ok((
            format!("{field_sql} {kw} {ph_low} AND {ph_high}"),
            vec![TypedValue::LocalDateTime(truncated), TypedValue::LocalDateTime(upper)],
        ));
    }

    let op_sql = if op == FilterOperator::Equals { "=" } else { "<>" };
    let ph = next_placeholder(ctx, counter);
    Ok((format!("{field_sql} {op_sql} {ph}"), vec![value]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnHandle, DataClass};
    use serde_json::json;

    fn schema_with(columns: &[(&str, DataClass)]) -> SchemaMap {
        SchemaMap::new(
            columns
                .iter()
                .map(|(name, class)| ColumnHandle {
                    name: name.to_string(),
                    sql_type: "text".to_string(),
                    data_class: *class,
                })
                .collect(),
        )
    }

    fn search(column: &str, value: serde_json::Value, op: FilterOperator) -> Search {
        Search {
            column: column.to_string(),
            value,
            filter_operator: op,
            logical_operator: LogicalOperator::And,
            cast_type: None,
            cast_format: None,
        }
    }

    #[test]
    fn builds_like_fragment_for_postgres() {
        let mut schemas = HashMap::new();
        schemas.insert(
            "users".to_string(),
            schema_with(&[("varchar_col", CanonicalType::Varchar)]),
        );
        let ctx = PredicateContext {
            db_type: DbType::Postgres,
            base_alias: "users",
            join_aliases: &[],
            schemas: &schemas,
        };
        let filters = vec![search("varchar_col", json!("sam"), FilterOperator::Like)];
        let built = build_predicate(&filters, &ctx).unwrap();
        assert_eq!(
            built.sql,
            "\"users\".\"varchar_col\" LIKE '%' || $1 || '%'"
        );
        assert_eq!(built.params, vec![TypedValue::Varchar("sam".to_string())]);
    }

    #[test]
    fn builds_between_for_decimal() {
        let mut schemas = HashMap::new();
        schemas.insert(
            "t".to_string(),
            schema_with(&[("decimal_col", CanonicalType::Decimal)]),
        );
        let ctx = PredicateContext {
            db_type: DbType::Mysql,
            base_alias: "t",
            join_aliases: &[],
            schemas: &schemas,
        };
        let filters = vec![search(
            "decimal_col",
            json!([0.0, 500.0]),
            FilterOperator::Between,
        )];
        let built = build_predicate(&filters, &ctx).unwrap();
        assert_eq!(built.sql, "`t`.`decimal_col` BETWEEN ? AND ?");
        assert_eq!(built.params.len(), 2);
    }

    #[test]
    fn cast_wraps_field_and_fixes_target_type() {
        let schemas = HashMap::new();
        let ctx = PredicateContext {
            db_type: DbType::Postgres,
            base_alias: "t",
            join_aliases: &[],
            schemas: &schemas,
        };
        let mut f = search("string_int", json!(50), FilterOperator::Equals);
        f.cast_type = Some(crate::value::CastType::Integer);
        let built = build_predicate(&[f], &ctx).unwrap();
        assert_eq!(built.sql, "CAST(\"t\".\"string_int\" AS INTEGER) = $1");
        assert_eq!(built.params, vec![TypedValue::Integer(50)]);
    }

    #[test]
    fn null_equals_rewrites_to_is_null() {
        let schemas = HashMap::new();
        let ctx = PredicateContext {
            db_type: DbType::Postgres,
            base_alias: "t",
            join_aliases: &[],
            schemas: &schemas,
        };
        let mut f = search("x", serde_json::Value::Null, FilterOperator::Equals);
        f.cast_type = Some(crate::value::CastType::Varchar);
        let built = build_predicate(&[f], &ctx).unwrap();
        assert_eq!(built.sql, "CAST(\"t\".\"x\" AS VARCHAR) IS NULL");
        assert!(built.params.is_empty());
    }

    #[test]
    fn null_with_unsupported_operator_fails() {
        let schemas = HashMap::new();
        let ctx = PredicateContext {
            db_type: DbType::Postgres,
            base_alias: "t",
            join_aliases: &[],
            schemas: &schemas,
        };
        let mut f = search("x", serde_json::Value::Null, FilterOperator::GreaterThan);
        f.cast_type = Some(crate::value::CastType::Integer);
        assert!(build_predicate(&[f], &ctx).is_err());
    }

    #[test]
    fn combines_filters_left_associatively() {
        let schemas = HashMap::new();
        let ctx = PredicateContext {
            db_type: DbType::Postgres,
            base_alias: "t",
            join_aliases: &[],
            schemas: &schemas,
        };
        let mut f1 = search("a", json!(1), FilterOperator::Equals);
        f1.cast_type = Some(crate::value::CastType::Integer);
        f1.logical_operator = LogicalOperator::Or;
        let mut f2 = search("b", json!(2), FilterOperator::Equals);
        f2.cast_type = Some(crate::value::CastType::Integer);
        f2.logical_operator = LogicalOperator::And;
        let mut f3 = search("c", json!(3), FilterOperator::Equals);
        f3.cast_type = Some(crate::value::CastType::Integer);

        let built = build_predicate(&[f1, f2, f3], &ctx).unwrap();
        assert_eq!(
            built.sql,
            "((CAST(\"t\".\"a\" AS INTEGER) = $1 OR CAST(\"t\".\"b\" AS INTEGER) = $2) AND CAST(\"t\".\"c\" AS INTEGER) = $3)"
        );
    }

    #[test]
    fn datetime_equality_expands_to_one_second_range() {
        let schemas = HashMap::new();
        let ctx = PredicateContext {
            db_type: DbType::Postgres,
            base_alias: "t",
            join_aliases: &[],
            schemas: &schemas,
        };
        let mut f = search(
            "created_at",
            json!("2024-01-01T00:00:00"),
            FilterOperator::Equals,
        );
        f.cast_type = Some(crate::value::CastType::Timestamp);
        let built = build_predicate(&[f], &ctx).unwrap();
        assert!(built.sql.contains("BETWEEN $1 AND $2"));
        assert_eq!(built.params.len(), 2);
    }

    #[test]
    fn rejects_qualifier_outside_scope() {
        let schemas = HashMap::new();
        let ctx = PredicateContext {
            db_type: DbType::Postgres,
            base_alias: "t",
            join_aliases: &[],
            schemas: &schemas,
        };
        let mut f = search("other.col", json!(1), FilterOperator::Equals);
        f.cast_type = Some(crate::value::CastType::Integer);
        assert!(build_predicate(&[f], &ctx).is_err());
    }

    #[test]
    fn empty_filter_list_yields_no_condition() {
        let schemas = HashMap::new();
        let ctx = PredicateContext {
            db_type: DbType::Postgres,
            base_alias: "t",
            join_aliases: &[],
            schemas: &schemas,
        };
        let built = build_predicate(&[], &ctx).unwrap();
        assert!(built.is_empty());
    }
}
