//! Component E — Statement Assembler.
//!
//! Builds the SQL text and bound parameters for the three query-shaped
//! operations (data/count/delete) from an already-validated [`QueryRequest`]
//! plus the schema maps the pipeline resolved for every table in scope.
//!
//! Because a bare `SELECT *` only ever projects the base table's own
//! columns (§4.5), this module always has complete, request-time knowledge
//! of each projected output column's source qualifier. It threads that as
//! [`ColumnProvenance`] alongside the statement so the row shaper (F) never
//! needs driver-reported per-column source-table metadata.

use std::collections::HashMap;

use crate::dialect;
use crate::error::{AppError, AppResult};
use crate::model::{
    split_qualified, DbType, JoinRequest, JoinType, OrderDirection, QueryRequest, SchemaMap,
};
use crate::predicate::{build_predicate, PredicateContext};
use crate::value::TypedValue;

/// Which table/alias a projected output column was read from, tracked in
/// projection order.
#[derive(Debug, Clone)]
pub struct ColumnProvenance {
    pub qualifier: String,
    pub column: String,
}

pub struct AssembledStatement {
    pub sql: String,
    pub params: Vec<TypedValue>,
    pub projection: Vec<ColumnProvenance>,
}

pub struct ScalarStatement {
    pub sql: String,
    pub params: Vec<TypedValue>,
}

/// Assembles `SELECT ... FROM ... [JOIN ...] [WHERE ...] [ORDER BY ...]
/// [LIMIT ...]`.
pub fn assemble_data(
    request: &QueryRequest,
    db_type: DbType,
    schemas: &HashMap<String, SchemaMap>,
) -> AppResult<AssembledStatement> {
    validate_joins(&request.joins)?;

    let base_alias = request.effective_alias();
    let (select_sql, projection) = build_projection(request, db_type, schemas)?;
    let from_sql = build_from_clause(request, db_type)?;
    let predicate = build_where(request, db_type, base_alias, schemas)?;

    let mut sql = format!("{select_sql} FROM {from_sql}");
    if !predicate.is_empty() {
        sql.push_str(&format!(" WHERE {}", predicate.sql));
    }
    if let Some(order_by) = &request.order_by {
        sql.push_str(" ORDER BY ");
        sql.push_str(&order_by_clause(order_by, request.order_direction, db_type, base_alias)?);
    }
    apply_limit_offset(&mut sql, request);

    Ok(AssembledStatement {
        sql,
        params: predicate.params,
        projection,
    })
}

/// Assembles `SELECT COUNT(*) FROM ...` — projection, ORDER BY, LIMIT and
/// OFFSET are dropped (§4.5 "Variants").
pub fn assemble_count(
    request: &QueryRequest,
    db_type: DbType,
    schemas: &HashMap<String, SchemaMap>,
) -> AppResult<ScalarStatement> {
    validate_joins(&request.joins)?;

    let base_alias = request.effective_alias();
    let from_sql = build_from_clause(request, db_type)?;
    let predicate = build_where(request, db_type, base_alias, schemas)?;

    let mut sql = format!("SELECT COUNT(*) FROM {from_sql}");
    if !predicate.is_empty() {
        sql.push_str(&format!(" WHERE {}", predicate.sql));
    }

    Ok(ScalarStatement {
        sql,
        params: predicate.params,
    })
}

/// Assembles `DELETE FROM base WHERE ...`. No joins, ordering or pagination
/// even if present on the request; rejects an empty predicate before any
/// SQL is built (Testable Property 3).
pub fn assemble_delete(
    request: &QueryRequest,
    db_type: DbType,
    schemas: &HashMap<String, SchemaMap>,
) -> AppResult<ScalarStatement> {
    if request.filters.is_empty() {
        return Err(AppError::invalid("DELETE requires at least one filter"));
    }

    let base_alias = request.effective_alias();
    let pred_ctx = PredicateContext {
        db_type,
        base_alias,
        join_aliases: &[],
        schemas,
    };
    let predicate = build_predicate(&request.filters, &pred_ctx)?;
    if predicate.is_empty() {
        return Err(AppError::invalid("DELETE requires at least one filter"));
    }

    let base = base_table_term(request, db_type)?;
    Ok(ScalarStatement {
        sql: format!("DELETE FROM {base} WHERE {}", predicate.sql),
        params: predicate.params,
    })
}

fn base_table_term(request: &QueryRequest, db_type: DbType) -> AppResult<String> {
    let table = dialect::quote_ident(db_type, &request.table)?;
    match &request.alias {
        Some(alias) => Ok(format!("{table} AS {}", dialect::quote_ident(db_type, alias)?)),
        None => Ok(table),
    }
}

fn build_projection(
    request: &QueryRequest,
    db_type: DbType,
    schemas: &HashMap<String, SchemaMap>,
) -> AppResult<(String, Vec<ColumnProvenance>)> {
    let keyword = if request.distinct { "SELECT DISTINCT" } else { "SELECT" };
    let base_alias = request.effective_alias();

    if request.select_fields.is_empty() {
        let mut projection = Vec::new();
        for qualifier in std::iter::once(base_alias)
            .chain(request.joins.iter().map(|j| j.effective_alias()))
        {
            let schema = schemas
                .get(&qualifier.to_ascii_lowercase())
                .ok_or_else(|| AppError::internal("table schema missing during assembly"))?;
            projection.extend(schema.columns().iter().map(|col| ColumnProvenance {
                qualifier: qualifier.to_string(),
                column: col.name.clone(),
            }));
        }
        return Ok((format!("{keyword} *"), projection));
    }

    let mut fragments = Vec::with_capacity(request.select_fields.len());
    let mut projection = Vec::with_capacity(request.select_fields.len());
    for field in &request.select_fields {
        let (qualifier, column) = split_qualified(field);
        let qualifier = qualifier.unwrap_or(base_alias);
        fragments.push(format!(
            "{}.{}",
            dialect::quote_ident(db_type, qualifier)?,
            dialect::quote_ident(db_type, column)?
        ));
        projection.push(ColumnProvenance {
            qualifier: qualifier.to_string(),
            column: column.to_string(),
        });
    }

    Ok((format!("{keyword} {}", fragments.join(", ")), projection))
}

fn build_from_clause(request: &QueryRequest, db_type: DbType) -> AppResult<String> {
    let mut from_sql = base_table_term(request, db_type)?;
    for join in &request.joins {
        from_sql.push(' ');
        from_sql.push_str(&join_clause(join, db_type)?);
    }
    Ok(from_sql)
}

fn join_clause(join: &JoinRequest, db_type: DbType) -> AppResult<String> {
    if join.on_left.len() != join.on_right.len() || join.on_left.is_empty() {
        return Err(AppError::invalid("join on_left/on_right must be non-empty and equal length"));
    }

    let keyword = match join.join_type {
        JoinType::Inner => "INNER JOIN",
        JoinType::Left => "LEFT JOIN",
        JoinType::Right => "RIGHT JOIN",
    };

    let table = dialect::quote_ident(db_type, &join.table)?;
    let table_term = match &join.alias {
        Some(alias) => format!("{table} AS {}", dialect::quote_ident(db_type, alias)?),
        None => table,
    };

    let mut conditions = Vec::with_capacity(join.on_left.len());
    for (left, right) in join.on_left.iter().zip(join.on_right.iter()) {
        conditions.push(format!(
            "{} = {}",
            quote_join_path(left, db_type)?,
            quote_join_path(right, db_type)?
        ));
    }

    Ok(format!("{keyword} {table_term} ON {}", conditions.join(" AND ")))
}

fn quote_join_path(path: &str, db_type: DbType) -> AppResult<String> {
    let (qualifier, column) = split_qualified(path);
    let qualifier = qualifier.ok_or_else(|| {
        AppError::invalid(format!("join path must be qualified as 'table.column': {path}"))
    })?;
    Ok(format!(
        "{}.{}",
        dialect::quote_ident(db_type, qualifier)?,
        dialect::quote_ident(db_type, column)?
    ))
}

fn validate_joins(joins: &[JoinRequest]) -> AppResult<()> {
    let right_joins = joins.iter().filter(|j| j.join_type == JoinType::Right).count();
    if right_joins > 0 && joins.len() > 1 {
        return Err(AppError::invalid(
            "a RIGHT join cannot be combined with other joins in the same query",
        ));
    }
    Ok(())
}

fn build_where(
    request: &QueryRequest,
    db_type: DbType,
    base_alias: &str,
    schemas: &HashMap<String, SchemaMap>,
) -> AppResult<crate::predicate::BuiltPredicate> {
    let join_aliases: Vec<String> = request
        .joins
        .iter()
        .map(|j| j.effective_alias().to_string())
        .collect();
    let pred_ctx = PredicateContext {
        db_type,
        base_alias,
        join_aliases: &join_aliases,
        schemas,
    };
    build_predicate(&request.filters, &pred_ctx)
}

fn order_by_clause(
    path: &str,
    direction: OrderDirection,
    db_type: DbType,
    base_alias: &str,
) -> AppResult<String> {
    let (qualifier, column) = split_qualified(path);
    let qualifier = qualifier.unwrap_or(base_alias);
    let dir = match direction {
        OrderDirection::Asc => "ASC",
        OrderDirection::Desc => "DESC",
    };
    Ok(format!(
        "{}.{} {dir}",
        dialect::quote_ident(db_type, qualifier)?,
        dialect::quote_ident(db_type, column)?
    ))
}

fn apply_limit_offset(sql: &mut String, request: &QueryRequest) {
    if let Some(limit) = request.limit {
        if limit > 0 {
            sql.push_str(&format!(" LIMIT {limit}"));
            if let Some(offset) = request.offset {
                if offset > 0 {
                    sql.push_str(&format!(" OFFSET {offset}"));
                }
            }
        }
    }
}
