//! Schema introspection and row decoding for the two supported backends.
//!
//! Column type dispatch follows the same shape as a JDBC-style per-row
//! decoder: match on the backend's own reported type name
//! (`sqlx::TypeInfo::name`) rather than trying a fixed Rust type in
//! sequence, so a column's declared SQL type and its decoded JSON
//! representation come from the same source of truth.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{Column, Row, TypeInfo};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::model::{ColumnHandle, DatabaseDescriptor, SchemaMap};
use crate::registry::Context;
use crate::value::{CanonicalType, TypedValue};

/// One decoded output column: its own name (for the shaper's
/// first-occurrence/qualifier disambiguation) and its JSON value.
pub struct DecodedColumn {
    pub name: String,
    pub value: Value,
}

/// Finds `table` case-insensitively in `ctx`'s backend and returns its
/// ordered column list (§4.3). When `descriptor.schema` is set, introspection
/// is scoped to that schema instead of scanning every non-system schema
/// (Postgres) or falling back to the connection's default database (MySQL).
pub async fn introspect_schema(
    ctx: &Context,
    descriptor: &DatabaseDescriptor,
    table: &str,
) -> AppResult<SchemaMap> {
    match ctx {
        Context::Postgres(pool) => {
            introspect_postgres(pool, table, descriptor.schema.as_deref()).await
        }
        Context::Mysql(pool) => introspect_mysql(pool, table, descriptor.schema.as_deref()).await,
    }
}

async fn introspect_postgres(
    pool: &sqlx::PgPool,
    table: &str,
    schema: Option<&str>,
) -> AppResult<SchemaMap> {
    let rows = match schema {
        Some(schema) => {
            sqlx::query(
                r#"
                SELECT c.column_name, c.data_type
                FROM information_schema.columns c
                JOIN information_schema.tables t
                    ON t.table_catalog = c.table_catalog
                    AND t.table_schema = c.table_schema
                    AND t.table_name = c.table_name
                WHERE t.table_schema = $1
                    AND lower(t.table_name) = lower($2)
                ORDER BY c.ordinal_position
                "#,
            )
            .bind(schema)
            .bind(table)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(
                r#"
                SELECT c.column_name, c.data_type
                FROM information_schema.columns c
                JOIN information_schema.tables t
                    ON t.table_catalog = c.table_catalog
                    AND t.table_schema = c.table_schema
                    AND t.table_name = c.table_name
                WHERE t.table_schema NOT IN ('information_schema', 'pg_catalog')
                    AND lower(t.table_name) = lower($1)
                ORDER BY c.ordinal_position
                "#,
            )
            .bind(table)
            .fetch_all(pool)
            .await?
        }
    };

    if rows.is_empty() {
        return Err(AppError::not_found(format!("table not found: {table}")));
    }

    let columns = rows
        .into_iter()
        .map(|row| {
            let name: String = row.try_get("column_name")?;
            let sql_type: String = row.try_get("data_type")?;
            let data_class = sql_type_to_canonical(&sql_type);
            Ok(ColumnHandle {
                name,
                sql_type,
                data_class,
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

    Ok(SchemaMap::new(columns))
}

async fn introspect_mysql(
    pool: &sqlx::MySqlPool,
    table: &str,
    schema: Option<&str>,
) -> AppResult<SchemaMap> {
    let rows = match schema {
        Some(schema) => {
            sqlx::query(
                r#"
                SELECT column_name, data_type
                FROM information_schema.columns
                WHERE table_schema = ?
                    AND lower(table_name) = lower(?)
                ORDER BY ordinal_position
                "#,
            )
            .bind(schema)
            .bind(table)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(
                r#"
                SELECT column_name, data_type
                FROM information_schema.columns
                WHERE table_schema = DATABASE()
                    AND lower(table_name) = lower(?)
                ORDER BY ordinal_position
                "#,
            )
            .bind(table)
            .fetch_all(pool)
            .await?
        }
    };

    if rows.is_empty() {
        return Err(AppError::not_found(format!("table not found: {table}")));
    }

    let columns = rows
        .into_iter()
        .map(|row| {
            let name: String = row.try_get("column_name")?;
            let sql_type: String = row.try_get("data_type")?;
            let data_class = sql_type_to_canonical(&sql_type);
            Ok(ColumnHandle {
                name,
                sql_type,
                data_class,
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

    Ok(SchemaMap::new(columns))
}

/// Maps a backend-reported `information_schema.columns.data_type` string
/// to the canonical SQL type vocabulary used by coercion and casts.
fn sql_type_to_canonical(sql_type: &str) -> CanonicalType {
    match sql_type.to_ascii_lowercase().as_str() {
        "smallint" | "integer" | "int" | "int4" | "int2" | "mediumint" | "tinyint" => {
            CanonicalType::Integer
        }
        "bigint" | "int8" => CanonicalType::Bigint,
        "numeric" | "decimal" | "real" | "double precision" | "float" | "double" => {
            CanonicalType::Decimal
        }
        "boolean" | "bool" => CanonicalType::Boolean,
        "character" | "char" | "bpchar" => CanonicalType::Char,
        "character varying" | "varchar" | "text" | "mediumtext" | "longtext" | "tinytext" => {
            CanonicalType::Varchar
        }
        "date" => CanonicalType::LocalDate,
        "time" | "time without time zone" => CanonicalType::LocalTime,
        "timestamp" | "timestamp without time zone" | "timestamp with time zone" | "datetime" => {
            CanonicalType::LocalDateTime
        }
        "uuid" => CanonicalType::Uuid,
        "json" => CanonicalType::Json,
        "jsonb" => CanonicalType::Jsonb,
        _ => CanonicalType::Varchar,
    }
}

/// Decodes every column of a PostgreSQL row into JSON, in result order.
pub fn decode_pg_row(row: &sqlx::postgres::PgRow) -> AppResult<Vec<DecodedColumn>> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let value = decode_pg_value(row, i, col.type_info().name())?;
            Ok(DecodedColumn {
                name: col.name().to_string(),
                value,
            })
        })
        .collect()
}

fn decode_pg_value(row: &sqlx::postgres::PgRow, i: usize, type_name: &str) -> AppResult<Value> {
    let decode_err = |e: sqlx::Error| AppError::backend(format!("row decode failed: {e}"));
    match type_name {
        "BOOL" => Ok(opt_to_value(row.try_get::<Option<bool>, _>(i).map_err(decode_err)?)),
        "INT2" => Ok(num_opt(row.try_get::<Option<i16>, _>(i).map_err(decode_err)?)),
        "INT4" => Ok(num_opt(row.try_get::<Option<i32>, _>(i).map_err(decode_err)?)),
        "INT8" => Ok(num_opt(row.try_get::<Option<i64>, _>(i).map_err(decode_err)?)),
        "FLOAT4" => Ok(float_opt(row.try_get::<Option<f32>, _>(i).map_err(decode_err)?)),
        "FLOAT8" => Ok(float_opt(row.try_get::<Option<f64>, _>(i).map_err(decode_err)?)),
        "NUMERIC" => Ok(decimal_opt(row.try_get::<Option<Decimal>, _>(i).map_err(decode_err)?)),
        "DATE" => Ok(date_opt(row.try_get::<Option<NaiveDate>, _>(i).map_err(decode_err)?)),
        "TIME" => Ok(time_opt(row.try_get::<Option<NaiveTime>, _>(i).map_err(decode_err)?)),
        "TIMESTAMP" => Ok(datetime_opt(
            row.try_get::<Option<NaiveDateTime>, _>(i).map_err(decode_err)?,
        )),
        "TIMESTAMPTZ" => Ok(datetime_tz_opt(
            row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(i)
                .map_err(decode_err)?,
        )),
        "UUID" => Ok(uuid_opt(row.try_get::<Option<Uuid>, _>(i).map_err(decode_err)?)),
        "JSON" | "JSONB" => Ok(row
            .try_get::<Option<Value>, _>(i)
            .map_err(decode_err)?
            .unwrap_or(Value::Null)),
        _ => Ok(opt_to_value(row.try_get::<Option<String>, _>(i).map_err(decode_err)?)),
    }
}

/// Decodes every column of a MySQL row into JSON, in result order.
pub fn decode_mysql_row(row: &sqlx::mysql::MySqlRow) -> AppResult<Vec<DecodedColumn>> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let value = decode_mysql_value(row, i, col.type_info().name())?;
            Ok(DecodedColumn {
                name: col.name().to_string(),
                value,
            })
        })
        .collect()
}

fn decode_mysql_value(row: &sqlx::mysql::MySqlRow, i: usize, type_name: &str) -> AppResult<Value> {
    let decode_err = |e: sqlx::Error| AppError::backend(format!("row decode failed: {e}"));
    match type_name {
        "BOOLEAN" | "TINYINT(1)" => {
            Ok(opt_to_value(row.try_get::<Option<bool>, _>(i).map_err(decode_err)?))
        }
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" => {
            Ok(num_opt(row.try_get::<Option<i32>, _>(i).map_err(decode_err)?))
        }
        "BIGINT" => Ok(num_opt(row.try_get::<Option<i64>, _>(i).map_err(decode_err)?)),
        "FLOAT" => Ok(float_opt(row.try_get::<Option<f32>, _>(i).map_err(decode_err)?)),
        "DOUBLE" => Ok(float_opt(row.try_get::<Option<f64>, _>(i).map_err(decode_err)?)),
        "DECIMAL" => Ok(decimal_opt(row.try_get::<Option<Decimal>, _>(i).map_err(decode_err)?)),
        "DATE" => Ok(date_opt(row.try_get::<Option<NaiveDate>, _>(i).map_err(decode_err)?)),
        "TIME" => Ok(time_opt(row.try_get::<Option<NaiveTime>, _>(i).map_err(decode_err)?)),
        "DATETIME" | "TIMESTAMP" => Ok(datetime_opt(
            row.try_get::<Option<NaiveDateTime>, _>(i).map_err(decode_err)?,
        )),
        "JSON" => {
            let raw = row.try_get::<Option<String>, _>(i).map_err(decode_err)?;
            Ok(match raw {
                None => Value::Null,
                Some(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
            })
        }
        _ => Ok(opt_to_value(row.try_get::<Option<String>, _>(i).map_err(decode_err)?)),
    }
}

fn opt_to_value<T: Into<Value>>(v: Option<T>) -> Value {
    v.map(Into::into).unwrap_or(Value::Null)
}

fn num_opt<T: Into<serde_json::Number>>(v: Option<T>) -> Value {
    v.map(|n| Value::Number(n.into())).unwrap_or(Value::Null)
}

fn float_opt<T: Into<f64>>(v: Option<T>) -> Value {
    match v {
        None => Value::Null,
        Some(f) => serde_json::Number::from_f64(f.into())
            .map(Value::Number)
            .unwrap_or(Value::Null),
    }
}

fn decimal_opt(v: Option<Decimal>) -> Value {
    v.map(|d| Value::String(d.to_string())).unwrap_or(Value::Null)
}

fn date_opt(v: Option<NaiveDate>) -> Value {
    v.map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
        .unwrap_or(Value::Null)
}

fn time_opt(v: Option<NaiveTime>) -> Value {
    v.map(|t| Value::String(t.format("%H:%M:%S").to_string()))
        .unwrap_or(Value::Null)
}

fn datetime_opt(v: Option<NaiveDateTime>) -> Value {
    v.map(|dt| Value::String(dt.format("%Y-%m-%dT%H:%M:%S").to_string()))
        .unwrap_or(Value::Null)
}

fn datetime_tz_opt(v: Option<chrono::DateTime<chrono::Utc>>) -> Value {
    v.map(|dt| Value::String(dt.to_rfc3339())).unwrap_or(Value::Null)
}

fn uuid_opt(v: Option<Uuid>) -> Value {
    v.map(|u| Value::String(u.to_string())).unwrap_or(Value::Null)
}

/// Binds a coerced parameter list onto a PostgreSQL query in order.
/// `TypedValue::Null` never reaches here in practice — the predicate
/// builder rewrites EQUALS/NOT_EQUALS-against-null to `IS [NOT] NULL`
/// with no placeholder — but binding `Option::None` keeps this total.
pub fn bind_pg_params<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    params: Vec<TypedValue>,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    for param in params {
        query = match param {
            TypedValue::Null => query.bind(None::<String>),
            TypedValue::Varchar(s) | TypedValue::Char(s) => query.bind(s),
            TypedValue::Integer(i) => query.bind(i),
            TypedValue::Bigint(i) => query.bind(i),
            TypedValue::Decimal(d) => query.bind(d),
            TypedValue::Boolean(b) => query.bind(b),
            TypedValue::LocalDate(d) => query.bind(d),
            TypedValue::LocalTime(t) => query.bind(t),
            TypedValue::LocalDateTime(dt) => query.bind(dt),
            TypedValue::Uuid(u) => query.bind(u),
            TypedValue::Json(s) | TypedValue::Jsonb(s) => {
                let v: Value = serde_json::from_str(&s).unwrap_or(Value::String(s));
                query.bind(v)
            }
        };
    }
    query
}

/// Binds a coerced parameter list onto a MySQL query in order.
pub fn bind_mysql_params<'q>(
    mut query: sqlx::query::Query<'q, sqlx::MySql, sqlx::mysql::MySqlArguments>,
    params: Vec<TypedValue>,
) -> sqlx::query::Query<'q, sqlx::MySql, sqlx::mysql::MySqlArguments> {
    for param in params {
        query = match param {
            TypedValue::Null => query.bind(None::<String>),
            TypedValue::Varchar(s) | TypedValue::Char(s) => query.bind(s),
            TypedValue::Integer(i) => query.bind(i),
            TypedValue::Bigint(i) => query.bind(i),
            TypedValue::Decimal(d) => query.bind(d),
            TypedValue::Boolean(b) => query.bind(b),
            TypedValue::LocalDate(d) => query.bind(d),
            TypedValue::LocalTime(t) => query.bind(t),
            TypedValue::LocalDateTime(dt) => query.bind(dt),
            TypedValue::Uuid(u) => query.bind(u.to_string()),
            TypedValue::Json(s) | TypedValue::Jsonb(s) => {
                let v: Value = serde_json::from_str(&s).unwrap_or(Value::String(s));
                query.bind(v)
            }
        };
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_common_sql_types_to_canonical() {
        assert_eq!(sql_type_to_canonical("integer"), CanonicalType::Integer);
        assert_eq!(sql_type_to_canonical("character varying"), CanonicalType::Varchar);
        assert_eq!(sql_type_to_canonical("timestamp without time zone"), CanonicalType::LocalDateTime);
        assert_eq!(sql_type_to_canonical("jsonb"), CanonicalType::Jsonb);
        assert_eq!(sql_type_to_canonical("uuid"), CanonicalType::Uuid);
    }

    #[test]
    fn unknown_sql_type_falls_back_to_varchar() {
        assert_eq!(sql_type_to_canonical("some_custom_enum"), CanonicalType::Varchar);
    }
}
