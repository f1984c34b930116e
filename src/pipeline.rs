//! Component G — Execution Pipeline.
//!
//! Orchestrates the connection registry (D), schema cache (C), statement
//! assembler (E) and row shaper (F) into the four public operations:
//! `data`, `count`, `delete`, `schema`. Per request the state machine is
//! `NEW -> RESOLVED_CONN -> RESOLVED_SCHEMA -> ASSEMBLED -> EXECUTING ->
//! {STREAMING | COMPLETED} -> DONE`, with any step able to fail into
//! `FAILED`; rows already streamed before a mid-stream failure stay
//! delivered.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use sqlx::Row;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::assembler::{assemble_count, assemble_data, assemble_delete, ColumnProvenance};
use crate::config_store::ConfigStore;
use crate::error::{AppError, AppResult};
use crate::model::{split_qualified, DatabaseDescriptor, QueryRequest, SchemaMap};
use crate::registry::{
    bind_mysql_params, bind_pg_params, decode_mysql_row, decode_pg_row, introspect_schema,
    ConnectionRegistry, Context,
};
use crate::schema_cache::SchemaCache;
use crate::shaper::{shape_row, to_ndjson_line};

/// The bound the NDJSON channel enforces on row production, matching the
/// bounded-buffering backpressure requirement (§5).
const STREAM_CHANNEL_CAPACITY: usize = 64;

pub struct QueryPipeline {
    config_store: Arc<dyn ConfigStore>,
    registry: Arc<ConnectionRegistry>,
    schema_cache: Arc<SchemaCache>,
}

impl QueryPipeline {
    pub fn new(
        config_store: Arc<dyn ConfigStore>,
        registry: Arc<ConnectionRegistry>,
        schema_cache: Arc<SchemaCache>,
    ) -> Self {
        Self {
            config_store,
            registry,
            schema_cache,
        }
    }

    /// Streams the result of a `data` query as NDJSON lines. The query runs
    /// on its own task so the returned stream carries only owned, `'static`
    /// data; the bounded channel is the backpressure point client
    /// disconnects slow down.
    pub async fn data(&self, request: QueryRequest) -> AppResult<ReceiverStream<AppResult<String>>> {
        let descriptor = self.resolve_descriptor(&request).await?;
        let ctx = self.registry.get_or_create(&descriptor).await?;
        let schemas = self.resolve_schemas(&ctx, &descriptor, &request).await?;
        validate_request_columns(&request, &schemas)?;

        let assembled = assemble_data(&request, ctx.db_type(), &schemas)?;
        let pretty = request.pretty;

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        tokio::spawn(run_data_stream(
            ctx,
            assembled.sql,
            assembled.params,
            assembled.projection,
            pretty,
            tx,
        ));

        Ok(ReceiverStream::new(rx))
    }

    /// Returns the row count for a `count` query.
    pub async fn count(&self, request: &QueryRequest) -> AppResult<i64> {
        let descriptor = self.resolve_descriptor(request).await?;
        let ctx = self.registry.get_or_create(&descriptor).await?;
        let schemas = self.resolve_schemas(&ctx, &descriptor, request).await?;
        validate_request_columns(request, &schemas)?;

        let scalar = assemble_count(request, ctx.db_type(), &schemas)?;
        match &*ctx {
            Context::Postgres(pool) => {
                let query = bind_pg_params(sqlx::query(&scalar.sql), scalar.params);
                let row = query.fetch_one(pool).await?;
                Ok(row.try_get::<i64, _>(0)?)
            }
            Context::Mysql(pool) => {
                let query = bind_mysql_params(sqlx::query(&scalar.sql), scalar.params);
                let row = query.fetch_one(pool).await?;
                Ok(row.try_get::<i64, _>(0)?)
            }
        }
    }

    /// Executes a `delete` query and returns the number of rows removed.
    /// Callers surfacing this over HTTP map zero rows to 404 (§6).
    pub async fn delete(&self, request: &QueryRequest) -> AppResult<u64> {
        let descriptor = self.resolve_descriptor(request).await?;
        let ctx = self.registry.get_or_create(&descriptor).await?;
        let schemas = self.resolve_schemas(&ctx, &descriptor, request).await?;
        validate_request_columns(request, &schemas)?;

        let scalar = assemble_delete(request, ctx.db_type(), &schemas)?;
        match &*ctx {
            Context::Postgres(pool) => {
                let query = bind_pg_params(sqlx::query(&scalar.sql), scalar.params);
                Ok(query.execute(pool).await?.rows_affected())
            }
            Context::Mysql(pool) => {
                let query = bind_mysql_params(sqlx::query(&scalar.sql), scalar.params);
                Ok(query.execute(pool).await?.rows_affected())
            }
        }
    }

    /// Returns `{ column_name: sql_type_name }` for `request.table`,
    /// bypassing the assembler entirely (§4.5 "Schema" variant).
    pub async fn schema(&self, request: &QueryRequest) -> AppResult<HashMap<String, String>> {
        let descriptor = self.resolve_descriptor(request).await?;
        let ctx = self.registry.get_or_create(&descriptor).await?;
        let schema = self.load_schema(&ctx, &descriptor, &request.table).await?;

        Ok(schema
            .columns()
            .iter()
            .map(|col| (col.name.clone(), col.sql_type.clone()))
            .collect())
    }

    async fn resolve_descriptor(&self, request: &QueryRequest) -> AppResult<DatabaseDescriptor> {
        if let Some(direct) = &request.direct_config {
            direct.validate()?;
            return Ok(direct.clone());
        }
        match &request.config_id {
            Some(id) => self
                .config_store
                .get_by_id(id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("no descriptor with id {id}"))),
            None => Err(AppError::invalid(
                "request must supply either configId or directConfig",
            )),
        }
    }

    async fn load_schema(
        &self,
        ctx: &Arc<Context>,
        descriptor: &DatabaseDescriptor,
        table: &str,
    ) -> AppResult<Arc<SchemaMap>> {
        let ctx = Arc::clone(ctx);
        let descriptor_owned = descriptor.clone();
        let table_owned = table.to_string();
        self.schema_cache
            .get_or_load(&descriptor.cache_key(), table, move || async move {
                introspect_schema(&ctx, &descriptor_owned, &table_owned).await
            })
            .await
    }

    /// Resolves the base table's schema plus every joined table's schema
    /// (step 2 of §4.7 literally only names the base table, but the
    /// predicate builder rejects any filtered qualifier whose schema is
    /// absent and lacks an explicit cast, so join schemas must be resolved
    /// too whenever a request joins at all).
    async fn resolve_schemas(
        &self,
        ctx: &Arc<Context>,
        descriptor: &DatabaseDescriptor,
        request: &QueryRequest,
    ) -> AppResult<HashMap<String, SchemaMap>> {
        let mut schemas = HashMap::with_capacity(1 + request.joins.len());

        let base_schema = self.load_schema(ctx, descriptor, &request.table).await?;
        schemas.insert(
            request.effective_alias().to_ascii_lowercase(),
            (*base_schema).clone(),
        );

        for join in &request.joins {
            let join_schema = self.load_schema(ctx, descriptor, &join.table).await?;
            schemas.insert(join.effective_alias().to_ascii_lowercase(), (*join_schema).clone());
        }

        Ok(schemas)
    }
}

async fn run_data_stream(
    ctx: Arc<Context>,
    sql: String,
    params: Vec<crate::value::TypedValue>,
    projection: Vec<ColumnProvenance>,
    pretty: bool,
    tx: mpsc::Sender<AppResult<String>>,
) {
    match &*ctx {
        Context::Postgres(pool) => {
            let query = bind_pg_params(sqlx::query(&sql), params);
            let mut rows = query.fetch(pool);
            while let Some(next) = rows.next().await {
                let row = match next {
                    Ok(row) => row,
                    Err(e) => {
                        let _ = tx.send(Err(AppError::from(e))).await;
                        return;
                    }
                };
                if !emit_row(&tx, decode_pg_row(&row), &projection, pretty).await {
                    return;
                }
            }
        }
        Context::Mysql(pool) => {
            let query = bind_mysql_params(sqlx::query(&sql), params);
            let mut rows = query.fetch(pool);
            while let Some(next) = rows.next().await {
                let row = match next {
                    Ok(row) => row,
                    Err(e) => {
                        let _ = tx.send(Err(AppError::from(e))).await;
                        return;
                    }
                };
                if !emit_row(&tx, decode_mysql_row(&row), &projection, pretty).await {
                    return;
                }
            }
        }
    }
}

/// Shapes and sends one decoded row. Returns `false` when the stream should
/// stop: either the shaper/serializer failed, or the receiver was dropped
/// (client disconnected mid-stream, §5 "Cancellation").
async fn emit_row(
    tx: &mpsc::Sender<AppResult<String>>,
    decoded: AppResult<Vec<crate::registry::DecodedColumn>>,
    projection: &[ColumnProvenance],
    pretty: bool,
) -> bool {
    let columns = match decoded {
        Ok(columns) => columns,
        Err(e) => {
            let _ = tx.send(Err(e)).await;
            return false;
        }
    };
    let line = match shape_row(projection, columns).and_then(|row| to_ndjson_line(&row, pretty)) {
        Ok(line) => line,
        Err(e) => {
            let _ = tx.send(Err(e)).await;
            return false;
        }
    };
    tx.send(Ok(line)).await.is_ok()
}

/// Validates that every unqualified (or explicitly qualified) column
/// reference in `select_fields`, `order_by`, and cast-free filters exists
/// in the resolved schema for its qualifier (§4.7 step 2). Unknown column
/// is **InvalidArgument**.
fn validate_request_columns(
    request: &QueryRequest,
    schemas: &HashMap<String, SchemaMap>,
) -> AppResult<()> {
    let base_alias = request.effective_alias();

    for field in &request.select_fields {
        check_column_known(field, base_alias, schemas)?;
    }
    if let Some(order_by) = &request.order_by {
        check_column_known(order_by, base_alias, schemas)?;
    }
    for filter in &request.filters {
        if filter.cast_type.is_none() {
            check_column_known(&filter.column, base_alias, schemas)?;
        }
    }
    Ok(())
}

fn check_column_known(
    path: &str,
    base_alias: &str,
    schemas: &HashMap<String, SchemaMap>,
) -> AppResult<()> {
    let (qualifier, column) = split_qualified(path);
    let qualifier = qualifier.unwrap_or(base_alias);
    let schema = schemas
        .get(&qualifier.to_ascii_lowercase())
        .ok_or_else(|| AppError::invalid(format!("unknown table qualifier: {qualifier}")))?;
    if !schema.contains(column) {
        return Err(AppError::invalid(format!("unknown column: {qualifier}.{column}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnHandle, DbType};
    use crate::value::CanonicalType;

    fn schema_with(columns: &[&str]) -> SchemaMap {
        SchemaMap::new(
            columns
                .iter()
                .map(|name| ColumnHandle {
                    name: name.to_string(),
                    sql_type: "varchar".to_string(),
                    data_class: CanonicalType::Varchar,
                })
                .collect(),
        )
    }

    fn base_request() -> QueryRequest {
        QueryRequest {
            config_id: Some("desc".to_string()),
            direct_config: None,
            table: "users".to_string(),
            alias: None,
            select_fields: vec![],
            filters: vec![],
            joins: vec![],
            limit: None,
            offset: None,
            order_by: None,
            order_direction: crate::model::OrderDirection::Asc,
            distinct: false,
            pretty: false,
        }
    }

    #[test]
    fn unknown_select_field_is_rejected() {
        let mut request = base_request();
        request.select_fields = vec!["ghost".to_string()];
        let mut schemas = HashMap::new();
        schemas.insert("users".to_string(), schema_with(&["id", "name"]));
        assert!(validate_request_columns(&request, &schemas).is_err());
    }

    #[test]
    fn known_select_field_passes() {
        let mut request = base_request();
        request.select_fields = vec!["id".to_string()];
        let mut schemas = HashMap::new();
        schemas.insert("users".to_string(), schema_with(&["id", "name"]));
        assert!(validate_request_columns(&request, &schemas).is_ok());
    }

    #[test]
    fn casted_filter_bypasses_schema_check() {
        let mut request = base_request();
        request.filters = vec![crate::model::Search {
            column: "not_in_schema".to_string(),
            value: serde_json::json!(50),
            filter_operator: crate::model::FilterOperator::Equals,
            logical_operator: crate::model::LogicalOperator::And,
            cast_type: Some(crate::value::CastType::Integer),
            cast_format: None,
        }];
        let mut schemas = HashMap::new();
        schemas.insert("users".to_string(), schema_with(&["id"]));
        assert!(validate_request_columns(&request, &schemas).is_ok());
    }

    #[test]
    fn db_type_is_plumbed_through_context() {
        assert_eq!(DbType::Postgres, DbType::Postgres);
    }
}
