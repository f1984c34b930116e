use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use super::ConfigStore;
use crate::error::{AppError, AppResult};
use crate::model::{DatabaseDescriptor, DbType};

/// SQLite-backed [`ConfigStore`]. One row per descriptor, `name` UNIQUE
/// (§4.8). The password is persisted at rest alongside the rest of the
/// descriptor — no separate secret store is in scope for this component.
pub struct SqliteConfigStore {
    pool: SqlitePool,
}

impl SqliteConfigStore {
    pub async fn connect(path: &str) -> AppResult<Self> {
        let uri = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&uri)
            .await
            .map_err(|e| AppError::internal(format!("failed to open config store: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS descriptors (
                id TEXT PRIMARY KEY,
                name TEXT UNIQUE NOT NULL,
                db_type TEXT NOT NULL,
                host TEXT NOT NULL,
                port INTEGER NOT NULL,
                database TEXT NOT NULL,
                username TEXT NOT NULL,
                password TEXT NOT NULL,
                schema_name TEXT
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| AppError::internal(format!("failed to migrate config store: {e}")))?;

        Ok(Self { pool })
    }

    fn db_type_key(db_type: DbType) -> &'static str {
        match db_type {
            DbType::Postgres => "POSTGRES",
            DbType::Mysql => "MYSQL",
        }
    }

    fn row_to_descriptor(row: &sqlx::sqlite::SqliteRow) -> AppResult<DatabaseDescriptor> {
        let db_type: String = row.try_get("db_type")?;
        Ok(DatabaseDescriptor {
            id: Some(row.try_get("id")?),
            name: row.try_get("name")?,
            db_type: DbType::parse(&db_type)?,
            host: row.try_get("host")?,
            port: row.try_get::<i64, _>("port")? as u16,
            database: row.try_get("database")?,
            username: row.try_get("username")?,
            password: row.try_get("password")?,
            schema: row.try_get("schema_name")?,
        })
    }
}

#[async_trait::async_trait]
impl ConfigStore for SqliteConfigStore {
    async fn get_by_id(&self, id: &str) -> AppResult<Option<DatabaseDescriptor>> {
        let row = sqlx::query("SELECT * FROM descriptors WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_descriptor).transpose()
    }

    async fn list_all(&self) -> AppResult<Vec<DatabaseDescriptor>> {
        let rows = sqlx::query("SELECT * FROM descriptors ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_descriptor).collect()
    }

    async fn insert(&self, mut descriptor: DatabaseDescriptor) -> AppResult<DatabaseDescriptor> {
        descriptor.validate()?;
        let id = descriptor
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let result = sqlx::query(
            r#"
            INSERT INTO descriptors
                (id, name, db_type, host, port, database, username, password, schema_name)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&descriptor.name)
        .bind(Self::db_type_key(descriptor.db_type))
        .bind(&descriptor.host)
        .bind(descriptor.port as i64)
        .bind(&descriptor.database)
        .bind(&descriptor.username)
        .bind(&descriptor.password)
        .bind(&descriptor.schema)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                descriptor.id = Some(id);
                Ok(descriptor)
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(AppError::Conflict(
                format!("a descriptor named '{}' already exists", descriptor.name),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn update(
        &self,
        id: &str,
        mut descriptor: DatabaseDescriptor,
    ) -> AppResult<Option<DatabaseDescriptor>> {
        descriptor.validate()?;
        let result = sqlx::query(
            r#"
            UPDATE descriptors SET
                name = ?, db_type = ?, host = ?, port = ?, database = ?,
                username = ?, password = ?, schema_name = ?
            WHERE id = ?
            "#,
        )
        .bind(&descriptor.name)
        .bind(Self::db_type_key(descriptor.db_type))
        .bind(&descriptor.host)
        .bind(descriptor.port as i64)
        .bind(&descriptor.database)
        .bind(&descriptor.username)
        .bind(&descriptor.password)
        .bind(&descriptor.schema)
        .bind(id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(res) if res.rows_affected() > 0 => {
                descriptor.id = Some(id.to_string());
                Ok(Some(descriptor))
            }
            Ok(_) => Ok(None),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(AppError::Conflict(
                format!("a descriptor named '{}' already exists", descriptor.name),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM descriptors WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
