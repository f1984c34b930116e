use sqlx::mysql::MySqlPoolOptions;
use sqlx::postgres::PgPoolOptions;
use sqlx::{MySqlPool, PgPool};

use crate::error::{AppError, AppResult};
use crate::model::{DatabaseDescriptor, DbType};

/// A live, reusable SQL execution handle bound to a descriptor (Glossary:
/// *Context*). Wraps a small per-descriptor pool rather than a single
/// connection so that concurrent requests against the same descriptor can
/// stream in parallel (§9, "Connection sharing").
pub enum Context {
    Postgres(PgPool),
    Mysql(MySqlPool),
}

impl Context {
    pub async fn open(descriptor: &DatabaseDescriptor, pool_size: u32) -> AppResult<Self> {
        let url = descriptor.connection_url()?;
        match descriptor.db_type {
            DbType::Postgres => {
                let pool = PgPoolOptions::new()
                    .max_connections(pool_size)
                    .connect(&url)
                    .await
                    .map_err(|e| AppError::backend(format!("postgres connect failed: {e}")))?;
                Ok(Context::Postgres(pool))
            }
            DbType::Mysql => {
                let pool = MySqlPoolOptions::new()
                    .max_connections(pool_size)
                    .connect(&url)
                    .await
                    .map_err(|e| AppError::backend(format!("mysql connect failed: {e}")))?;
                Ok(Context::Mysql(pool))
            }
        }
    }

    /// Opens a disposable single-connection check, used to verify a
    /// descriptor before it is persisted (§4.4 "Mutation hooks").
    pub async fn verify(descriptor: &DatabaseDescriptor) -> AppResult<()> {
        let url = descriptor.connection_url()?;
        match descriptor.db_type {
            DbType::Postgres => {
                use sqlx::Connection;
                sqlx::postgres::PgConnection::connect(&url)
                    .await
                    .map_err(|e| AppError::backend(format!("postgres connect failed: {e}")))?;
            }
            DbType::Mysql => {
                use sqlx::Connection;
                sqlx::mysql::MySqlConnection::connect(&url)
                    .await
                    .map_err(|e| AppError::backend(format!("mysql connect failed: {e}")))?;
            }
        }
        Ok(())
    }

    pub fn db_type(&self) -> DbType {
        match self {
            Context::Postgres(_) => DbType::Postgres,
            Context::Mysql(_) => DbType::Mysql,
        }
    }
}
