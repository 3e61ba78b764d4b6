//! MySQL-protocol record store (MySQL, TiDB).
//!
//! # Responsibilities
//! - Connect eagerly at startup so a bad address fails acquisition
//! - Share one connection pool across concurrent handlers
//! - Map unique-key violations to [`StoreError::Duplicate`]

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};

use crate::config::StoreConfig;
use crate::store::{Record, RecordStore, StoreError};

const INSERT_RECORD: &str = "INSERT INTO table_records (a, B) VALUES (?, ?)";

/// Pooled connection to a MySQL-compatible database.
#[derive(Debug, Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    /// Connect using the configured credentials.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout())
            .connect_with(connect_options(config))
            .await
            .map_err(|source| StoreError::Connect {
                target: describe_target(config),
                source,
            })?;

        tracing::info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            max_connections = config.max_connections,
            "Store connection established"
        );

        Ok(Self { pool })
    }
}

fn connect_options(config: &StoreConfig) -> MySqlConnectOptions {
    let options = MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .database(&config.database);

    match config.password.as_deref() {
        Some(password) if !password.is_empty() => options.password(password),
        _ => options,
    }
}

/// `user@host:port/database`, never including the password.
fn describe_target(config: &StoreConfig) -> String {
    format!(
        "{}@{}:{}/{}",
        config.user, config.host, config.port, config.database
    )
}

#[async_trait]
impl RecordStore for MySqlStore {
    async fn insert(&self, record: &Record) -> Result<(), StoreError> {
        sqlx::query(INSERT_RECORD)
            .bind(&record.a)
            .bind(record.b)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::PoolClosed => StoreError::Closed,
                e if e
                    .as_database_error()
                    .is_some_and(|db| db.is_unique_violation()) =>
                {
                    StoreError::Duplicate(record.a.clone())
                }
                e => StoreError::Query(e),
            })?;
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        if self.pool.is_closed() {
            return Err(StoreError::Closed);
        }
        self.pool.close().await;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "mysql"
    }
}
