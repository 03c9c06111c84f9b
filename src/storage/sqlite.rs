//! SQLite 键值存储 / sqlite-backed key-value store
//!
//! 多副本共享的持久化后端，建表即迁移。

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;

use super::KvDatabase;

pub struct SqliteKv {
    pool: SqlitePool,
}

impl SqliteKv {
    /// 连接并确保表结构存在 / connect and run the schema migration
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url).await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;
        tracing::info!("SQLite KV 存储就绪 / sqlite kv store ready");
        Ok(Self { pool })
    }
}

#[async_trait]
impl KvDatabase for SqliteKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM kv_store WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(v,)| v))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO kv_store (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT key, value FROM kv_store WHERE key LIKE ? ORDER BY key")
                .bind(format!("{}%", prefix))
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }
}
