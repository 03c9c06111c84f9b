//! 用户数据存储 / user data storage
//!
//! 底层是一个极简键值库抽象（get/set/remove/前缀扫描），上层按固定的
//! `#` 连接键名方案拼出播放记录、收藏、搜索历史等 CRUD。写入键值库的
//! 业务标识符一律不允许包含分隔符。

pub mod memory;
pub mod sqlite;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::models::{Favorite, PlayRecord, SkipConfig};

pub use memory::MemoryKv;
pub use sqlite::SqliteKv;

/// 键值数据库抽象 / key-value database abstraction
#[async_trait]
pub trait KvDatabase: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
    /// 前缀扫描，返回 (完整键, 值) / prefix scan
    async fn list(&self, prefix: &str) -> Result<Vec<(String, String)>>;
}

/// 键分隔符 / key delimiter
pub const KEY_DELIMITER: char = '#';

fn make_key(parts: &[&str]) -> String {
    parts.join("#")
}

/// (source, id) 组合键，沿用 `+` 连接的历史格式
fn record_key(source: &str, id: &str) -> String {
    format!("{}+{}", source, id)
}

fn ensure_safe(id: &str) -> Result<()> {
    if id.contains(KEY_DELIMITER) {
        bail!("标识符不能包含分隔符 '{}': {}", KEY_DELIMITER, id);
    }
    Ok(())
}

/// 键值存储门面 / storage façade over a KvDatabase
#[derive(Clone)]
pub struct KvStorage {
    db: Arc<dyn KvDatabase>,
}

impl KvStorage {
    pub fn new(db: Arc<dyn KvDatabase>) -> Self {
        Self { db }
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.db.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.db.set(key, &serde_json::to_string(value)?).await
    }

    /// 列出前缀下的全部记录，键去掉前缀；坏记录跳过不报错
    async fn list_json<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<(String, T)>> {
        let mut out = Vec::new();
        for (k, v) in self.db.list(prefix).await? {
            match serde_json::from_str(&v) {
                Ok(parsed) => out.push((k[prefix.len()..].to_string(), parsed)),
                Err(e) => tracing::warn!("忽略无法解析的存储记录 {}: {}", k, e),
            }
        }
        Ok(out)
    }

    // ---- 播放记录 / play records ----

    pub async fn get_play_record(
        &self,
        user: &str,
        source: &str,
        id: &str,
    ) -> Result<Option<PlayRecord>> {
        ensure_safe(user)?;
        ensure_safe(source)?;
        ensure_safe(id)?;
        self.get_json(&make_key(&["playrecord", user, &record_key(source, id)]))
            .await
    }

    pub async fn set_play_record(
        &self,
        user: &str,
        source: &str,
        id: &str,
        record: &PlayRecord,
    ) -> Result<()> {
        ensure_safe(user)?;
        ensure_safe(source)?;
        ensure_safe(id)?;
        self.set_json(&make_key(&["playrecord", user, &record_key(source, id)]), record)
            .await
    }

    pub async fn delete_play_record(&self, user: &str, source: &str, id: &str) -> Result<()> {
        ensure_safe(user)?;
        self.db
            .remove(&make_key(&["playrecord", user, &record_key(source, id)]))
            .await
    }

    /// 用户全部播放记录，键为 `source+id` 组合
    pub async fn get_all_play_records(&self, user: &str) -> Result<Vec<(String, PlayRecord)>> {
        ensure_safe(user)?;
        self.list_json(&make_key(&["playrecord", user, ""])).await
    }

    // ---- 收藏 / favorites ----

    pub async fn get_favorite(
        &self,
        user: &str,
        source: &str,
        id: &str,
    ) -> Result<Option<Favorite>> {
        ensure_safe(user)?;
        ensure_safe(source)?;
        ensure_safe(id)?;
        self.get_json(&make_key(&["favorite", user, &record_key(source, id)]))
            .await
    }

    pub async fn set_favorite(
        &self,
        user: &str,
        source: &str,
        id: &str,
        favorite: &Favorite,
    ) -> Result<()> {
        ensure_safe(user)?;
        ensure_safe(source)?;
        ensure_safe(id)?;
        self.set_json(&make_key(&["favorite", user, &record_key(source, id)]), favorite)
            .await
    }

    pub async fn delete_favorite(&self, user: &str, source: &str, id: &str) -> Result<()> {
        ensure_safe(user)?;
        self.db
            .remove(&make_key(&["favorite", user, &record_key(source, id)]))
            .await
    }

    pub async fn get_all_favorites(&self, user: &str) -> Result<Vec<(String, Favorite)>> {
        ensure_safe(user)?;
        self.list_json(&make_key(&["favorite", user, ""])).await
    }

    // ---- 搜索历史 / search history ----

    pub async fn add_search_history(&self, user: &str, keyword: &str) -> Result<()> {
        ensure_safe(user)?;
        ensure_safe(keyword)?;
        self.db
            .set(&make_key(&["search-history", user, keyword]), keyword)
            .await
    }

    pub async fn get_search_history(&self, user: &str) -> Result<Vec<String>> {
        ensure_safe(user)?;
        let prefix = make_key(&["search-history", user, ""]);
        Ok(self
            .db
            .list(&prefix)
            .await?
            .into_iter()
            .map(|(_, v)| v)
            .collect())
    }

    pub async fn delete_search_history(&self, user: &str, keyword: &str) -> Result<()> {
        ensure_safe(user)?;
        self.db
            .remove(&make_key(&["search-history", user, keyword]))
            .await
    }

    // ---- 跳过片头片尾配置 / skip configs ----

    pub async fn get_skip_config(
        &self,
        user: &str,
        source: &str,
        id: &str,
    ) -> Result<Option<SkipConfig>> {
        ensure_safe(user)?;
        ensure_safe(source)?;
        ensure_safe(id)?;
        self.get_json(&make_key(&["skip-config", user, source, id])).await
    }

    pub async fn set_skip_config(
        &self,
        user: &str,
        source: &str,
        id: &str,
        config: &SkipConfig,
    ) -> Result<()> {
        ensure_safe(user)?;
        ensure_safe(source)?;
        ensure_safe(id)?;
        self.set_json(&make_key(&["skip-config", user, source, id]), config)
            .await
    }

    pub async fn delete_skip_config(&self, user: &str, source: &str, id: &str) -> Result<()> {
        ensure_safe(user)?;
        self.db
            .remove(&make_key(&["skip-config", user, source, id]))
            .await
    }

    pub async fn get_all_skip_configs(&self, user: &str) -> Result<Vec<(String, SkipConfig)>> {
        ensure_safe(user)?;
        self.list_json(&make_key(&["skip-config", user, ""])).await
    }

    // ---- 管理配置 / admin config ----

    pub async fn get_admin_config(&self) -> Result<Option<serde_json::Value>> {
        self.get_json("admin-config").await
    }

    pub async fn set_admin_config(&self, config: &serde_json::Value) -> Result<()> {
        self.set_json("admin-config", config).await
    }

    // ---- 用户名册 / user registry ----

    pub async fn add_user(&self, user: &str) -> Result<()> {
        ensure_safe(user)?;
        self.db.set(&make_key(&["user", user]), user).await
    }

    pub async fn delete_user(&self, user: &str) -> Result<()> {
        ensure_safe(user)?;
        self.db.remove(&make_key(&["user", user])).await
    }

    pub async fn get_all_users(&self) -> Result<Vec<String>> {
        let prefix = make_key(&["user", ""]);
        Ok(self
            .db
            .list(&prefix)
            .await?
            .into_iter()
            .map(|(k, _)| k[prefix.len()..].to_string())
            .collect())
    }
}
