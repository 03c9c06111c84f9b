//! 进程内键值存储 / in-process key-value store
//!
//! 仅用于本地/单实例部署：进程启动即为空，进程间不共享。

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use super::KvDatabase;

#[derive(Default)]
pub struct MemoryKv {
    map: RwLock<BTreeMap<String, String>>,
}

#[async_trait]
impl KvDatabase for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.map.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.map.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.map.write().remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        // BTreeMap 有序，前缀区间扫描即可
        Ok(self
            .map
            .read()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
