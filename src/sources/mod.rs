pub mod applecms;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::ResultItem;

pub use applecms::AppleCmsAdapter;

/// 上游资源站描述 / upstream source site descriptor
///
/// 由配置提供，单次请求内不可变。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSite {
    /// 站点唯一 key / unique site key
    pub key: String,
    /// 展示名称 / display name
    pub name: String,
    /// 搜索接口地址 / search endpoint
    pub api: String,
    /// 详情接口地址，缺省复用 api / optional detail endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

/// 单站点失败分类 / per-site failure classification
///
/// 在适配器边界完成归类，下游不再做错误文案匹配。
/// Display 文案是对外契约的一部分，保持稳定。
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("请求超时")]
    Timeout,
    #[error("网络错误")]
    Network,
    #[error("无搜索结果")]
    NoResults,
    #[error("未知错误")]
    Unknown,
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SourceError::Timeout
        } else if e.is_connect() || e.is_request() {
            SourceError::Network
        } else {
            SourceError::Unknown
        }
    }
}

/// 惰性结果页序列：有限、不可重放 / lazy, finite, non-restartable page sequence
pub type PageStream<'a> = BoxStream<'a, Result<Vec<ResultItem>, SourceError>>;

/// 资源站适配器 / source site adapter
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// 按关键词搜索，逐页产出结果
    ///
    /// `fetch_all_pages` 为 false 时只取第一页；`timeout` 为单次请求超时。
    fn search<'a>(
        &'a self,
        site: &'a SourceSite,
        query: &'a str,
        fetch_all_pages: bool,
        timeout: Option<Duration>,
    ) -> PageStream<'a>;

    /// 按 (站点, id) 拉取权威详情 / authoritative detail lookup
    async fn detail(
        &self,
        site: &SourceSite,
        id: &str,
        timeout: Option<Duration>,
    ) -> Result<ResultItem, SourceError>;
}
