//! Apple CMS V10 资源站适配器 / Apple CMS V10 source adapter
//!
//! 上游为常见的 `?ac=videolist` JSON 接口。返回字段松散（id/年份
//! 可能是数字或字符串），统一在这里收敛成 ResultItem。

use async_stream::stream;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::models::ResultItem;

use super::{PageStream, SourceAdapter, SourceError, SourceSite};

/// 未指定时的单次请求超时 / default per-request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// 搜索翻页上限，防止慢站拖垮整个请求 / page cap per search pass
const MAX_SEARCH_PAGES: u32 = 5;

pub struct AppleCmsAdapter {
    client: Client,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiPage {
    list: Vec<RawItem>,
    pagecount: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawItem {
    vod_id: Value,
    vod_name: String,
    vod_pic: String,
    vod_year: Value,
    vod_play_url: String,
    type_name: String,
}

/// 数字或字符串字段统一转文本，其余类型视为缺失
fn text_field(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// 从 vod_play_url 提取剧集地址
///
/// 格式：播放组以 `$$$` 分隔，组内各集以 `#` 分隔，每集为 `名称$地址`。
/// 只取第一个播放组，且只保留 http(s) 地址。
fn parse_episodes(play_url: &str) -> Vec<String> {
    let group = play_url.split("$$$").next().unwrap_or("");
    group
        .split('#')
        .filter_map(|ep| {
            let url = ep.rsplit('$').next().unwrap_or("").trim();
            if url.starts_with("http://") || url.starts_with("https://") {
                Some(url.to_string())
            } else {
                None
            }
        })
        .collect()
}

fn map_item(raw: RawItem, site: &SourceSite) -> ResultItem {
    ResultItem {
        id: text_field(&raw.vod_id),
        title: raw.vod_name.trim().to_string(),
        poster: raw.vod_pic,
        episodes: parse_episodes(&raw.vod_play_url),
        source: site.key.clone(),
        source_name: site.name.clone(),
        year: text_field(&raw.vod_year),
        type_name: raw.type_name,
    }
}

impl AppleCmsAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn fetch_page(
        &self,
        site: &SourceSite,
        query: &str,
        page: u32,
        timeout: Duration,
    ) -> Result<ApiPage, SourceError> {
        let url = format!(
            "{}?ac=videolist&wd={}&pg={}",
            site.api,
            urlencoding::encode(query),
            page
        );
        let resp = self.client.get(&url).timeout(timeout).send().await?;
        if !resp.status().is_success() {
            tracing::debug!("源站 {} 返回状态 {}", site.key, resp.status());
            return Err(SourceError::Network);
        }
        Ok(resp.json::<ApiPage>().await.map_err(|e| {
            tracing::debug!("源站 {} 响应解析失败: {}", site.key, e);
            SourceError::Unknown
        })?)
    }

    async fn fetch_detail(
        &self,
        site: &SourceSite,
        id: &str,
        timeout: Duration,
    ) -> Result<ResultItem, SourceError> {
        let api = site.detail.as_deref().unwrap_or(&site.api);
        let url = format!("{}?ac=videolist&ids={}", api, urlencoding::encode(id));
        let resp = self.client.get(&url).timeout(timeout).send().await?;
        if !resp.status().is_success() {
            return Err(SourceError::Network);
        }
        let page: ApiPage = resp.json().await.map_err(|_| SourceError::Unknown)?;
        page.list
            .into_iter()
            .next()
            .map(|raw| map_item(raw, site))
            .ok_or(SourceError::NoResults)
    }
}

#[async_trait]
impl SourceAdapter for AppleCmsAdapter {
    fn search<'a>(
        &'a self,
        site: &'a SourceSite,
        query: &'a str,
        fetch_all_pages: bool,
        timeout: Option<Duration>,
    ) -> PageStream<'a> {
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        Box::pin(stream! {
            let first = match self.fetch_page(site, query, 1, timeout).await {
                Ok(p) => p,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            let pagecount = first.pagecount;
            yield Ok(first.list.into_iter().map(|raw| map_item(raw, site)).collect::<Vec<_>>());

            if !fetch_all_pages {
                return;
            }
            for pg in 2..=pagecount.min(MAX_SEARCH_PAGES) {
                match self.fetch_page(site, query, pg, timeout).await {
                    Ok(p) => {
                        if p.list.is_empty() {
                            return;
                        }
                        yield Ok(p.list.into_iter().map(|raw| map_item(raw, site)).collect::<Vec<_>>());
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        })
    }

    async fn detail(
        &self,
        site: &SourceSite,
        id: &str,
        timeout: Option<Duration>,
    ) -> Result<ResultItem, SourceError> {
        self.fetch_detail(site, id, timeout.unwrap_or(DEFAULT_TIMEOUT)).await
    }
}
