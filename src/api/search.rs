//! 聚合搜索接口 / aggregated search endpoint
//!
//! 兼容流式与非流式两种响应；为避免中间层缓存干扰，
//! 搜索响应一律 no-store。

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use lumitv_backend::config;
use lumitv_backend::search::{
    search_all_buffered, search_all_streaming, EventChannel, SearchOptions, SearchQuery,
};

use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: Option<String>,
    /// "0" 强制非流式，其余值强制流式，缺省走浏览器判定
    #[serde(default)]
    pub stream: Option<String>,
    /// 下游超时（秒）/ downstream timeout in seconds
    #[serde(default)]
    pub timeout: Option<String>,
    /// 逗号分隔的站点 key 白名单 / comma-separated site allow-list
    #[serde(default)]
    pub sources: Option<String>,
}

/// 浏览器类客户端判定：携带任一 sec-fetch-* 请求头
fn is_browser_like(headers: &HeaderMap) -> bool {
    headers.contains_key("sec-fetch-mode")
        || headers.contains_key("sec-fetch-dest")
        || headers.contains_key("sec-fetch-site")
}

fn stream_enabled(param: Option<&str>, browser_like: bool) -> bool {
    match param {
        Some(p) => p != "0",
        None => browser_like,
    }
}

fn parse_timeout(param: Option<&str>) -> Option<Duration> {
    param?.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// 搜索响应统一加禁缓存头
fn json_no_store(body: String) -> Response {
    no_store_builder().body(Body::from(body)).unwrap()
}

fn no_store_builder() -> axum::http::response::Builder {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json; charset=utf-8")
        .header(header::CACHE_CONTROL, "no-store, no-cache, must-revalidate")
        .header(header::PRAGMA, "no-cache")
        .header(header::EXPIRES, "0")
}

/// GET /api/search - 聚合搜索
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
    headers: HeaderMap,
) -> Response {
    let raw_query = params.q.unwrap_or_default();
    let browser_like = is_browser_like(&headers);
    let enable_stream = stream_enabled(params.stream.as_deref(), browser_like);
    let timeout = parse_timeout(params.timeout.as_deref());

    let cfg = config::config();
    let mut sites = cfg.enabled_sources();
    if let Some(selected) = params.sources.as_deref() {
        let allowed: Vec<&str> = selected.split(',').collect();
        sites.retain(|s| allowed.contains(&s.key.as_str()));
    }

    // 空查询直接短路：不做转换，也不碰任何上游
    if raw_query.trim().is_empty() {
        return json_no_store(json!({ "results": [] }).to_string());
    }

    let query = SearchQuery::resolve(&state.converter, &raw_query).await;
    let opts = SearchOptions {
        timeout,
        disable_filter: cfg.site.disable_yellow_filter,
    };

    if !enable_stream {
        let (results, failed) =
            search_all_buffered(state.adapter.as_ref(), &sites, &query, opts).await;
        // 响应体键名因客户端类型而异，这是历史兼容契约
        let body = if browser_like {
            json!({ "aggregatedResults": results, "failedSources": failed })
        } else {
            json!({ "results": results, "failedSources": failed })
        };
        return json_no_store(body.to_string());
    }

    // 流式：事件通道产出 NDJSON，客户端断开后写入自动失效
    let cancel = CancellationToken::new();
    let (chan, body_stream) = EventChannel::new(cancel.clone());
    let adapter = state.adapter.clone();
    tokio::spawn(async move {
        // 任务结束时触发取消，让通道监听任务退出
        let _done = cancel.drop_guard();
        search_all_streaming(adapter, sites, query, opts, chan).await;
    });

    no_store_builder()
        .body(Body::from_stream(
            body_stream.map(Ok::<_, std::convert::Infallible>),
        ))
        .unwrap()
}
