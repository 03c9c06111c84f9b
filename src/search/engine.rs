//! 聚合搜索引擎 / aggregated search engine
//!
//! 对每个启用的资源站并发执行「主查 + 变体备查」，站内按去重键合并，
//! 站点之间完全隔离：单站失败只产生一条失败记录，不影响其他站点。

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::models::{FailedSource, ResultItem};
use crate::sources::{SourceAdapter, SourceError, SourceSite};

use super::stream::{EventChannel, StreamEvent};
use super::yellow;
use super::zh::{dedupe_key, SearchQuery};

#[derive(Debug, Clone, Copy, Default)]
pub struct SearchOptions {
    /// 调用方指定的单次请求超时 / caller-supplied per-request timeout
    pub timeout: Option<Duration>,
    /// 关闭内容过滤 / disable the content filter
    pub disable_filter: bool,
}

/// 单站点单个查询词的一轮消费
///
/// 逐页读取适配器结果：先记录过滤前是否有原始结果，再做内容过滤与
/// 站内去重，去重后的非空页交给 `on_page`。`on_page` 返回 false 表示
/// 写端已失效，提前停止本轮消费。
async fn run_pass<F>(
    adapter: &dyn SourceAdapter,
    site: &SourceSite,
    query: &str,
    opts: SearchOptions,
    seen: &mut HashSet<String>,
    has_any: &mut bool,
    mut on_page: F,
) -> Result<(), SourceError>
where
    F: FnMut(Vec<ResultItem>) -> bool,
{
    let mut pages = adapter.search(site, query, true, opts.timeout);
    while let Some(page) = pages.next().await {
        let page = page?;
        if !page.is_empty() {
            *has_any = true;
        }

        let mut unique = Vec::new();
        for item in page {
            if !opts.disable_filter && yellow::is_yellow(&item.type_name) {
                continue;
            }
            let key = dedupe_key(&item.title, &item.year);
            if seen.insert(key) {
                unique.push(item);
            }
        }

        if !unique.is_empty() && !on_page(unique) {
            return Ok(());
        }
    }
    Ok(())
}

/// 单站点完整搜索：主查 + 逐个变体备查，返回站内去重后的结果
///
/// 所有查询轮次结束后仍无任何原始结果，按「无搜索结果」处理。
async fn search_site(
    adapter: &dyn SourceAdapter,
    site: &SourceSite,
    query: &SearchQuery,
    opts: SearchOptions,
) -> Result<Vec<ResultItem>, SourceError> {
    let mut results = Vec::new();
    let mut seen = HashSet::new();
    let mut has_any = false;

    for q in std::iter::once(query.canonical.as_str())
        .chain(query.variants.iter().map(|s| s.as_str()))
    {
        run_pass(adapter, site, q, opts, &mut seen, &mut has_any, |batch| {
            results.extend(batch);
            true
        })
        .await?;
    }

    if !has_any {
        return Err(SourceError::NoResults);
    }
    Ok(results)
}

/// 非流式聚合搜索 / buffered aggregated search
///
/// 等待所有站点结束；结果按站点列表顺序 + 站内插入顺序拼接。
pub async fn search_all_buffered(
    adapter: &dyn SourceAdapter,
    sites: &[SourceSite],
    query: &SearchQuery,
    opts: SearchOptions,
) -> (Vec<ResultItem>, Vec<FailedSource>) {
    let jobs = sites.iter().map(|site| async move {
        match search_site(adapter, site, query, opts).await {
            Ok(items) => (items, None),
            Err(e) => {
                tracing::debug!("源站 {} 搜索失败: {}", site.key, e);
                (
                    Vec::new(),
                    Some(FailedSource {
                        name: site.name.clone(),
                        key: site.key.clone(),
                        error: e.to_string(),
                    }),
                )
            }
        }
    });

    let mut results = Vec::new();
    let mut failed = Vec::new();
    for (items, failure) in join_all(jobs).await {
        results.extend(items);
        if let Some(f) = failure {
            failed.push(f);
        }
    }
    (results, failed)
}

/// 单站点流式搜索：每产出一页去重结果立即写入通道
async fn search_site_streaming(
    adapter: &dyn SourceAdapter,
    site: &SourceSite,
    query: &SearchQuery,
    opts: SearchOptions,
    chan: &EventChannel,
    cancel: &CancellationToken,
    aggregated: &Mutex<Vec<ResultItem>>,
    failures: &Mutex<Vec<FailedSource>>,
) {
    let mut seen = HashSet::new();
    let mut has_any = false;
    let mut error = None;

    for q in std::iter::once(query.canonical.as_str())
        .chain(query.variants.iter().map(|s| s.as_str()))
    {
        // 每轮查询前检查取消信号；已取消就不再打扰上游
        if cancel.is_cancelled() {
            return;
        }
        let outcome = run_pass(adapter, site, q, opts, &mut seen, &mut has_any, |batch| {
            aggregated.lock().extend(batch.iter().cloned());
            chan.write(&StreamEvent::SitePage {
                site: &site.key,
                page_results: &batch,
            })
        })
        .await;
        if let Err(e) = outcome {
            error = Some(e);
            break;
        }
    }

    let failure = match error {
        Some(e) => Some(e),
        None if !has_any => Some(SourceError::NoResults),
        None => None,
    };
    if let Some(e) = failure {
        tracing::debug!("源站 {} 搜索失败: {}", site.key, e);
        let snapshot = {
            let mut f = failures.lock();
            f.push(FailedSource {
                name: site.name.clone(),
                key: site.key.clone(),
                error: e.to_string(),
            });
            f.clone()
        };
        chan.write(&StreamEvent::Failures {
            failed_sources: &snapshot,
        });
    }
}

/// 流式聚合搜索 / incremental aggregated search
///
/// 所有站点任务结束后，依次写入失败汇总（如有）和唯一一条最终聚合
/// 事件，然后关闭通道。全局累积只做站内去重结果的简单拼接，不再做
/// 跨站去重。
pub async fn search_all_streaming(
    adapter: Arc<dyn SourceAdapter>,
    sites: Vec<SourceSite>,
    query: SearchQuery,
    opts: SearchOptions,
    chan: Arc<EventChannel>,
) {
    let cancel = chan.cancel_token();
    let aggregated = Mutex::new(Vec::new());
    let failures = Mutex::new(Vec::new());

    let jobs = sites.iter().map(|site| {
        search_site_streaming(
            adapter.as_ref(),
            site,
            &query,
            opts,
            &chan,
            &cancel,
            &aggregated,
            &failures,
        )
    });
    join_all(jobs).await;

    let failures = failures.into_inner();
    if !failures.is_empty() {
        chan.write(&StreamEvent::Failures {
            failed_sources: &failures,
        });
    }
    chan.write(&StreamEvent::Aggregate {
        aggregated_results: &aggregated.into_inner(),
    });
    chan.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    type PageScript = Vec<Result<Vec<ResultItem>, SourceError>>;

    /// 按 (站点, 查询词) 返回预设页序列的适配器
    #[derive(Default)]
    struct MockAdapter {
        pages: HashMap<(String, String), PageScript>,
        on_search: Option<Box<dyn Fn(&str, &str) + Send + Sync>>,
    }

    impl MockAdapter {
        fn with(mut self, site: &str, query: &str, script: PageScript) -> Self {
            self.pages.insert((site.to_string(), query.to_string()), script);
            self
        }
    }

    #[async_trait::async_trait]
    impl SourceAdapter for MockAdapter {
        fn search<'a>(
            &'a self,
            site: &'a SourceSite,
            query: &'a str,
            _fetch_all_pages: bool,
            _timeout: Option<Duration>,
        ) -> crate::sources::PageStream<'a> {
            if let Some(hook) = &self.on_search {
                hook(&site.key, query);
            }
            let script = self
                .pages
                .get(&(site.key.clone(), query.to_string()))
                .cloned()
                .unwrap_or_default();
            Box::pin(futures::stream::iter(script))
        }

        async fn detail(
            &self,
            _site: &SourceSite,
            _id: &str,
            _timeout: Option<Duration>,
        ) -> Result<ResultItem, SourceError> {
            Err(SourceError::NoResults)
        }
    }

    fn site(key: &str) -> SourceSite {
        SourceSite {
            key: key.to_string(),
            name: format!("{}站", key),
            api: format!("https://{}.example.com/api.php/provide/vod", key),
            detail: None,
            disabled: false,
        }
    }

    fn item(title: &str, year: &str, source: &str) -> ResultItem {
        ResultItem {
            id: "1".into(),
            title: title.into(),
            poster: String::new(),
            episodes: vec![],
            source: source.into(),
            source_name: String::new(),
            year: year.into(),
            type_name: "国产剧".into(),
        }
    }

    fn query(canonical: &str, variants: &[&str]) -> SearchQuery {
        SearchQuery {
            raw: canonical.to_string(),
            canonical: canonical.to_string(),
            variants: variants.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_variant_pass_results_merge_without_duplicates() {
        // 主查命中一条；变体备查命中同一条（写法不同）加一条新的
        let adapter = MockAdapter::default()
            .with("a", "狂飙", vec![Ok(vec![item("狂飙", "2023", "a")])])
            .with(
                "a",
                "狂飚",
                vec![Ok(vec![item("狂飚", "2023", "a"), item("风吹半夏", "2022", "a")])],
            );
        let (results, failed) =
            search_all_buffered(&adapter, &[site("a")], &query("狂飙", &["狂飚"]), SearchOptions::default())
                .await;
        assert!(failed.is_empty());
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "狂飙");
        assert_eq!(results[1].title, "风吹半夏");
    }

    #[tokio::test]
    async fn test_no_results_and_isolation() {
        // a 站全程空页，b 站正常；a 失败不影响 b
        let adapter = MockAdapter::default()
            .with("a", "三体", vec![Ok(vec![])])
            .with("b", "三体", vec![Ok(vec![item("三体", "2023", "b")])]);
        let (results, failed) = search_all_buffered(
            &adapter,
            &[site("a"), site("b")],
            &query("三体", &[]),
            SearchOptions::default(),
        )
        .await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, "b");
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].key, "a");
        assert_eq!(failed[0].error, "无搜索结果");
    }

    #[tokio::test]
    async fn test_timeout_classification() {
        let adapter = MockAdapter::default().with("a", "三体", vec![Err(SourceError::Timeout)]);
        let (results, failed) =
            search_all_buffered(&adapter, &[site("a")], &query("三体", &[]), SearchOptions::default())
                .await;
        assert!(results.is_empty());
        assert_eq!(failed[0].error, "请求超时");
    }

    #[tokio::test]
    async fn test_yellow_filter_rejects_by_category() {
        let mut flagged = item("某片", "2023", "a");
        flagged.type_name = "伦理片".into();
        let adapter = MockAdapter::default()
            .with("a", "某片", vec![Ok(vec![flagged.clone(), item("正常剧", "2023", "a")])]);

        let (results, failed) =
            search_all_buffered(&adapter, &[site("a")], &query("某片", &[]), SearchOptions::default())
                .await;
        // 命中过滤词的条目被剔除，但站点仍算成功（过滤前有原始结果）
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "正常剧");
        assert!(failed.is_empty());

        // 关闭过滤后原样返回
        let opts = SearchOptions { disable_filter: true, ..Default::default() };
        let (results, _) =
            search_all_buffered(&adapter, &[site("a")], &query("某片", &[]), opts).await;
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_buffered_order_follows_site_list() {
        let adapter = MockAdapter::default()
            .with("a", "三体", vec![Ok(vec![item("三体A", "2023", "a")])])
            .with("b", "三体", vec![Ok(vec![item("三体B", "2023", "b")])]);
        let (results, _) = search_all_buffered(
            &adapter,
            &[site("b"), site("a")],
            &query("三体", &[]),
            SearchOptions::default(),
        )
        .await;
        assert_eq!(results[0].source, "b");
        assert_eq!(results[1].source, "a");
    }

    /// 读完整个事件流并解析成 JSON 行
    async fn collect_events(
        mut rx: tokio_stream::wrappers::UnboundedReceiverStream<bytes::Bytes>,
    ) -> Vec<serde_json::Value> {
        let mut buf = Vec::new();
        while let Some(chunk) = rx.next().await {
            buf.extend_from_slice(&chunk);
        }
        String::from_utf8(buf)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_stream_ends_with_single_aggregate() {
        let adapter: Arc<dyn SourceAdapter> = Arc::new(
            MockAdapter::default()
                .with("a", "三体", vec![Ok(vec![item("三体", "2023", "a")])])
                .with("b", "三体", vec![Err(SourceError::Network)]),
        );
        let (chan, rx) = EventChannel::new(CancellationToken::new());
        search_all_streaming(
            adapter,
            vec![site("a"), site("b")],
            query("三体", &[]),
            SearchOptions::default(),
            chan,
        )
        .await;

        let events = collect_events(rx).await;
        let last = events.last().unwrap();
        // 恰好一条最终聚合事件，且在最后
        assert!(last.get("aggregatedResults").is_some());
        assert_eq!(
            events.iter().filter(|e| e.get("aggregatedResults").is_some()).count(),
            1
        );
        assert_eq!(last["aggregatedResults"][0]["title"], "三体");
        // 收尾失败汇总紧挨在聚合事件之前
        let summary = &events[events.len() - 2];
        assert_eq!(summary["failedSources"][0]["key"], "b");
        assert_eq!(summary["failedSources"][0]["error"], "网络错误");
    }

    #[tokio::test]
    async fn test_stream_without_failures_has_no_summary() {
        let adapter: Arc<dyn SourceAdapter> =
            Arc::new(MockAdapter::default().with("a", "三体", vec![Ok(vec![item("三体", "2023", "a")])]));
        let (chan, rx) = EventChannel::new(CancellationToken::new());
        search_all_streaming(
            adapter,
            vec![site("a")],
            query("三体", &[]),
            SearchOptions::default(),
            chan,
        )
        .await;

        let events = collect_events(rx).await;
        assert!(events.iter().all(|e| e.get("failedSources").is_none()));
        assert!(events.last().unwrap().get("aggregatedResults").is_some());
    }

    #[tokio::test]
    async fn test_cancellation_stops_stream_mid_run() {
        let cancel = CancellationToken::new();
        let hook_token = cancel.clone();
        // 变体备查开始前模拟客户端断开
        let adapter = MockAdapter {
            on_search: Some(Box::new(move |_site, q| {
                if q == "狂飚" {
                    hook_token.cancel();
                }
            })),
            ..Default::default()
        }
        .with("a", "狂飙", vec![Ok(vec![item("狂飙", "2023", "a")])])
        .with("a", "狂飚", vec![Ok(vec![item("别的", "2020", "a")])]);

        let (chan, rx) = EventChannel::new(cancel);
        search_all_streaming(
            Arc::new(adapter) as Arc<dyn SourceAdapter>,
            vec![site("a")],
            query("狂飙", &["狂飚"]),
            SearchOptions::default(),
            chan,
        )
        .await;

        let events = collect_events(rx).await;
        // 取消点之后没有任何事件：没有第二页，也没有最终聚合
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["pageResults"][0]["title"], "狂飙");
    }
}
