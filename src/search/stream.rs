//! 流式搜索事件通道 / line-delimited search event channel
//!
//! 单向通道：生产侧逐条写入 JSON 事件并以换行结尾，消费侧作为
//! HTTP 响应体增量读取。停止或客户端断开后写入被丢弃并返回失败，
//! 不抛错；取消信号触发后写端最多关闭一次。

use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::models::{FailedSource, ResultItem};

/// 流式事件，字段名是对外契约 / stream events, field names are wire contract
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum StreamEvent<'a> {
    /// 单站点单次查询的一页增量结果
    SitePage {
        site: &'a str,
        #[serde(rename = "pageResults")]
        page_results: &'a [ResultItem],
    },
    /// 失败来源快照（运行中）或汇总（收尾）
    Failures {
        #[serde(rename = "failedSources")]
        failed_sources: &'a [FailedSource],
    },
    /// 最终聚合结果，关闭前恰好一条
    Aggregate {
        #[serde(rename = "aggregatedResults")]
        aggregated_results: &'a [ResultItem],
    },
}

pub struct EventChannel {
    tx: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
    stopped: AtomicBool,
    cancel: CancellationToken,
}

impl EventChannel {
    /// 创建通道，返回写端和给响应体用的字节流
    ///
    /// 取消信号触发时关闭写端（幂等）。
    pub fn new(cancel: CancellationToken) -> (Arc<Self>, UnboundedReceiverStream<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let chan = Arc::new(Self {
            tx: Mutex::new(Some(tx)),
            stopped: AtomicBool::new(false),
            cancel,
        });
        let watch = chan.clone();
        tokio::spawn(async move {
            watch.cancel.cancelled().await;
            watch.close();
        });
        (chan, UnboundedReceiverStream::new(rx))
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 写入一条事件并换行
    ///
    /// 停止、已取消或消费端断开时丢弃写入并返回 false，不抛错。
    /// 发送失败意味着消费端已断开，顺带触发取消让挂起点尽快退出。
    pub fn write(&self, event: &StreamEvent<'_>) -> bool {
        if self.stopped.load(Ordering::SeqCst) || self.cancel.is_cancelled() {
            return false;
        }
        let mut line = match serde_json::to_vec(event) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("流式事件序列化失败: {}", e);
                return false;
            }
        };
        line.push(b'\n');

        let guard = self.tx.lock();
        let Some(tx) = guard.as_ref() else {
            return false;
        };
        if tx.send(Bytes::from(line)).is_err() {
            self.stopped.store(true, Ordering::SeqCst);
            self.cancel.cancel();
            return false;
        }
        true
    }

    /// 关闭写端，幂等 / close the write side, idempotent
    pub fn close(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.tx.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    fn item(title: &str) -> ResultItem {
        ResultItem {
            id: "1".into(),
            title: title.into(),
            poster: String::new(),
            episodes: vec![],
            source: "demo".into(),
            source_name: "演示站".into(),
            year: "2023".into(),
            type_name: String::new(),
        }
    }

    #[tokio::test]
    async fn test_events_are_newline_delimited_json() {
        let (chan, mut rx) = EventChannel::new(CancellationToken::new());
        let items = vec![item("狂飙")];
        assert!(chan.write(&StreamEvent::SitePage {
            site: "demo",
            page_results: &items,
        }));
        chan.close();

        let line = rx.next().await.unwrap();
        let text = String::from_utf8(line.to_vec()).unwrap();
        assert!(text.ends_with('\n'));
        let parsed: serde_json::Value = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(parsed["site"], "demo");
        assert_eq!(parsed["pageResults"][0]["title"], "狂飙");
        // 关闭后流应当结束
        assert!(rx.next().await.is_none());
    }

    #[tokio::test]
    async fn test_write_after_close_is_dropped() {
        let (chan, mut rx) = EventChannel::new(CancellationToken::new());
        chan.close();
        chan.close(); // 双重关闭无害
        assert!(!chan.write(&StreamEvent::Failures { failed_sources: &[] }));
        assert!(rx.next().await.is_none());
    }

    #[tokio::test]
    async fn test_cancellation_stops_writes() {
        let cancel = CancellationToken::new();
        let (chan, mut rx) = EventChannel::new(cancel.clone());
        assert!(chan.write(&StreamEvent::Failures { failed_sources: &[] }));
        cancel.cancel();
        // 取消后写入一律失败
        assert!(!chan.write(&StreamEvent::Failures { failed_sources: &[] }));
        assert!(rx.next().await.is_some());
        assert!(rx.next().await.is_none());
    }

    #[tokio::test]
    async fn test_receiver_drop_reports_failure_and_cancels() {
        let cancel = CancellationToken::new();
        let (chan, rx) = EventChannel::new(cancel.clone());
        drop(rx);
        assert!(!chan.write(&StreamEvent::Failures { failed_sources: &[] }));
        assert!(cancel.is_cancelled());
    }
}
