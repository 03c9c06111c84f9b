//! 简繁转换与变体规范化 / script conversion and variant normalization
//!
//! 搜索前先把繁体关键词转成简体（外部服务，超时/失败回退原文），
//! 再做变体字收敛（例如 飚 → 飙），并生成对称的变体备查词，
//! 解决"狂飆/狂飙/狂飚"这类索引差异。

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ZhConvertConfig;

/// 变体字表：(变体, 规范形) / variant table: (variant, canonical)
///
/// 规范化和变体扩展共用同一张表，新增字对直接往里加。
const VARIANT_PAIRS: &[(char, char)] = &[('飚', '飙')];

/// 转换服务超时，独立于调用方传入的整体超时
const CONVERT_TIMEOUT: Duration = Duration::from_secs(4);

/// 变体规范化：把已知变体字收敛到规范形，幂等
///
/// 查询词和结果标题都走这里，保证去重键一致。
pub fn normalize_variants(s: &str) -> String {
    let mut out = s.to_string();
    for &(variant, canonical) in VARIANT_PAIRS {
        if out.contains(variant) {
            out = out.replace(variant, &canonical.to_string());
        }
    }
    out
}

/// 变体备查词：把规范形替换回变体形
///
/// 结果不含输入本身，也不含重复项。
pub fn expand_variant_queries(q: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for &(variant, canonical) in VARIANT_PAIRS {
        for (from, to) in [(canonical, variant), (variant, canonical)] {
            if q.contains(from) {
                let alt = q.replace(from, &to.to_string());
                if alt != q && !out.contains(&alt) {
                    out.push(alt);
                }
            }
        }
    }
    out
}

/// 结果去重键：规范化后的标题 + 年份
pub fn dedupe_key(title: &str, year: &str) -> String {
    format!("{}#{}", normalize_variants(title), year)
}

/// 解析完成的搜索词 / resolved search query
///
/// canonical 非空当且仅当 raw 非空白；variants 不含 canonical、无重复。
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub raw: String,
    pub canonical: String,
    pub variants: Vec<String>,
}

impl SearchQuery {
    pub async fn resolve(converter: &ZhConverter, raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self {
                raw: raw.to_string(),
                canonical: String::new(),
                variants: Vec::new(),
            };
        }
        let canonical = normalize_variants(&converter.to_simplified(raw).await);
        let variants = expand_variant_queries(&canonical);
        Self {
            raw: raw.to_string(),
            canonical,
            variants,
        }
    }
}

/// 繁→简转换客户端 / traditional-to-simplified conversion client
#[derive(Clone)]
pub struct ZhConverter {
    client: Client,
    endpoint: String,
    api_key: String,
}

#[derive(Serialize)]
struct ConvertRequest<'a> {
    text: &'a str,
    converter: &'a str,
    #[serde(rename = "apiKey")]
    api_key: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConvertResponse {
    data: ConvertData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConvertData {
    text: String,
}

impl ZhConverter {
    pub fn new(client: Client, cfg: &ZhConvertConfig) -> Self {
        Self {
            client,
            endpoint: cfg.endpoint.clone(),
            api_key: cfg.api_key.clone(),
        }
    }

    /// 转为简体；超时、非 2xx、响应异常时一律回退原文，绝不报错
    pub async fn to_simplified(&self, input: &str) -> String {
        let text = input.trim();
        if text.is_empty() {
            return input.to_string();
        }
        match self.convert(text).await {
            Some(converted) if !converted.is_empty() => converted,
            _ => input.to_string(),
        }
    }

    async fn convert(&self, text: &str) -> Option<String> {
        let resp = self
            .client
            .post(&self.endpoint)
            .timeout(CONVERT_TIMEOUT)
            .json(&ConvertRequest {
                text,
                converter: "Simplified",
                api_key: &self.api_key,
            })
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let body: ConvertResponse = resp.json().await.ok()?;
        Some(body.data.text)
    }
}
