use serde::{Deserialize, Serialize};

/// 聚合搜索结果条目 / Aggregated search result item
///
/// 上游站点返回的字段松散且不可信，全部在适配器边界收敛到该结构，
/// 缺失字段使用安全默认值（空串/空列表）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub poster: String,
    /// 剧集播放地址列表（刷新任务只关心其长度） / episode urls
    #[serde(default)]
    pub episodes: Vec<String>,
    /// 来源站点 key / source site key
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub source_name: String,
    #[serde(default)]
    pub year: String,
    /// 上游分类名，用于内容过滤 / upstream category label
    #[serde(default)]
    pub type_name: String,
}

/// 单个站点的失败条目 / per-site failure entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailedSource {
    pub name: String,
    pub key: String,
    pub error: String,
}

/// 播放记录 / play record
///
/// 刷新任务只会改写 title/cover/year/total_episodes，其余字段原样保留。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayRecord {
    pub title: String,
    pub source_name: String,
    pub cover: String,
    /// 当前观看的集数下标 / current episode index
    pub index: u32,
    pub total_episodes: u32,
    pub play_time: u64,
    pub total_time: u64,
    pub save_time: u64,
    pub search_title: String,
    #[serde(default)]
    pub year: String,
}

/// 收藏 / favorite
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Favorite {
    pub title: String,
    pub source_name: String,
    pub cover: String,
    #[serde(default)]
    pub year: String,
    pub total_episodes: u32,
    pub save_time: u64,
    pub search_title: String,
}

/// 片头片尾跳过配置 / skip intro/outro config
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkipConfig {
    pub enable: bool,
    pub intro_time: u32,
    pub outro_time: u32,
}

/// 自定义分类 / custom category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomCategory {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub category_type: String,
    pub query: String,
    #[serde(default)]
    pub disabled: bool,
}
