//! 元数据刷新任务 / metadata refresh job
//!
//! 周期性地把所有用户的播放记录与收藏对照资源站的权威详情做校正：
//! 集数有变化就改写记录（只动 title/cover/year/total_episodes），
//! 其余字段原样保留。任何单条记录、单个用户的失败都被吞掉并继续，
//! 只有遍历开始前的顶层错误才向上冒泡。

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;

use lumitv_backend::config::{self, AppConfig, StorageKind};
use lumitv_backend::models::{Favorite, PlayRecord, ResultItem};
use lumitv_backend::sources::{SourceAdapter, SourceSite};

use crate::state::AppState;

/// 定时任务用更宽松的详情超时 / relaxed detail timeout for the job
const DETAIL_TIMEOUT: Duration = Duration::from_secs(30);

/// 单次运行内的详情缓存，键为 `source+id` / per-run detail cache
///
/// 只有成功的解析才会写入；失败不记忆，同一键下次出现时重试。
type DetailCache = HashMap<String, ResultItem>;

pub async fn refresh_records_and_favorites(state: &AppState) -> Result<()> {
    let cfg = config::config();
    refresh_with(state, &cfg).await
}

pub(crate) async fn refresh_with(state: &AppState, cfg: &AppConfig) -> Result<()> {
    // 本地内存存储没有可刷新的共享数据
    if state.storage_kind == StorageKind::Memory {
        return Ok(());
    }

    let mut users = state.storage.get_all_users().await?;
    if let Some(admin) = cfg.site.admin_username.clone() {
        if !users.contains(&admin) {
            users.push(admin);
        }
    }

    let sites: HashMap<String, SourceSite> = cfg
        .sources
        .iter()
        .map(|s| (s.key.clone(), s.clone()))
        .collect();
    let mut cache = DetailCache::new();

    for user in &users {
        refresh_play_records(state, &sites, &mut cache, user).await;
        refresh_favorites(state, &sites, &mut cache, user).await;
    }
    tracing::info!("元数据刷新完成，共 {} 个用户", users.len());
    Ok(())
}

/// 解析权威详情，带运行期缓存
async fn get_detail(
    adapter: &dyn SourceAdapter,
    sites: &HashMap<String, SourceSite>,
    cache: &mut DetailCache,
    source: &str,
    id: &str,
) -> Option<ResultItem> {
    let cache_key = format!("{}+{}", source, id);
    if let Some(hit) = cache.get(&cache_key) {
        return Some(hit.clone());
    }
    let site = sites.get(source)?;
    match adapter.detail(site, id, Some(DETAIL_TIMEOUT)).await {
        Ok(detail) => {
            cache.insert(cache_key, detail.clone());
            Some(detail)
        }
        Err(e) => {
            tracing::debug!("详情获取失败 {}+{}: {}", source, id, e);
            None
        }
    }
}

async fn refresh_play_records(
    state: &AppState,
    sites: &HashMap<String, SourceSite>,
    cache: &mut DetailCache,
    user: &str,
) {
    let records = match state.storage.get_all_play_records(user).await {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!("读取用户 {} 播放记录失败: {}", user, e);
            return;
        }
    };

    for (key, record) in records {
        let Some((source, id)) = key.split_once('+') else {
            continue;
        };
        let Some(detail) = get_detail(state.adapter.as_ref(), sites, cache, source, id).await
        else {
            continue;
        };

        let episode_count = detail.episodes.len() as u32;
        if episode_count == 0 || episode_count == record.total_episodes {
            continue;
        }

        let updated = PlayRecord {
            title: pick(&detail.title, &record.title),
            cover: pick(&detail.poster, &record.cover),
            year: pick(&detail.year, &record.year),
            total_episodes: episode_count,
            ..record.clone()
        };
        if let Err(e) = state.storage.set_play_record(user, source, id, &updated).await {
            tracing::debug!("更新播放记录失败 {}+{}: {}", source, id, e);
        }
    }
}

async fn refresh_favorites(
    state: &AppState,
    sites: &HashMap<String, SourceSite>,
    cache: &mut DetailCache,
    user: &str,
) {
    let favorites = match state.storage.get_all_favorites(user).await {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!("读取用户 {} 收藏失败: {}", user, e);
            return;
        }
    };

    for (key, favorite) in favorites {
        let Some((source, id)) = key.split_once('+') else {
            continue;
        };
        let Some(detail) = get_detail(state.adapter.as_ref(), sites, cache, source, id).await
        else {
            continue;
        };

        let episode_count = detail.episodes.len() as u32;
        if episode_count == 0 || episode_count == favorite.total_episodes {
            continue;
        }

        let updated = Favorite {
            title: pick(&detail.title, &favorite.title),
            cover: pick(&detail.poster, &favorite.cover),
            year: pick(&detail.year, &favorite.year),
            total_episodes: episode_count,
            ..favorite.clone()
        };
        if let Err(e) = state.storage.set_favorite(user, source, id, &updated).await {
            tracing::debug!("更新收藏失败 {}+{}: {}", source, id, e);
        }
    }
}

/// 权威值为空时保留原值
fn pick(fresh: &str, stored: &str) -> String {
    if fresh.is_empty() {
        stored.to_string()
    } else {
        fresh.to_string()
    }
}
