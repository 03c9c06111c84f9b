//! Application configuration module / 应用配置模块
//!
//! Manages application configuration loaded from config.json
//! Creates default config file on first run / 首次运行时创建默认配置文件

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::models::CustomCategory;
use crate::sources::SourceSite;

/// Global configuration instance / 全局配置实例
static CONFIG: OnceCell<Arc<RwLock<AppConfig>>> = OnceCell::new();

/// Application configuration / 应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Server configuration / 服务器配置
    pub server: ServerConfig,
    /// Site behavior configuration / 站点行为配置
    pub site: SiteConfig,
    /// Storage configuration / 存储配置
    pub storage: StorageConfig,
    /// 简繁转换服务配置 / script conversion service
    pub zhconvert: ZhConvertConfig,
    /// Upstream source sites / 上游资源站列表
    #[serde(default)]
    pub sources: Vec<SourceSite>,
    /// Custom categories / 自定义分类
    #[serde(default)]
    pub custom_categories: Vec<CustomCategory>,
}

/// Server configuration / 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address / 服务器监听地址
    pub host: String,
    /// Server port / 服务器端口
    pub port: u16,
}

/// Site behavior configuration / 站点行为配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// 可缓存响应的缓存秒数 / cache lifetime for cacheable responses
    pub cache_time: u64,
    /// 关闭内容过滤 / disable the content-safety filter
    pub disable_yellow_filter: bool,
    /// 管理员用户名（刷新任务会补进用户列表）/ admin username
    #[serde(default)]
    pub admin_username: Option<String>,
}

/// Storage backend kind / 存储后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// 进程内存储，仅限单实例开发使用，进程重启即清空
    Memory,
    /// SQLite 共享存储 / shared sqlite-backed store
    Sqlite,
}

/// Storage configuration / 存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub kind: StorageKind,
    /// Data directory path / 数据目录路径
    pub data_dir: String,
    /// Database file path (relative to data_dir) / 数据库文件路径
    pub db_file: String,
}

/// 简繁转换服务配置 / script conversion service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZhConvertConfig {
    /// 转换服务地址 / conversion endpoint
    pub endpoint: String,
    /// 可为空 / may be empty
    #[serde(default)]
    pub api_key: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8180,
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            cache_time: 300,
            disable_yellow_filter: false,
            admin_username: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::Memory,
            data_dir: "data".to_string(),
            db_file: "lumitv.db".to_string(),
        }
    }
}

impl Default for ZhConvertConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.zhconvert.org/convert".to_string(),
            api_key: String::new(),
        }
    }
}

impl AppConfig {
    /// Get the full database URL / 获取完整的数据库URL
    pub fn get_database_url(&self) -> String {
        let db_path = PathBuf::from(&self.storage.data_dir).join(&self.storage.db_file);
        format!("sqlite:{}?mode=rwc", db_path.to_string_lossy())
    }

    /// Get the full data directory path / 获取完整的数据目录路径
    pub fn get_data_dir(&self) -> PathBuf {
        PathBuf::from(&self.storage.data_dir)
    }

    /// Get the server bind address / 获取服务器绑定地址
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 启用的资源站（过滤 disabled）/ enabled source sites
    pub fn enabled_sources(&self) -> Vec<SourceSite> {
        self.sources.iter().filter(|s| !s.disabled).cloned().collect()
    }
}

/// Get the config file path / 获取配置文件路径
fn get_config_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("config.json")
}

/// Load configuration from file, or create default if not exists / 加载配置文件，不存在则创建默认配置
pub fn load_config() -> Result<AppConfig, String> {
    let config_path = get_config_path();

    if config_path.exists() {
        // Load existing config / 加载现有配置
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config file: {}", e))?;

        tracing::info!("Loaded configuration from {:?}", config_path);
        Ok(config)
    } else {
        // Create default config / 创建默认配置
        let config = AppConfig::default();
        save_config(&config)?;
        tracing::info!("Created default configuration at {:?}", config_path);
        Ok(config)
    }
}

/// Save configuration to file / 保存配置到文件
pub fn save_config(config: &AppConfig) -> Result<(), String> {
    let config_path = get_config_path();

    let content = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;

    std::fs::write(&config_path, content)
        .map_err(|e| format!("Failed to write config file: {}", e))?;

    Ok(())
}

/// Initialize global configuration / 初始化全局配置
pub fn init_config() -> Result<Arc<RwLock<AppConfig>>, String> {
    let config = load_config()?;

    let config_arc = Arc::new(RwLock::new(config));

    CONFIG.set(config_arc.clone())
        .map_err(|_| "Config already initialized".to_string())?;

    Ok(config_arc)
}

/// Get global configuration instance / 获取全局配置实例
pub fn get_config() -> Arc<RwLock<AppConfig>> {
    CONFIG.get_or_init(|| {
        let config = load_config().unwrap_or_default();
        Arc::new(RwLock::new(config))
    }).clone()
}

/// Get a read-only snapshot of current config / 获取当前配置的只读快照
pub fn config() -> AppConfig {
    get_config().read().clone()
}
