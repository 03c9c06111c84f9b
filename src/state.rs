use std::sync::Arc;

use lumitv_backend::config::StorageKind;
use lumitv_backend::search::ZhConverter;
use lumitv_backend::sources::SourceAdapter;
use lumitv_backend::storage::KvStorage;

/// 应用共享状态 / shared application state
pub struct AppState {
    /// 资源站适配器 / source site adapter
    pub adapter: Arc<dyn SourceAdapter>,
    /// 用户数据存储 / user data storage
    pub storage: KvStorage,
    /// 当前激活的存储后端类型 / active storage backend kind
    pub storage_kind: StorageKind,
    /// 简繁转换客户端 / script conversion client
    pub converter: ZhConverter,
}
