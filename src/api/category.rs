use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::Response;

use lumitv_backend::config;

/// GET /api/config/custom_category - 自定义分类
///
/// 分类变化不频繁，按配置给一个缓存时长。
pub async fn custom_categories() -> Response {
    let cfg = config::config();
    let body = serde_json::to_string(&cfg.custom_categories)
        .unwrap_or_else(|_| "[]".to_string());

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json; charset=utf-8")
        .header(
            header::CACHE_CONTROL,
            format!("public, max-age={}", cfg.site.cache_time),
        )
        .body(Body::from(body))
        .unwrap()
}
