//! 内容过滤词表 / content filter word list
//!
//! 命中分类名即过滤，可在配置中整体关闭。

pub const YELLOW_WORDS: &[&str] = &[
    "伦理片",
    "倫理片",
    "伦理",
    "理论片",
    "韩国伦理",
    "港台三级",
    "三级片",
    "福利",
    "福利片",
    "福利视频",
    "里番动漫",
    "门事件",
    "萝莉",
    "制服诱惑",
    "国产传媒",
    "黑丝",
    "无码",
    "有码",
    "日本无码",
    "日本有码",
    "网红主播",
    "色情片",
    "同性片",
    "写真热舞",
    "情色",
    "AV",
];

/// 分类名是否命中过滤词 / category label hits the blocklist
pub fn is_yellow(type_name: &str) -> bool {
    YELLOW_WORDS.iter().any(|w| type_name.contains(w))
}
