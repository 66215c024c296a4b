//! 引擎配置管理,存储所有可配置项

use once_cell::sync::Lazy;
use rustc_hash::FxHashSet;

/// 单条正则编译后的体积上限（字节）
pub const DEFAULT_REGEX_SIZE_LIMIT: usize = 1 << 20;

/// 默认允许同一分类保留多个命中的分类集合（规范化名称）
static DEFAULT_MULTI_RESULT_CATEGORIES: Lazy<FxHashSet<String>> = Lazy::new(|| {
    [
        "widgets",
        "analytics",
        "javascript-frameworks",
        "video-players",
        "font-scripts",
        "miscellaneous",
        "advertising-networks",
    ]
    .iter()
    .map(|name| name.to_string())
    .collect()
});

/// 分类名称规范化：去除首尾空白、ASCII转小写、空白改连字符
pub fn canonical_category(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c.is_whitespace() { '-' } else { c.to_ascii_lowercase() })
        .collect()
}

/// 引擎配置
#[derive(Debug, Clone)]
pub struct EngineConfig {
    // 单条正则编译后的体积上限（字节）
    pub regex_size_limit: usize,
    // 多结果分类集合（规范化名称）
    pub multi_result_categories: FxHashSet<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            regex_size_limit: DEFAULT_REGEX_SIZE_LIMIT,
            multi_result_categories: DEFAULT_MULTI_RESULT_CATEGORIES.clone(),
        }
    }
}

impl EngineConfig {
    /// 判断分类是否允许保留多个命中（按规范化名称比对）
    pub fn is_multi_result(&self, category: &str) -> bool {
        self.multi_result_categories
            .contains(&canonical_category(category))
    }
}

/// 配置管理器（单例）
pub struct ConfigManager;

impl ConfigManager {
    /// 获取默认配置
    pub fn get_default() -> EngineConfig {
        EngineConfig::default()
    }

    /// 自定义配置
    pub fn custom() -> CustomConfigBuilder {
        CustomConfigBuilder::new()
    }
}

/// 配置构建器（便于自定义配置）
#[derive(Debug, Clone)]
pub struct CustomConfigBuilder {
    config: EngineConfig,
}

impl CustomConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    pub fn regex_size_limit(mut self, limit: usize) -> Self {
        self.config.regex_size_limit = limit;
        self
    }

    /// 追加一个多结果分类（名称自动规范化）
    pub fn multi_result_category(mut self, category: &str) -> Self {
        self.config
            .multi_result_categories
            .insert(canonical_category(category));
        self
    }

    /// 整体替换多结果分类集合（名称自动规范化）
    pub fn multi_result_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config.multi_result_categories = categories
            .into_iter()
            .map(|category| canonical_category(category.as_ref()))
            .collect();
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}
