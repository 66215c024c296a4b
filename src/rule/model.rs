//! 规则数据模型定义
//! 仅存储规则目录、页面信号与检测结果数据，无任何业务逻辑

use std::collections::HashMap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{RbwResult, RsbuiltwithError};

/// 原始规则目录（apps.json约定的顶层结构）
/// categories与apps两段缺一不可，apps段兼容technologies别名
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleCatalog {
    /// 分类ID -> 分类条目（裸名称字符串或带name字段的对象）
    pub categories: Map<String, Value>,
    /// 技术名 -> 原始规则条目（保持文档顺序）
    #[serde(alias = "technologies")]
    pub apps: Map<String, Value>,
}

impl RuleCatalog {
    /// 从调用方解析好的通用JSON结构构建规则目录
    pub fn from_value(value: &Value) -> RbwResult<Self> {
        let Some(obj) = value.as_object() else {
            return Err(RsbuiltwithError::MalformedCatalogError(
                "规则目录顶层必须是JSON对象".to_string(),
            ));
        };
        if !obj.contains_key("categories") {
            return Err(RsbuiltwithError::MalformedCatalogError(
                "规则目录缺少categories段".to_string(),
            ));
        }
        if !obj.contains_key("apps") && !obj.contains_key("technologies") {
            return Err(RsbuiltwithError::MalformedCatalogError(
                "规则目录缺少apps/technologies段".to_string(),
            ));
        }
        Ok(serde_json::from_value(value.clone())?)
    }
}

/// 技术规则条目（apps.json约定，website/implies等附加字段忽略）
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TechRule {
    /// 所属分类ID列表（目录中数字与字符串两种形态都会出现）
    #[serde(rename = "cats", default, alias = "categories")]
    pub category_ids: Vec<Value>,

    // 检测规则
    #[serde(default)]
    pub url: Option<Value>,
    #[serde(default)]
    pub html: Option<Value>,
    #[serde(default, alias = "scripts")]
    pub script: Option<Value>,
    // 兼容：wappalyzer方言的scriptSrc字段
    #[serde(rename = "scriptSrc", default)]
    pub script_src: Option<Value>,
    #[serde(default)]
    pub meta: Option<HashMap<String, Value>>,
    #[serde(default)]
    pub headers: Option<HashMap<String, Value>>,
}

/// 单次检测的页面信号（调用方提供，检测期间只读）
#[derive(Debug, Clone, Copy, Default)]
pub struct PageSignals<'a> {
    /// 页面HTML正文
    pub html: Option<&'a str>,
    /// 响应头映射（键按大小写不敏感处理）
    pub headers: Option<&'a FxHashMap<String, String>>,
    /// 页面URL
    pub url: Option<&'a str>,
}

impl<'a> PageSignals<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_html(mut self, html: &'a str) -> Self {
        self.html = Some(html);
        self
    }

    pub fn with_headers(mut self, headers: &'a FxHashMap<String, String>) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn with_url(mut self, url: &'a str) -> Self {
        self.url = Some(url);
        self
    }

    /// 三路信号是否全部缺席
    pub fn is_empty(&self) -> bool {
        self.html.is_none() && self.headers.is_none() && self.url.is_none()
    }
}

/// 检测结果：分类名 -> 命中的技术名序列（按首次命中顺序）
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetectionResult {
    #[serde(flatten)]
    categories: FxHashMap<String, Vec<String>>,
}

impl DetectionResult {
    /// 追加一条命中记录；同一分类内同名技术只记录一次
    pub fn insert(&mut self, category: &str, tech_name: &str) -> bool {
        let names = self.categories.entry(category.to_string()).or_default();
        if names.iter().any(|existing| existing == tech_name) {
            return false;
        }
        names.push(tech_name.to_string());
        true
    }

    /// 某分类下命中的技术序列
    pub fn technologies(&self, category: &str) -> Option<&[String]> {
        self.categories.get(category).map(|names| names.as_slice())
    }

    /// 命中的分类数
    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    /// 命中的技术总条数
    pub fn technology_count(&self) -> usize {
        self.categories.values().map(|names| names.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// 以映射形态访问全部结果
    pub fn as_map(&self) -> &FxHashMap<String, Vec<String>> {
        &self.categories
    }

    /// 拆出内部映射
    pub fn into_map(self) -> FxHashMap<String, Vec<String>> {
        self.categories
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_catalog_requires_categories_section() {
        // 测试场景：缺少categories段判定为结构错误
        let err = RuleCatalog::from_value(&json!({"apps": {}})).unwrap_err();
        assert!(matches!(err, RsbuiltwithError::MalformedCatalogError(_)));
    }

    #[test]
    fn test_rule_catalog_requires_apps_section() {
        // 测试场景：缺少apps段判定为结构错误
        let err = RuleCatalog::from_value(&json!({"categories": {}})).unwrap_err();
        assert!(matches!(err, RsbuiltwithError::MalformedCatalogError(_)));
    }

    #[test]
    fn test_rule_catalog_accepts_technologies_alias() {
        // 测试场景：technologies别名可替代apps段
        let catalog = RuleCatalog::from_value(&json!({
            "categories": {"1": "cms"},
            "technologies": {"Drupal": {"cats": [1], "html": "drupal"}}
        }))
        .unwrap();
        assert_eq!(catalog.apps.len(), 1);
        assert!(catalog.apps.contains_key("Drupal"));
    }

    #[test]
    fn test_rule_catalog_rejects_non_object_sections() {
        // 测试场景：categories段形态错误走JSON反序列化错误
        let err = RuleCatalog::from_value(&json!({"categories": [], "apps": {}})).unwrap_err();
        assert!(matches!(err, RsbuiltwithError::JsonError(_)));
    }

    #[test]
    fn test_tech_rule_field_aliases() {
        // 测试场景：cats/categories与script/scripts别名互通
        let rule: TechRule = serde_json::from_value(json!({
            "categories": ["1", 6],
            "scripts": "x\\.js",
            "scriptSrc": "y\\.js"
        }))
        .unwrap();
        assert_eq!(rule.category_ids.len(), 2);
        assert!(rule.script.is_some());
        assert!(rule.script_src.is_some());
    }

    #[test]
    fn test_tech_rule_ignores_unknown_fields() {
        // 测试场景：目录中的website/implies等附加字段不影响解析
        let rule: TechRule = serde_json::from_value(json!({
            "cats": [1],
            "website": "https://wordpress.org",
            "implies": ["PHP"],
            "icon": "WordPress.svg"
        }))
        .unwrap();
        assert_eq!(rule.category_ids.len(), 1);
    }

    #[test]
    fn test_page_signals_builder_and_emptiness() {
        // 测试场景：构建器链式填充与空信号判定
        assert!(PageSignals::new().is_empty());
        let signals = PageSignals::new()
            .with_html("<html></html>")
            .with_url("https://example.com");
        assert!(!signals.is_empty());
        assert_eq!(signals.url, Some("https://example.com"));
    }

    #[test]
    fn test_detection_result_insert_deduplicates_within_category() {
        // 测试场景：同一分类内同名技术只记录一次，可跨分类重复
        let mut result = DetectionResult::default();
        assert!(result.insert("cms", "WordPress"));
        assert!(!result.insert("cms", "WordPress"));
        assert!(result.insert("blogs", "WordPress"));
        assert_eq!(
            result.technologies("cms"),
            Some(&["WordPress".to_string()][..])
        );
        assert_eq!(result.technology_count(), 2);
        assert_eq!(result.category_count(), 2);
        assert_eq!(result.as_map().len(), 2);
        let map = result.into_map();
        assert!(map.contains_key("blogs"));
    }

    #[test]
    fn test_detection_result_serializes_as_plain_map() {
        // 测试场景：结果序列化为分类->技术列表的扁平JSON
        let mut result = DetectionResult::default();
        result.insert("cms", "Drupal");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value, json!({"cms": ["Drupal"]}));
    }
}
