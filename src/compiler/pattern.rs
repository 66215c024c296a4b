//! 编译后模式模型
//! 模式规范化函数与正则编译后的结构

use std::sync::Arc;

use regex::Regex;
use rustc_hash::FxHashMap;

/// 剥离模式尾部的版本/置信度标记
/// `\;`及其后的全部内容、裸`;version:`与`;confidence:`尾缀都不参与编译
pub fn strip_pattern_noise(raw: &str) -> &str {
    let mut end = raw.find("\\;").unwrap_or(raw.len());
    for marker in [";version:", ";confidence:"] {
        if let Some(pos) = raw.find(marker) {
            end = end.min(pos);
        }
    }
    &raw[..end]
}

/// 模式规范化：改写拼入HTML模板后不安全的写法，不改变匹配语义
/// 依次执行：
/// 1. 字面量`{`/`}`改写为单字符类`[{]`/`[}]`，避免被引擎读作量词
/// 2. `[^]`惯用写法改写为`[^^]`，避免被读作未闭合字符类
/// 3. 反向引用`\1`改写为字面`\\1`，目录模式中的分组编号不再生效
pub fn normalize(pattern: &str) -> String {
    pattern
        .replace('{', "[{]")
        .replace('}', "[}]")
        .replace("[^]", "[^^]")
        .replace("\\1", "\\\\1")
}

/// 模式集：多条独立编译的子正则，按逻辑或短路求值
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Regex>,
}

impl PatternSet {
    /// 追加一条编译后的子正则
    pub fn push(&mut self, regex: Regex) {
        self.patterns.push(regex);
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// 匹配输入：任意子正则命中即成立
    pub fn is_match(&self, input: &str) -> bool {
        self.patterns.iter().any(|regex| regex.is_match(input))
    }

    /// 返回命中的首条子正则（用于日志定位规则）
    pub fn first_match(&self, input: &str) -> Option<&Regex> {
        self.patterns.iter().find(|regex| regex.is_match(input))
    }

    /// 遍历全部子正则
    pub fn iter(&self) -> impl Iterator<Item = &Regex> + '_ {
        self.patterns.iter()
    }
}

/// 技术编译后的规则
#[derive(Debug, Clone)]
pub struct CompiledTechnology {
    pub name: String,
    /// html/script/meta三类模式合并后的正文匹配器
    pub body_patterns: Option<PatternSet>,
    /// URL匹配器
    pub url_patterns: Option<PatternSet>,
    /// Header匹配器（键为小写Header名）
    pub header_patterns: Option<FxHashMap<String, PatternSet>>,
    /// 是否归属多个分类（按原始分类ID列表长度判定）
    pub multi_category: bool,
}

/// 编译后的分类索引
/// 多分类技术在各归属分类间共享同一Arc实例
#[derive(Debug, Clone, Default)]
pub struct CategoryIndex {
    categories: FxHashMap<String, Vec<Arc<CompiledTechnology>>>,
}

impl CategoryIndex {
    pub(crate) fn insert(&mut self, category: &str, tech: Arc<CompiledTechnology>) {
        self.categories
            .entry(category.to_string())
            .or_default()
            .push(tech);
    }

    /// 分类是否存在（精确名称比对）
    pub fn contains_category(&self, category: &str) -> bool {
        self.categories.contains_key(category)
    }

    /// 某分类下的技术序列（保持目录文档顺序）
    pub fn technologies(&self, category: &str) -> Option<&[Arc<CompiledTechnology>]> {
        self.categories.get(category).map(|techs| techs.as_slice())
    }

    /// 全部已知分类名
    pub fn category_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.categories.keys().map(|name| name.as_str())
    }

    /// 分类总数
    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    /// 技术条目总数（多分类技术按归属次数计）
    pub fn technology_count(&self) -> usize {
        self.categories.values().map(|techs| techs.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}
