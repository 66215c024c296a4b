//! 规则目录加载器
//! 负责将已注册的规则目录整体编译为分类索引

use std::sync::Arc;
use std::time::Instant;

use rustc_hash::FxHashMap;
use serde_json::Value;

use super::model::{RuleCatalog, TechRule};
use crate::compiler::{CategoryIndex, CompileStats, RuleCompiler};
use crate::config::EngineConfig;
use crate::error::{RbwResult, RsbuiltwithError};

/// 加载过程统计
#[derive(Debug, Default)]
struct LoadTally {
    loaded: usize,
    skipped: usize,
}

/// 规则目录加载器
pub struct CatalogLoader;

impl CatalogLoader {
    /// 依序加载全部规则源并构建分类索引（追加语义，跨源不去重）
    pub fn load(sources: &[RuleCatalog], config: &EngineConfig) -> RbwResult<CategoryIndex> {
        let start = Instant::now();
        let mut index = CategoryIndex::default();
        let mut stats = CompileStats::default();
        let mut tally = LoadTally::default();

        for source in sources {
            Self::load_source(source, config, &mut index, &mut stats, &mut tally)?;
        }

        log::debug!(
            "规则索引构建完成：规则源{}个，技术{}条（跳过{}条），分类{}个，编译模式{}条，耗时{:?}",
            sources.len(),
            tally.loaded,
            tally.skipped,
            index.category_count(),
            stats.total(),
            start.elapsed()
        );

        Ok(index)
    }

    /// 加载单个规则源
    fn load_source(
        source: &RuleCatalog,
        config: &EngineConfig,
        index: &mut CategoryIndex,
        stats: &mut CompileStats,
        tally: &mut LoadTally,
    ) -> RbwResult<()> {
        // 1. 构建本源的分类映射（ID -> 名称）
        let mut category_names: FxHashMap<&str, String> = FxHashMap::default();
        for (id, entry) in &source.categories {
            if let Some(name) = category_entry_name(entry) {
                category_names.insert(id.as_str(), name);
            } else {
                log::warn!("分类条目无法解析名称，已忽略：id={}", id);
            }
        }

        // 2. 按文档顺序逐技术编译并归入各分类
        for (tech_name, raw_entry) in &source.apps {
            let tech_rule: TechRule = serde_json::from_value(raw_entry.clone()).map_err(|e| {
                RsbuiltwithError::MalformedCatalogError(format!(
                    "技术「{}」规则条目结构无效：{}",
                    tech_name, e
                ))
            })?;

            // 2.1 未声明分类的技术直接跳过
            if tech_rule.category_ids.is_empty() {
                log::warn!("技术「{}」未声明任何分类，已跳过", tech_name);
                tally.skipped += 1;
                continue;
            }

            // 2.2 解析分类名称；引用了未定义分类ID的技术整体跳过
            let Some(resolved) = Self::resolve_categories(tech_name, &tech_rule, &category_names)
            else {
                tally.skipped += 1;
                continue;
            };

            // 2.3 编译一次，同一Arc实例追加到所有归属分类
            let compiled = Arc::new(RuleCompiler::compile(tech_name, &tech_rule, config, stats)?);
            for category in &resolved {
                index.insert(category, compiled.clone());
            }
            tally.loaded += 1;
        }

        Ok(())
    }

    /// 解析技术声明的分类ID列表为分类名（保序去重）
    fn resolve_categories(
        tech_name: &str,
        tech_rule: &TechRule,
        category_names: &FxHashMap<&str, String>,
    ) -> Option<Vec<String>> {
        let mut resolved: Vec<String> = Vec::with_capacity(tech_rule.category_ids.len());
        for id in &tech_rule.category_ids {
            let Some(key) = category_id_key(id) else {
                log::warn!("技术「{}」分类ID形态无效，已跳过该技术：{}", tech_name, id);
                return None;
            };
            let Some(name) = category_names.get(key.as_str()) else {
                log::warn!(
                    "技术「{}」引用了未定义的分类ID「{}」，已跳过该技术",
                    tech_name,
                    key
                );
                return None;
            };
            if !resolved.iter().any(|existing| existing == name) {
                resolved.push(name.clone());
            }
        }
        Some(resolved)
    }
}

/// 解析分类条目中的名称（兼容裸字符串与带name字段的对象）
fn category_entry_name(entry: &Value) -> Option<String> {
    match entry {
        Value::String(name) => Some(name.clone()),
        Value::Object(fields) => fields.get("name").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

/// 将分类ID归一化为categories段的字符串键
fn category_id_key(id: &Value) -> Option<String> {
    match id {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}
