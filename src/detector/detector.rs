//! 检测器核心：整合规则源管理、索引缓存与分类检测，输出检测结果

use std::sync::{Arc, RwLock};
use std::time::Instant;

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;

use super::analyzer::evaluate_technology;
use crate::compiler::{CategoryIndex, CompiledTechnology};
use crate::config::EngineConfig;
use crate::error::{RbwResult, RsbuiltwithError};
use crate::rule::cache::IndexCache;
use crate::rule::loader::CatalogLoader;
use crate::rule::model::{DetectionResult, PageSignals, RuleCatalog};
use crate::utils::HeaderConverter;

/// 技术检测器
/// 持有规则源集合与索引缓存；索引在首次检测或列举分类时惰性构建
#[derive(Debug, Default)]
pub struct TechDetector {
    config: EngineConfig,
    sources: RwLock<Vec<RuleCatalog>>,
    index_cache: IndexCache,
}

impl TechDetector {
    /// 创建检测器（默认配置，无规则源）
    pub fn new() -> Self {
        Self::default()
    }

    /// 带自定义配置创建检测器
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            sources: RwLock::new(Vec::new()),
            index_cache: IndexCache::new(),
        }
    }

    /// 从通用JSON结构批量注册规则源并创建检测器（默认配置）
    pub fn from_json_sources(sources: &[Value]) -> RbwResult<Self> {
        let detector = Self::new();
        for source in sources {
            detector.register_json_source(source)?;
        }
        Ok(detector)
    }

    /// 注册一个已结构化的规则源；现有索引随之失效
    pub fn register_source(&self, catalog: RuleCatalog) {
        self.sources.write().unwrap().push(catalog);
        self.index_cache.invalidate();
    }

    /// 注册一个通用JSON结构的规则源
    /// 顶层结构校验立即执行，模式编译延后到首次使用
    pub fn register_json_source(&self, source: &Value) -> RbwResult<()> {
        let catalog = RuleCatalog::from_value(source)?;
        self.register_source(catalog);
        Ok(())
    }

    /// 已注册的规则源数量
    pub fn source_count(&self) -> usize {
        self.sources.read().unwrap().len()
    }

    /// 获取当前索引，必要时惰性构建
    pub fn ensure_index(&self) -> RbwResult<Arc<CategoryIndex>> {
        if let Some(index) = self.index_cache.get() {
            return Ok(index);
        }

        // 旁路构建，避免持源锁编译；版本号在源快照前读取，
        // 构建期间有新源注册时该索引不入缓存，仅供本次调用使用
        let epoch = self.index_cache.epoch();
        let sources = self.sources.read().unwrap().clone();
        let built = Arc::new(CatalogLoader::load(&sources, &self.config)?);
        Ok(self.index_cache.publish(epoch, built))
    }

    /// 列举索引中全部已知分类名
    pub fn list_categories(&self) -> RbwResult<FxHashSet<String>> {
        let index = self.ensure_index()?;
        Ok(index.category_names().map(str::to_string).collect())
    }

    /// 对全部已知分类执行检测
    pub fn detect(&self, signals: &PageSignals<'_>) -> RbwResult<DetectionResult> {
        self.detect_inner(signals, None)
    }

    /// 仅对指定分类执行检测；任一未知分类名使整次调用失败
    pub fn detect_in_categories(
        &self,
        signals: &PageSignals<'_>,
        categories: &[&str],
    ) -> RbwResult<DetectionResult> {
        self.detect_inner(signals, Some(categories))
    }

    fn detect_inner(
        &self,
        signals: &PageSignals<'_>,
        requested: Option<&[&str]>,
    ) -> RbwResult<DetectionResult> {
        // 1. 空信号快速返回，不触发惰性构建
        if signals.is_empty() {
            return Ok(DetectionResult::default());
        }

        let start = Instant::now();
        let index = self.ensure_index()?;

        // 2. 解析本次请求的分类清单（先全量校验，再保序去重）
        let categories = Self::resolve_requested(&index, requested)?;
        let multi_requested = categories.len() > 1;

        // 3. Header键统一转小写，支撑大小写不敏感查找
        let lowered_headers = signals.headers.map(HeaderConverter::to_lowercase_keys);

        // 4. 逐分类扫描
        let mut result = DetectionResult::default();
        // 多分类技术的求值缓存，键为编译实例地址，仅在本次调用内有效
        let mut eval_cache: FxHashMap<usize, bool> = FxHashMap::default();

        for category in &categories {
            let Some(technologies) = index.technologies(category) else {
                continue;
            };
            let multi_result = self.config.is_multi_result(category);

            for tech in technologies {
                let detected = if multi_requested && tech.multi_category {
                    Self::evaluate_cached(tech, signals, lowered_headers.as_ref(), &mut eval_cache)
                } else {
                    evaluate_technology(tech, signals, lowered_headers.as_ref())
                };

                if detected {
                    result.insert(category, &tech.name);
                    // 单结果分类：首个命中后停止本分类扫描
                    if !multi_result {
                        break;
                    }
                }
            }
        }

        log::debug!(
            "检测完成：扫描分类{}个，命中技术{}条，耗时{:?}",
            categories.len(),
            result.technology_count(),
            start.elapsed()
        );

        Ok(result)
    }

    /// 多分类技术的带缓存求值：同一编译实例在一次调用内只真实求值一次
    fn evaluate_cached(
        tech: &Arc<CompiledTechnology>,
        signals: &PageSignals<'_>,
        lowered_headers: Option<&FxHashMap<String, String>>,
        eval_cache: &mut FxHashMap<usize, bool>,
    ) -> bool {
        let key = Arc::as_ptr(tech) as usize;
        if let Some(&cached) = eval_cache.get(&key) {
            return cached;
        }
        let fresh = evaluate_technology(tech, signals, lowered_headers);
        eval_cache.insert(key, fresh);
        fresh
    }

    /// 解析请求的分类清单：缺省表示全部已知分类；未知名称立即报错；重复项保序折叠
    fn resolve_requested(
        index: &CategoryIndex,
        requested: Option<&[&str]>,
    ) -> RbwResult<Vec<String>> {
        match requested {
            Some(names) => {
                let mut seen: FxHashSet<&str> = FxHashSet::default();
                let mut ordered = Vec::with_capacity(names.len());
                for name in names {
                    if !index.contains_category(name) {
                        return Err(RsbuiltwithError::UnknownCategoryError(name.to_string()));
                    }
                    if seen.insert(name) {
                        ordered.push(name.to_string());
                    }
                }
                Ok(ordered)
            }
            None => Ok(index.category_names().map(str::to_string).collect()),
        }
    }
}
