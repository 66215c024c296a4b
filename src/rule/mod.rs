//! 规则模块：负责规则目录的数据模型、加载与索引缓存
pub mod model;
pub mod cache;
pub mod loader;

// 导出核心接口
pub use self::model::{DetectionResult, PageSignals, RuleCatalog, TechRule};
pub use self::loader::CatalogLoader;
pub use self::cache::IndexCache;
