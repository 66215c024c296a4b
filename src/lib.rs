//! rsbuiltwith - Rust builtwith风格网站技术栈检测引擎

// 导出全局错误类型
pub use self::error::{RbwResult, RsbuiltwithError};

// 导出配置模块
pub use self::config::{canonical_category, ConfigManager, CustomConfigBuilder, EngineConfig};

// 导出规则模块核心接口
pub use self::rule::{
    CatalogLoader, DetectionResult, IndexCache, PageSignals, RuleCatalog, TechRule,
};

// 导出工具模块核心接口
pub use self::utils::HeaderConverter;

// 导出编译模块核心接口
pub use self::compiler::{
    CategoryIndex, CompileStats, CompiledTechnology, PatternSet, RuleCompiler,
};

// 导出检测模块核心接口
pub use self::detector::TechDetector;

// 声明所有子模块
pub mod config;
pub mod error;
pub mod rule;
pub mod utils;
pub mod compiler;
pub mod detector;
